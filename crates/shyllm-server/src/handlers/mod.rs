//! HTTP request handlers for API endpoints.

pub mod auth;
pub mod generate;
pub mod health;
pub mod root;
pub mod stream;

pub use generate::handle_generate;
pub use health::handle_health;
pub use root::handle_root;
pub use stream::handle_stream;
