//! # shyllm-runtime
//!
//! Backends that plug into [`shyllm_engine::ModelLoader`]. Ships a small,
//! deterministic word-level model (`demo-model`) so the serving path can run end to
//! end without external weights.

pub mod demo;
pub mod loader;

pub use demo::{DemoModel, DEMO_MODEL_ID};
pub use loader::DemoLoader;
