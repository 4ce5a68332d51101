use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use shyllm_runtime::DemoLoader;
use shyllm_server::{launch, ServeArgs};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = ServeArgs::parse();

    match launch(args, Arc::new(DemoLoader::new())).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "shyllm-server exiting");
            ExitCode::FAILURE
        }
    }
}
