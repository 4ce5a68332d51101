//! Process-level startup checks: misconfiguration and load failures must exit
//! non-zero without ever binding a listener.

use std::process::{Command, Output};

fn run_server(envs: &[(&str, &str)]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_shyllm-server"));
    cmd.env_remove("SHYLLM_API_KEY")
        .env("SHYLLM_HOST", "127.0.0.1")
        .env("SHYLLM_PORT", "0")
        .env("RUST_LOG", "info")
        .env("NO_COLOR", "1");
    for (key, value) in envs {
        cmd.env(key, value);
    }
    cmd.output().unwrap()
}

fn combined(output: &Output) -> String {
    format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
}

#[test]
fn unknown_model_exits_before_listening() {
    let output = run_server(&[("MODEL_NAME", "no-such/model")]);
    let log = combined(&output);
    assert!(!output.status.success());
    assert!(log.contains("model load failed"), "{log}");
    assert!(!log.contains("listening"), "{log}");
}

#[test]
fn unsupported_device_exits() {
    let output = run_server(&[("SHYLLM_DEVICE", "cuda:0")]);
    let log = combined(&output);
    assert!(!output.status.success());
    assert!(!log.contains("listening"), "{log}");
}

#[test]
fn invalid_defaults_exit() {
    let output = run_server(&[("SHYLLM_TEMPERATURE", "-2")]);
    assert!(!output.status.success());
    assert!(!combined(&output).contains("listening"));
}

#[test]
fn unparseable_device_is_rejected_by_cli() {
    let output = run_server(&[("SHYLLM_DEVICE", "abacus")]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("abacus"));
}
