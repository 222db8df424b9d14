use std::path::Path;
use std::process::{Command, Output};

pub fn pmt(data_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_pmt"))
        .arg("--data-dir")
        .arg(data_dir)
        .args(args)
        .env("DOTENV_PATH", data_dir.join("missing.env"))
        .env("RUST_LOG", "warn")
        .env_remove("PMT_LOG_FILE")
        .output()
        .expect("run pmt binary")
}

pub fn stdout_json(output: &Output) -> serde_json::Value {
    assert!(
        output.status.success(),
        "pmt failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}
