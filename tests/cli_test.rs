//! End-to-end tests for the vesta-cli binary.

use std::process::Command;

fn cli() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_vesta-cli"));
    for (key, _) in std::env::vars() {
        if key.starts_with("VESTA_") {
            cmd.env_remove(key);
        }
    }
    cmd
}

#[test]
fn bad_log_level_is_reported_but_not_fatal() {
    let output = cli()
        .env("VESTA_LOG_LEVEL", "vesta=notalevel")
        .args(["check", "1.2.0", ">=1.0,<2.0"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("logging disabled"), "stderr: {}", stderr);
    assert!(String::from_utf8_lossy(&output.stdout).contains("satisfies"));
}

#[test]
fn check_exit_codes() {
    let ok = cli().args(["check", "1.2.0", ">=1.0"]).output().unwrap();
    assert_eq!(ok.status.code(), Some(0));

    let malformed = cli().args(["check", "one.two", ">=1.0"]).output().unwrap();
    assert_eq!(malformed.status.code(), Some(1));
}

#[test]
fn list_on_local_root() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("ranker")).unwrap();
    std::fs::write(dir.path().join("ranker").join("1.0.0"), b"x").unwrap();

    let output = cli()
        .env("VESTA_ROOT", dir.path())
        .env("VESTA_BACKEND", "local")
        .args(["list", "ranker/"])
        .output()
        .unwrap();

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("ranker/1.0.0"));
}
