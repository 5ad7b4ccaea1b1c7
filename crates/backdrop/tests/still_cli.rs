use std::fs;
use std::process::Command;

use tempfile::TempDir;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

fn backdrop(config_dir: &std::path::Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_backdrop"));
    command
        .env("BACKDROP_CONFIG_DIR", config_dir)
        .env_remove("BACKDROP_CONFIG")
        .env("RUST_LOG", "warn");
    command
}

#[test]
fn still_export_writes_png() {
    let root = TempDir::new().unwrap();
    let output = root.path().join("frames/landing.png");

    let status = backdrop(root.path())
        .args(["still", "--time", "1.5", "--size", "32x18", "--output"])
        .arg(&output)
        .status()
        .expect("failed to run backdrop still");

    assert!(status.success());
    let bytes = fs::read(&output).unwrap();
    assert_eq!(bytes[..8], PNG_SIGNATURE);
}

#[test]
fn still_export_reads_discovered_config() {
    let root = TempDir::new().unwrap();
    fs::write(
        root.path().join("backdrop.toml"),
        "version = 1\n[program]\npreset = \"ambient\"\nfog_opacity = 0.1\n",
    )
    .unwrap();
    let output = root.path().join("ambient.png");

    let status = backdrop(root.path())
        .args(["still", "--size", "16x16", "--output"])
        .arg(&output)
        .status()
        .expect("failed to run backdrop still");

    assert!(status.success());
    assert!(output.exists());
}

#[test]
fn invalid_config_fails_still_export() {
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("backdrop.toml"), "version = 7\n").unwrap();
    let output = root.path().join("never.png");

    let status = backdrop(root.path())
        .args(["still", "--size", "16x16", "--output"])
        .arg(&output)
        .status()
        .expect("failed to run backdrop still");

    assert!(!status.success());
    assert!(!output.exists());
}

#[test]
fn bad_arguments_are_rejected() {
    let root = TempDir::new().unwrap();
    let output = root.path().join("never.png");

    for args in [
        vec!["still", "--size", "0x10"],
        vec!["still", "--preset", "neon"],
        vec!["still", "--time=-1"],
    ] {
        let status = backdrop(root.path())
            .args(&args)
            .arg("--output")
            .arg(&output)
            .status()
            .expect("failed to run backdrop still");
        assert!(!status.success(), "{args:?} should fail");
    }
    assert!(!output.exists());
}

#[test]
fn negative_still_time_is_rejected_by_the_renderer() {
    let root = TempDir::new().unwrap();
    let output = root.path().join("never.png");

    let result = backdrop(root.path())
        .args(["still", "--time=-1", "--size", "8x8", "--output"])
        .arg(&output)
        .output()
        .expect("failed to run backdrop still");

    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("u_time"), "unexpected stderr: {stderr}");
    assert!(!output.exists());
}
