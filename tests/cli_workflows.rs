//! CLI integration tests
//!
//! Runs the `bg-remover` binary against temporary directories and checks the
//! written files, JSON reports and exit status.

#![cfg(feature = "cli")]

use bg_remover::ImageIOService;
use image::{Rgba, RgbaImage};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

fn bg_remover() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_bg-remover"));
    command.env_remove("RUST_LOG");
    command
}

fn write_white_over_black(path: &Path) {
    let image = RgbaImage::from_fn(2, 2, |_, y| {
        if y == 0 {
            Rgba([255, 255, 255, 255])
        } else {
            Rgba([0, 0, 0, 255])
        }
    });
    ImageIOService::save_png(&image, path).expect("Failed to write test image");
}

fn stdout_lines(output: &Output) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).expect("stdout line is not JSON"))
        .collect()
}

#[test]
fn test_single_file_default_output() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let input = temp_dir.path().join("photo.png");
    write_white_over_black(&input);

    let output = bg_remover().arg(&input).output().expect("Failed to run CLI");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let result = ImageIOService::load_image(temp_dir.path().join("photo_bg_removed.png"))
        .expect("Output not written")
        .to_rgba8();
    assert_eq!(result.get_pixel(0, 0), &Rgba([255, 255, 255, 0]));
    assert_eq!(result.get_pixel(1, 1), &Rgba([0, 0, 0, 255]));
}

#[test]
fn test_background_color_and_json_report() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let input = temp_dir.path().join("photo.png");
    let target = temp_dir.path().join("red.png");
    write_white_over_black(&input);

    let output = bg_remover()
        .args(["--json", "-b", "red", "-o"])
        .arg(&target)
        .arg(&input)
        .output()
        .expect("Failed to run CLI");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let reports = stdout_lines(&output);
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0]["success"], true);
    assert_eq!(reports[0]["filename"], "photo.png");
    assert_eq!(reports[0]["strategy"], "fallback");
    assert_eq!(reports[0]["output_path"], target.display().to_string());

    let result = ImageIOService::load_image(&target).expect("Output not written").to_rgba8();
    assert_eq!(result.get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
    assert_eq!(result.get_pixel(0, 1), &Rgba([0, 0, 0, 255]));
}

#[test]
fn test_batch_with_failure_exits_non_zero() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let input_dir = temp_dir.path().join("in");
    let output_dir = temp_dir.path().join("out");
    write_white_over_black(&input_dir.join("a.png"));
    write_white_over_black(&input_dir.join("b.png"));
    std::fs::write(input_dir.join("c.png"), b"not an image").expect("Failed to write file");

    let output = bg_remover()
        .args(["--json", "-j", "2", "-o"])
        .arg(&output_dir)
        .arg(&input_dir)
        .output()
        .expect("Failed to run CLI");
    assert!(!output.status.success());

    let reports = stdout_lines(&output);
    assert_eq!(reports.len(), 3);
    assert_eq!(reports.iter().filter(|r| r["success"] == true).count(), 2);

    let failure = reports
        .iter()
        .find(|r| r["success"] == false)
        .expect("Missing failure report");
    assert!(failure["input"].as_str().unwrap_or_default().ends_with("c.png"));
    assert!(failure["error"].as_str().unwrap_or_default().contains("Invalid image"));

    assert!(output_dir.join("a_bg_removed.png").is_file());
    assert!(output_dir.join("b_bg_removed.png").is_file());
    assert!(!output_dir.join("c_bg_removed.png").exists());
}

#[test]
fn test_invalid_background_fails_before_processing() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let input = temp_dir.path().join("photo.png");
    write_white_over_black(&input);

    let output = bg_remover()
        .args(["-b", "notacolor"])
        .arg(&input)
        .output()
        .expect("Failed to run CLI");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("notacolor"));
    assert!(!temp_dir.path().join("photo_bg_removed.png").exists());
}

#[test]
fn test_stdin_to_stdout() {
    let image = RgbaImage::from_pixel(3, 1, Rgba([250, 250, 250, 255]));
    let png = ImageIOService::encode_png(&image).expect("Failed to encode");

    let mut child = bg_remover()
        .arg("-")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn CLI");
    child
        .stdin
        .take()
        .expect("stdin not captured")
        .write_all(&png)
        .expect("Failed to write stdin");
    let output = child.wait_with_output().expect("Failed to wait for CLI");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let result = ImageIOService::decode(&output.stdout).expect("stdout is not an image").to_rgba8();
    assert!(result.pixels().all(|p| p.0 == [255, 255, 255, 0]));
}

#[test]
fn test_missing_model_is_a_startup_error() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let input = temp_dir.path().join("photo.png");
    write_white_over_black(&input);

    let output = bg_remover()
        .arg("-m")
        .arg(temp_dir.path().join("missing.onnx"))
        .arg(&input)
        .output()
        .expect("Failed to run CLI");

    // Without the tract feature the model is ignored and the fallback runs
    if cfg!(feature = "tract") {
        assert!(!output.status.success());
        assert!(!temp_dir.path().join("photo_bg_removed.png").exists());
    } else {
        assert!(output.status.success());
    }
}
