#![cfg(feature = "cli")]

use std::path::Path;

use assert_cmd::Command;
use image::{Rgba, RgbaImage};
use predicates::prelude::*;

fn page(width: u32, rows: u32) -> RgbaImage {
    RgbaImage::from_fn(width, rows, |_, y| {
        #[allow(clippy::cast_possible_truncation)]
        let (r, g) = ((y % 256) as u8, (y / 256) as u8);
        Rgba([r, g, 77, 255])
    })
}

fn write_capture(dir: &Path, name: &str, full: &RgbaImage, from: u32, height: u32) {
    image::imageops::crop_imm(full, 0, from, full.width(), height)
        .to_image()
        .save(dir.join(name))
        .unwrap();
}

#[test]
fn stitches_directory_in_numeric_order() {
    let dir = tempfile::tempdir().unwrap();
    let full = page(24, 240);
    // Written out of order and named so that plain string sorting is wrong.
    write_capture(dir.path(), "10.png", &full, 140, 100);
    write_capture(dir.path(), "1.png", &full, 0, 100);
    write_capture(dir.path(), "2.png", &full, 70, 100);
    let out = dir.path().join("out.png");

    Command::cargo_bin("screenshot-stitch")
        .unwrap()
        .arg(dir.path())
        .arg("-o")
        .arg(&out)
        .assert()
        .success()
        .stderr(predicate::str::contains("[OK]"));

    let stitched = image::open(&out).unwrap().to_rgba8();
    assert_eq!(stitched, full);
}

#[test]
fn analysis_report_supplies_header_and_drops_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let full = page(20, 200);
    write_capture(dir.path(), "1.png", &full, 0, 100);
    write_capture(dir.path(), "2.png", &full, 0, 100);
    write_capture(dir.path(), "3.png", &full, 150, 50);
    let report = dir.path().join("analysis.json");
    std::fs::write(
        &report,
        r#"{"issues":[{"type":"SIMILARITY","indices":[0,1],"reason":"same shot"}],"commonHeaderHeight":0}"#,
    )
    .unwrap();
    let out = dir.path().join("out.png");

    Command::cargo_bin("screenshot-stitch")
        .unwrap()
        .args([dir.path().join("1.png"), dir.path().join("2.png"), dir.path().join("3.png")])
        .arg("--analysis")
        .arg(&report)
        .arg("--drop-similar")
        .arg("-o")
        .arg(&out)
        .assert()
        .success()
        .stderr(predicate::str::contains("SIMILARITY"))
        .stderr(predicate::str::contains("[SKIP]"));

    let stitched = image::open(&out).unwrap().to_rgba8();
    assert_eq!(stitched.dimensions(), (20, 150));
}

#[test]
fn missing_input_fails() {
    let dir = tempfile::tempdir().unwrap();
    Command::cargo_bin("screenshot-stitch")
        .unwrap()
        .arg(dir.path().join("nope.png"))
        .arg("-o")
        .arg(dir.path().join("out.png"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("[FAIL]"));
}

#[test]
fn invalid_separator_color_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let full = page(10, 40);
    write_capture(dir.path(), "1.png", &full, 0, 40);
    Command::cargo_bin("screenshot-stitch")
        .unwrap()
        .arg(dir.path())
        .arg("--separator-color")
        .arg("purple")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid color"));
}

#[test]
fn default_output_lands_next_to_first_input() {
    let dir = tempfile::tempdir().unwrap();
    let shots = dir.path().join("shots");
    std::fs::create_dir(&shots).unwrap();
    let full = page(24, 240);
    write_capture(&shots, "2.png", &full, 70, 100);
    write_capture(&shots, "1.png", &full, 0, 100);

    Command::cargo_bin("screenshot-stitch")
        .unwrap()
        .arg(&shots)
        .assert()
        .success()
        .stderr(predicate::str::contains("1_stitched.png"))
        .stderr(predicate::str::contains("overlaps: [0, 30]"));

    let stitched = image::open(shots.join("1_stitched.png")).unwrap().to_rgba8();
    assert_eq!(stitched, capture_rows(&full, 0, 170));
}

#[test]
fn keep_order_stacks_files_as_given() {
    let dir = tempfile::tempdir().unwrap();
    let full = page(24, 240);
    write_capture(dir.path(), "10.png", &full, 0, 100);
    write_capture(dir.path(), "2.png", &full, 70, 100);
    let out = dir.path().join("out.png");

    Command::cargo_bin("screenshot-stitch")
        .unwrap()
        .arg(dir.path().join("10.png"))
        .arg(dir.path().join("2.png"))
        .arg("--keep-order")
        .arg("-o")
        .arg(&out)
        .assert()
        .success();

    let stitched = image::open(&out).unwrap().to_rgba8();
    assert_eq!(stitched, capture_rows(&full, 0, 170));
}

/// A capture whose top `header` rows are a solid bar.
fn write_capture_with_header(
    dir: &Path,
    name: &str,
    full: &RgbaImage,
    from: u32,
    height: u32,
    header: u32,
) {
    let mut out = RgbaImage::from_pixel(full.width(), height + header, Rgba([250, 0, 250, 255]));
    image::imageops::replace(&mut out, &capture_rows(full, from, height), 0, i64::from(header));
    out.save(dir.join(name)).unwrap();
}

fn capture_rows(full: &RgbaImage, from: u32, height: u32) -> RgbaImage {
    image::imageops::crop_imm(full, 0, from, full.width(), height).to_image()
}

#[test]
fn header_height_and_separator_flags_shape_the_canvas() {
    let dir = tempfile::tempdir().unwrap();
    write_capture(dir.path(), "1.png", &page(20, 60), 0, 60);
    // Unrelated content under a 10px header that the crop removes.
    write_capture_with_header(dir.path(), "2.png", &page(20, 3000), 2000, 60, 10);
    let out = dir.path().join("out.png");

    Command::cargo_bin("screenshot-stitch")
        .unwrap()
        .arg(dir.path())
        .args(["--header-height", "10", "--separator"])
        .arg("-o")
        .arg(&out)
        .assert()
        .success();

    let stitched = image::open(&out).unwrap().to_rgba8();
    assert_eq!(stitched.dimensions(), (20, 60 + 3 + 60));
    assert_eq!(*stitched.get_pixel(5, 61), Rgba([0x4B, 0x55, 0x63, 255]));
    assert_eq!(*stitched.get_pixel(5, 63), *page(20, 3000).get_pixel(5, 2000));
}

#[test]
fn separator_height_overrides_thin_preset() {
    let dir = tempfile::tempdir().unwrap();
    write_capture(dir.path(), "1.png", &page(20, 60), 0, 60);
    write_capture(dir.path(), "2.png", &page(20, 3000), 2000, 60);
    let out = dir.path().join("out.png");

    Command::cargo_bin("screenshot-stitch")
        .unwrap()
        .arg(dir.path())
        .args(["--separator", "--separator-height", "8", "--separator-color", "#00C800"])
        .arg("-o")
        .arg(&out)
        .assert()
        .success();

    let stitched = image::open(&out).unwrap().to_rgba8();
    assert_eq!(stitched.height(), 128);
    for y in 60..68 {
        assert_eq!(*stitched.get_pixel(0, y), Rgba([0, 200, 0, 255]));
    }
}
