use docscan_ocr::error::PreprocessError;
use docscan_ocr::preprocessing::steps::deskew;
use docscan_ocr::preprocessing::{Pipeline, PipelineConfig, RotationDirection};
use docscan_ocr::server::store_upload;
use image::{GrayImage, ImageFormat, Luma};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// White 200x100 page with four long dark "text lines", rotated by `skew` degrees
fn skewed_document(skew: f32) -> GrayImage {
    let mut page = GrayImage::from_pixel(200, 100, Luma([245]));
    for line in 0..4 {
        let top = 18 + line * 20;
        for y in top..top + 4 {
            for x in 20..180 {
                page.put_pixel(x, y, Luma([25]));
            }
        }
    }
    deskew::rotate_about_center(&page, skew)
}

fn write_png(dir: &Path, name: &str, img: &GrayImage) -> PathBuf {
    let path = dir.join(name);
    img.save_with_format(&path, ImageFormat::Png).unwrap();
    path
}

fn config(debug_path: PathBuf, save_debug: bool) -> PipelineConfig {
    PipelineConfig {
        save_debug,
        debug_path,
        rotation: RotationDirection::Correct,
    }
}

#[test]
fn test_skewed_document_is_binarized_and_levelled() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_png(dir.path(), "page.png", &skewed_document(5.0));
    let debug_path = dir.path().join("preprocessed_image.png");

    let result = Pipeline::new(config(debug_path.clone(), true))
        .process_path(&input)
        .unwrap();

    assert_eq!(result.image.dimensions(), (300, 150));

    let pure = result
        .image
        .pixels()
        .filter(|p| p.0[0] == 0 || p.0[0] == 255)
        .count();
    let total = (result.image.width() * result.image.height()) as usize;
    // Only the rotation resampling along stroke edges leaves intermediate values
    assert!(pure * 100 > total * 85, "only {} of {} pixels are pure black/white", pure, total);

    let measured = result.skew_angle.expect("text lines should be detected");
    assert!((measured - 5.0).abs() <= 1.0, "measured skew {}", measured);

    let residual = deskew::estimate_skew(&result.image).expect("lines survive deskew");
    assert!(residual.abs() <= 1.0, "residual skew {}", residual);

    assert_eq!(result.debug_path.as_deref(), Some(debug_path.as_path()));
    assert!(debug_path.exists());
    assert!(result.warnings.is_empty());
}

#[test]
fn test_step_timings_cover_every_stage() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_png(dir.path(), "page.png", &skewed_document(3.0));
    let debug_path = dir.path().join("debug.png");

    let result = Pipeline::new(config(debug_path, true))
        .process_path(&input)
        .unwrap();

    let names: Vec<&str> = result.steps.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "load",
            "grayscale",
            "resize",
            "normalize",
            "denoise",
            "threshold",
            "close",
            "deskew",
            "debug_sink"
        ]
    );
    let summed: u64 = result.steps.iter().map(|s| s.time_ms).sum();
    assert!(result.total_time_ms + 1 >= summed);
}

#[test]
fn test_debug_write_failure_keeps_raster() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_png(dir.path(), "page.png", &skewed_document(4.0));

    let reference = Pipeline::new(config(dir.path().join("unused.png"), false))
        .process_path(&input)
        .unwrap();
    let failing = Pipeline::new(config(dir.path().join("missing").join("out.png"), true))
        .process_path(&input)
        .unwrap();

    assert_eq!(failing.image, reference.image);
    assert_eq!(failing.skew_angle, reference.skew_angle);
    assert_eq!(failing.debug_path, None);
    assert_eq!(failing.warnings.len(), 1);
    assert!(!dir.path().join("missing").exists());
}

#[test]
fn test_blank_page_is_not_rotated() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_png(dir.path(), "blank.png", &GrayImage::from_pixel(80, 60, Luma([250])));

    let result = Pipeline::new(config(dir.path().join("debug.png"), false))
        .process_path(&input)
        .unwrap();

    assert_eq!(result.skew_angle, None);
    assert_eq!(result.image.dimensions(), (120, 90));
}

#[test]
fn test_single_pixel_image() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_png(dir.path(), "dot.png", &GrayImage::from_pixel(1, 1, Luma([0])));

    let result = Pipeline::new(config(dir.path().join("debug.png"), false))
        .process_path(&input)
        .unwrap();

    assert_eq!(result.image.dimensions(), (1, 1));
}

#[test]
fn test_zero_byte_file_is_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.png");
    std::fs::write(&path, b"").unwrap();

    let err = Pipeline::new(config(dir.path().join("debug.png"), true))
        .process_path(&path)
        .unwrap_err();

    assert!(matches!(err, PreprocessError::Decode(_)));
    assert!(!dir.path().join("debug.png").exists());
}

#[test]
fn test_truncated_file_is_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let full = write_png(dir.path(), "full.png", &skewed_document(0.0));
    let bytes = std::fs::read(&full).unwrap();
    let truncated = dir.path().join("truncated.png");
    std::fs::write(&truncated, &bytes[..bytes.len() / 3]).unwrap();

    let err = Pipeline::new(config(dir.path().join("debug.png"), false))
        .process_path(&truncated)
        .unwrap_err();

    assert!(matches!(err, PreprocessError::Decode(_)));
}

#[test]
fn test_missing_file_is_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Pipeline::default()
        .process_path(&dir.path().join("nope.png"))
        .unwrap_err();
    assert!(matches!(err, PreprocessError::Decode(_)));
}

fn png_bytes(img: &GrayImage) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Png).unwrap();
    buffer.into_inner()
}

#[test]
fn test_upload_bytes_survive_same_name_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let first = png_bytes(&GrayImage::from_pixel(20, 10, Luma([200])));
    let second = png_bytes(&GrayImage::from_pixel(60, 40, Luma([200])));

    let first_path = store_upload(dir.path(), "scan.png", &first).unwrap();
    let second_path = store_upload(dir.path(), "scan.png", &second).unwrap();
    assert_eq!(first_path, second_path);

    let result = Pipeline::new(config(dir.path().join("debug.png"), false))
        .process_bytes(&first)
        .unwrap();

    assert_eq!(result.image.dimensions(), (30, 15));
    assert_eq!(result.steps[0].name, "load");
}
