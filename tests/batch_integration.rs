use image::{DynamicImage, ImageEncoder, Rgb, RgbImage, Rgba, RgbaImage, codecs::jpeg::JpegEncoder};
use photostamp::batch::{self, BatchError, BatchSummary};
use photostamp::metadata::exif_capture_date;
use photostamp::watermark::{BuiltinFontResolver, WatermarkError, Watermarker};
use photostamp::{Config, OutputFormatChoice, WatermarkKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

fn watermarker() -> Watermarker {
    Watermarker::new(Arc::new(BuiltinFontResolver))
}

/// Little-endian TIFF holding a single DateTimeOriginal in the Exif sub-IFD.
fn exif_segment(date: &str) -> Vec<u8> {
    let mut tiff = b"II*\0".to_vec();
    tiff.extend(8u32.to_le_bytes());
    // IFD0: Exif pointer only
    tiff.extend(1u16.to_le_bytes());
    tiff.extend(0x8769u16.to_le_bytes());
    tiff.extend(4u16.to_le_bytes());
    tiff.extend(1u32.to_le_bytes());
    tiff.extend(26u32.to_le_bytes());
    tiff.extend(0u32.to_le_bytes());
    // Exif IFD: DateTimeOriginal
    tiff.extend(1u16.to_le_bytes());
    tiff.extend(0x9003u16.to_le_bytes());
    tiff.extend(2u16.to_le_bytes());
    tiff.extend((date.len() as u32 + 1).to_le_bytes());
    tiff.extend(44u32.to_le_bytes());
    tiff.extend(0u32.to_le_bytes());
    tiff.extend(date.as_bytes());
    tiff.push(0);

    let mut segment = vec![0xFF, 0xE1];
    segment.extend(((2 + 6 + tiff.len()) as u16).to_be_bytes());
    segment.extend(b"Exif\0\0");
    segment.extend(tiff);
    segment
}

fn write_jpeg(path: &Path, width: u32, height: u32, date: Option<&str>) {
    let image = RgbImage::from_pixel(width, height, Rgb([40, 60, 80]));
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, 90)
        .write_image(&image, width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    if let Some(date) = date {
        let tail = bytes.split_off(2);
        bytes.extend(exif_segment(date));
        bytes.extend(tail);
    }
    std::fs::write(path, bytes).unwrap();
}

fn write_png(path: &Path, width: u32, height: u32) {
    RgbaImage::from_pixel(width, height, Rgba([10, 200, 10, 255]))
        .save(path)
        .unwrap();
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.batch.workers = 2;
    config.watermark.font_size = 8.0;
    config.watermark.margin_x = 2;
    config.watermark.margin_y = 2;
    config
}

fn photo_dir(temp_dir: &TempDir) -> PathBuf {
    let dir = temp_dir.path().join("trip");
    std::fs::create_dir_all(&dir).unwrap();
    dir.canonicalize().unwrap()
}

#[tokio::test]
async fn test_date_batch_writes_outputs_and_keeps_exif() {
    let temp_dir = TempDir::new().unwrap();
    let dir = photo_dir(&temp_dir);
    write_jpeg(&dir.join("a.jpg"), 96, 64, Some("2021:12:31 08:07:06"));
    write_jpeg(&dir.join("b.JPEG"), 96, 64, Some("2020:02:29 23:59:59"));
    write_png(&dir.join("c.png"), 96, 64);
    std::fs::write(dir.join("notes.txt"), "not a photo").unwrap();

    let mut config = test_config();
    config.batch.exif_only = true;

    let summary = batch::run_batch(&config, &dir, watermarker()).await.unwrap();
    assert_eq!(
        summary,
        BatchSummary {
            success: 2,
            skipped: 1,
            failed: 0
        }
    );
    assert_eq!(summary.total(), 3);

    let out_dir = dir.join("trip_watermark");
    let first = out_dir.join("a_watermarked.jpg");
    let second = out_dir.join("b_watermarked.jpg");
    assert!(first.exists());
    assert!(second.exists());
    assert!(!out_dir.join("c_watermarked.png").exists());

    let written = image::open(&first).unwrap();
    assert_eq!((written.width(), written.height()), (96, 64));
    assert_eq!(
        exif_capture_date(&first).map(|d| d.to_string()),
        Some("2021-12-31 08:07:06".to_string())
    );
}

#[tokio::test]
async fn test_exif_can_be_dropped() {
    let temp_dir = TempDir::new().unwrap();
    let dir = photo_dir(&temp_dir);
    write_jpeg(&dir.join("a.jpg"), 64, 32, Some("2021:12:31 08:07:06"));

    let mut config = test_config();
    config.output.preserve_exif = false;
    config.output.prefix = "wm_".to_string();
    config.output.suffix = String::new();

    batch::run_batch(&config, &dir, watermarker()).await.unwrap();

    let output = dir.join("trip_watermark").join("wm_a.jpg");
    assert!(output.exists());
    assert_eq!(exif_capture_date(&output), None);
}

#[tokio::test]
async fn test_text_batch_resizes_and_keeps_png() {
    let temp_dir = TempDir::new().unwrap();
    let dir = photo_dir(&temp_dir);
    let out_dir = temp_dir.path().join("out");
    write_png(&dir.join("logo_shot.png"), 200, 100);

    let mut config = test_config();
    config.watermark.kind = WatermarkKind::Text;
    config.watermark.text = "HELLO".to_string();
    config.watermark.position = "cc".to_string();
    config.resize.mode = "width".to_string();
    config.resize.value = 100;
    config.output.directory = Some(out_dir.clone());

    let summary = batch::run_batch(&config, &dir, watermarker()).await.unwrap();
    assert_eq!(summary.success, 1);

    let written = image::open(out_dir.join("logo_shot_watermarked.png")).unwrap();
    assert_eq!((written.width(), written.height()), (100, 50));
    let rgba = written.as_rgba8().expect("PNG with alpha stays RGBA");
    assert_eq!(rgba.get_pixel(0, 0), &Rgba([10, 200, 10, 255]));
    assert!(rgba.pixels().any(|p| *p == Rgba([255, 255, 255, 255])));
}

#[tokio::test]
async fn test_forced_jpeg_output() {
    let temp_dir = TempDir::new().unwrap();
    let dir = photo_dir(&temp_dir);
    write_png(&dir.join("shot.png"), 40, 40);

    let mut config = test_config();
    config.output.format = OutputFormatChoice::Jpeg;

    batch::run_batch(&config, &dir, watermarker()).await.unwrap();

    let output = dir.join("trip_watermark").join("shot_watermarked.jpg");
    let bytes = std::fs::read(&output).unwrap();
    assert_eq!(image::guess_format(&bytes).unwrap(), image::ImageFormat::Jpeg);
}

#[tokio::test]
async fn test_image_watermark_batch() {
    let temp_dir = TempDir::new().unwrap();
    let dir = photo_dir(&temp_dir);
    let logo = temp_dir.path().join("logo.png");
    RgbaImage::from_pixel(20, 10, Rgba([255, 0, 0, 255]))
        .save(&logo)
        .unwrap();
    write_png(&dir.join("shot.png"), 100, 100);

    let mut config = test_config();
    config.watermark.kind = WatermarkKind::Image;
    config.watermark.image_path = Some(logo);
    config.watermark.image_scale_percent = 50;
    config.watermark.position = "tl".to_string();
    config.watermark.margin_x = 0;
    config.watermark.margin_y = 0;

    let summary = batch::run_batch(&config, &dir, watermarker()).await.unwrap();
    assert_eq!(summary.success, 1);

    let written = image::open(dir.join("trip_watermark").join("shot_watermarked.png")).unwrap();
    let rgba = written.to_rgba8();
    // 50x25 logo in the top-left corner
    assert_eq!(rgba.get_pixel(25, 12), &Rgba([255, 0, 0, 255]));
    assert_eq!(rgba.get_pixel(75, 75), &Rgba([10, 200, 10, 255]));
}

#[tokio::test]
async fn test_image_kind_requires_asset() {
    let temp_dir = TempDir::new().unwrap();
    let dir = photo_dir(&temp_dir);
    write_png(&dir.join("shot.png"), 10, 10);

    let mut config = test_config();
    config.watermark.kind = WatermarkKind::Image;

    let result = batch::run_batch(&config, &dir, watermarker()).await;
    assert!(matches!(result, Err(BatchError::MissingWatermarkImage)));
}

#[tokio::test]
async fn test_output_directory_cannot_be_source() {
    let temp_dir = TempDir::new().unwrap();
    let dir = photo_dir(&temp_dir);
    write_jpeg(&dir.join("a.jpg"), 16, 16, Some("2021:12:31 08:07:06"));

    let mut config = test_config();
    config.output.directory = Some(dir.clone());

    let result = batch::run_batch(&config, &dir, watermarker()).await;
    assert!(matches!(result, Err(BatchError::OutputDirectoryIsSource(_))));
}

#[tokio::test]
async fn test_invalid_settings_fail_before_processing() {
    let temp_dir = TempDir::new().unwrap();
    let dir = photo_dir(&temp_dir);
    write_jpeg(&dir.join("a.jpg"), 16, 16, Some("2021:12:31 08:07:06"));

    let mut config = test_config();
    config.watermark.position = "middle".to_string();

    let result = batch::run_batch(&config, &dir, watermarker()).await;
    assert!(matches!(
        result,
        Err(BatchError::Watermark(WatermarkError::InvalidAnchorSpec(_)))
    ));
    assert!(!dir.join("trip_watermark").exists());
}

#[tokio::test]
async fn test_output_directory_holding_sources_is_refused() {
    let temp_dir = TempDir::new().unwrap();
    let dir = photo_dir(&temp_dir);
    std::fs::create_dir_all(dir.join("sub")).unwrap();
    write_jpeg(&dir.join("a.jpg"), 16, 16, Some("2021:12:31 08:07:06"));
    write_jpeg(&dir.join("sub").join("b.jpg"), 16, 16, Some("2022:01:01 10:00:00"));

    let mut config = test_config();
    config.batch.recursive = true;
    config.output.directory = Some(dir.join("sub"));

    let result = batch::run_batch(&config, &dir, watermarker()).await;
    assert!(matches!(result, Err(BatchError::OutputDirectoryIsSource(_))));
    assert!(!dir.join("sub").join("a_watermarked.jpg").exists());
}

#[tokio::test]
async fn test_colliding_outputs_are_counted_as_failures() {
    let temp_dir = TempDir::new().unwrap();
    let dir = photo_dir(&temp_dir);
    write_jpeg(&dir.join("a.jpg"), 16, 16, Some("2021:12:31 08:07:06"));
    write_jpeg(&dir.join("a.jpeg"), 16, 16, Some("2022:01:01 10:00:00"));

    let summary = batch::run_batch(&test_config(), &dir, watermarker())
        .await
        .unwrap();
    assert_eq!(
        summary,
        BatchSummary {
            success: 1,
            skipped: 0,
            failed: 1
        }
    );

    let written: Vec<_> = std::fs::read_dir(dir.join("trip_watermark"))
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(written, vec!["a_watermarked.jpg"]);
    // Sorted order decides which source keeps the name
    assert_eq!(
        exif_capture_date(&dir.join("trip_watermark").join("a_watermarked.jpg"))
            .unwrap()
            .to_string(),
        "2022-01-01 10:00:00"
    );
}

#[tokio::test]
async fn test_recursive_same_names_collide() {
    let temp_dir = TempDir::new().unwrap();
    let dir = photo_dir(&temp_dir);
    std::fs::create_dir_all(dir.join("day2")).unwrap();
    write_jpeg(&dir.join("a.jpg"), 16, 16, Some("2021:12:31 08:07:06"));
    write_jpeg(&dir.join("day2").join("a.jpg"), 16, 16, Some("2022:01:01 10:00:00"));

    let mut config = test_config();
    config.batch.recursive = true;

    let summary = batch::run_batch(&config, &dir, watermarker()).await.unwrap();
    assert_eq!((summary.success, summary.failed), (1, 1));
}

#[tokio::test]
async fn test_corrupt_image_is_counted_not_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let dir = photo_dir(&temp_dir);
    write_jpeg(&dir.join("good.jpg"), 32, 32, Some("2021:12:31 08:07:06"));
    std::fs::write(dir.join("broken.jpg"), b"definitely not a jpeg").unwrap();

    let summary = batch::run_batch(&test_config(), &dir, watermarker())
        .await
        .unwrap();
    assert_eq!(summary.success, 1);
    assert_eq!(summary.failed, 1);
    assert!(dir.join("trip_watermark").join("good_watermarked.jpg").exists());
}

#[tokio::test]
async fn test_recursive_rerun_ignores_previous_outputs() {
    let temp_dir = TempDir::new().unwrap();
    let dir = photo_dir(&temp_dir);
    std::fs::create_dir_all(dir.join("day2")).unwrap();
    write_jpeg(&dir.join("a.jpg"), 32, 32, Some("2021:12:31 08:07:06"));
    write_jpeg(&dir.join("day2").join("b.jpg"), 32, 32, Some("2022:01:01 10:00:00"));

    let mut config = test_config();
    config.batch.recursive = true;

    let first = batch::run_batch(&config, &dir, watermarker()).await.unwrap();
    let second = batch::run_batch(&config, &dir, watermarker()).await.unwrap();
    assert_eq!(first.success, 2);
    assert_eq!(second, first);
}

#[tokio::test]
async fn test_missing_input_path() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("nowhere");

    let result = batch::run_batch(&test_config(), &missing, watermarker()).await;
    assert!(matches!(result, Err(BatchError::PathNotFound(_))));
    assert!(matches!(
        batch::dry_run(&test_config(), &missing),
        Err(BatchError::PathNotFound(_))
    ));
}

#[test]
fn test_dry_run_lists_dates() {
    let temp_dir = TempDir::new().unwrap();
    let dir = photo_dir(&temp_dir);
    write_jpeg(&dir.join("a.jpg"), 8, 8, Some("2021:12:31 08:07:06"));
    write_jpeg(&dir.join("b.jpg"), 8, 8, None);

    let mut config = test_config();
    config.batch.exif_only = true;

    let entries = batch::dry_run(&config, &dir).unwrap();
    let lines: Vec<String> = entries.iter().map(|e| e.to_string()).collect();
    assert_eq!(
        lines,
        vec![
            format!("{} -> 2021-12-31", dir.join("a.jpg").display()),
            format!("{} -> SKIP: no date", dir.join("b.jpg").display()),
        ]
    );
    assert!(!dir.join("trip_watermark").exists());
}

#[test]
fn test_watermark_output_differs_from_source() {
    let canvas = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 32, Rgb([0, 0, 0])));
    let config = test_config();
    let style = config.watermark.to_text_style().unwrap();
    let placement = config.watermark.to_placement().unwrap();

    let stamped = watermarker()
        .render_text_watermark(&canvas, "2024-01-02", &style, &placement)
        .unwrap();
    assert_ne!(stamped, canvas);
}
