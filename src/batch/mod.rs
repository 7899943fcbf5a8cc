//! Batch driver: finds candidate photos, derives the watermark for each one
//! and writes the result to the output directory.
//!
//! Each image is decoded, watermarked and encoded on the blocking pool. At
//! most `workers` images are in flight at once. A failing image is logged and
//! counted; it never aborts the rest of the batch.

mod error;

pub use error::BatchError;

use image::DynamicImage;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::formats::{self, OutputFormat};
use crate::metadata::{DateOptions, extract_photo_date};
use crate::watermark::{
    ImageWatermarkStyle, Placement, ResizeSpec, TextStyle, Typeface, Watermarker,
    load_watermark_asset, resize,
};
use crate::{Config, OutputConfig, WatermarkKind};

pub const DEFAULT_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "tif", "tiff"];

/// Lowercased extensions without the leading dot.
pub fn normalize_extensions(extensions: &[String]) -> Vec<String> {
    extensions
        .iter()
        .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    if extensions.is_empty() {
        return true;
    }
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .is_some_and(|ext| extensions.contains(&ext))
}

/// Files under `path` whose extension is in `include_extensions`, sorted.
///
/// A file path yields itself when its extension matches. Directories are
/// only descended into when `recursive` is set. An empty extension list
/// accepts every file.
pub fn enumerate_candidate_files(
    path: &Path,
    recursive: bool,
    include_extensions: &[String],
) -> Result<Vec<PathBuf>, BatchError> {
    let extensions = normalize_extensions(include_extensions);

    if path.is_file() {
        return Ok(if has_extension(path, &extensions) {
            vec![path.to_path_buf()]
        } else {
            Vec::new()
        });
    }

    if !path.is_dir() {
        return Err(BatchError::PathNotFound(path.to_path_buf()));
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .follow_links(true)
        .min_depth(1)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| has_extension(p, &extensions))
        .collect();

    files.sort();
    debug!("Found {} candidate file(s) under {:?}", files.len(), path);
    Ok(files)
}

/// `<dir>/<dir-name>_watermark` for a directory input, the same next to the
/// containing directory for a single file.
pub fn default_output_dir(input: &Path) -> PathBuf {
    let base = input_root(input);
    let name = base
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "photos".to_string());
    base.join(format!("{}_watermark", name))
}

/// `prefix + stem + suffix + .ext`
pub fn output_file_name(source: &Path, output: &OutputConfig, format: OutputFormat) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    format!(
        "{}{}{}.{}",
        output.prefix,
        stem,
        output.suffix,
        format.extension()
    )
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub success: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.success + self.skipped + self.failed
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "success: {}, skipped: {}, failed: {}",
            self.success, self.skipped, self.failed
        )
    }
}

/// What happened to one input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Written(PathBuf),
    /// Date watermark requested but no date could be found
    Skipped,
}

enum Payload {
    Text(TextStyle, Typeface),
    Image(Arc<DynamicImage>, ImageWatermarkStyle),
}

/// Everything a worker needs, validated once before any image is touched.
struct Job {
    watermarker: Watermarker,
    kind: WatermarkKind,
    text: String,
    payload: Payload,
    placement: Placement,
    resize: ResizeSpec,
    dates: DateOptions,
    output: OutputConfig,
}

impl Job {
    fn new(config: &Config, watermarker: Watermarker) -> Result<Self, BatchError> {
        let settings = &config.watermark;
        let payload = match settings.kind {
            WatermarkKind::Image => {
                let path = settings
                    .image_path
                    .as_deref()
                    .ok_or(BatchError::MissingWatermarkImage)?;
                let asset = load_watermark_asset(path)?;
                Payload::Image(Arc::new(asset), settings.to_image_style())
            }
            WatermarkKind::Text | WatermarkKind::Date => {
                let style = settings.to_text_style()?;
                let face = watermarker.typeface(&style);
                Payload::Text(style, face)
            }
        };

        Ok(Self {
            watermarker,
            kind: settings.kind,
            text: settings.text.clone(),
            payload,
            placement: settings.to_placement()?,
            resize: config.resize.to_spec()?,
            dates: date_options(config),
            output: config.output.clone(),
        })
    }

    fn destination(&self, source: &Path, output_dir: &Path) -> PathBuf {
        let format = OutputFormat::for_source(self.output.format, source);
        output_dir.join(output_file_name(source, &self.output, format))
    }

    fn process(&self, source: &Path, destination: &Path) -> Result<Outcome, BatchError> {
        let text = match self.kind {
            WatermarkKind::Date => match extract_photo_date(source, &self.dates) {
                Some(date) => date,
                None => {
                    info!("Skipping {}: no date", source.display());
                    return Ok(Outcome::Skipped);
                }
            },
            WatermarkKind::Text => self.text.clone(),
            WatermarkKind::Image => String::new(),
        };

        let image = image::open(source)?;
        let image = resize(&image, &self.resize)?;

        let stamped = match &self.payload {
            Payload::Text(style, face) => self.watermarker.render_text_watermark_with(
                &image,
                &text,
                face,
                style,
                &self.placement,
            )?,
            Payload::Image(asset, style) => {
                self.watermarker
                    .render_image_watermark(&image, asset, style, &self.placement)?
            }
        };

        let format = OutputFormat::for_source(self.output.format, source);
        let exif = if self.output.preserve_exif
            && format == OutputFormat::Jpeg
            && formats::is_jpeg(source)
        {
            formats::jpeg::read_exif_segment(source)
        } else {
            None
        };

        formats::save_image(
            &stamped,
            destination,
            format,
            self.output.jpeg_quality,
            exif.as_deref(),
        )?;

        debug!("Wrote {}", destination.display());
        Ok(Outcome::Written(destination.to_path_buf()))
    }
}

fn date_options(config: &Config) -> DateOptions {
    DateOptions {
        date_format: config.watermark.date_format.clone(),
        exif_only: config.batch.exif_only,
        fallback_mtime: config.batch.fallback_mtime,
    }
}

fn input_root(input: &Path) -> PathBuf {
    if input.is_file() {
        parent_dir(input)
    } else {
        input.canonicalize().unwrap_or_else(|_| input.to_path_buf())
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    let parent = path.parent().unwrap_or(Path::new("."));
    let parent = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };
    parent.canonicalize().unwrap_or_else(|_| parent.to_path_buf())
}

/// Whether `path` looks like a file an earlier run wrote into `output_dir`.
///
/// Without a prefix or suffix outputs cannot be told apart from sources, so
/// nothing counts as an earlier output.
fn is_previous_output(path: &Path, output_dir: &Path, output: &OutputConfig) -> bool {
    if output.prefix.is_empty() && output.suffix.is_empty() {
        return false;
    }
    if !parent_dir(path).starts_with(output_dir) {
        return false;
    }
    path.file_stem()
        .map(|stem| stem.to_string_lossy())
        .is_some_and(|stem| {
            stem.starts_with(output.prefix.as_str()) && stem.ends_with(output.suffix.as_str())
        })
}

/// Watermark every candidate file under `input`.
///
/// Configuration problems (bad colors, anchors, resize values, a missing
/// watermark image) and an output directory that holds source photos fail
/// the whole batch before anything is created. Per-file problems, including
/// two sources that would write the same output file, are counted in the
/// summary.
pub async fn run_batch(
    config: &Config,
    input: &Path,
    watermarker: Watermarker,
) -> Result<BatchSummary, BatchError> {
    let files = enumerate_candidate_files(
        input,
        config.batch.recursive,
        &config.batch.include_extensions,
    )?;

    let job = Arc::new(Job::new(config, watermarker)?);

    let output_dir = config
        .output
        .directory
        .clone()
        .unwrap_or_else(|| default_output_dir(input));
    // A directory that does not exist yet cannot hold any source
    let output_dir = output_dir.canonicalize().unwrap_or(output_dir);

    if output_dir == input_root(input) {
        return Err(BatchError::OutputDirectoryIsSource(output_dir));
    }

    // Earlier runs may have left outputs below a recursive input
    let files: Vec<PathBuf> = files
        .into_iter()
        .filter(|f| !is_previous_output(f, &output_dir, &config.output))
        .collect();

    if let Some(source) = files.iter().find(|f| parent_dir(f) == output_dir) {
        debug!("{} lives in the output directory", source.display());
        return Err(BatchError::OutputDirectoryIsSource(output_dir));
    }

    tokio::fs::create_dir_all(&output_dir).await?;

    let workers = config.batch.workers.max(1);
    info!(
        "Processing {} file(s) into {:?} with {} worker(s)",
        files.len(),
        output_dir,
        workers
    );

    let mut summary = BatchSummary::default();
    let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::new();
    let semaphore = Arc::new(Semaphore::new(workers));
    let mut handles = Vec::with_capacity(files.len());
    for source in files {
        let destination = job.destination(&source, &output_dir);
        if let Some(first) = claimed.get(&destination) {
            let e = BatchError::DuplicateOutput {
                path: source.clone(),
                first: first.clone(),
                destination,
            };
            error!("Failed to watermark {}: {}", source.display(), e);
            summary.failed += 1;
            continue;
        }
        claimed.insert(destination.clone(), source.clone());

        let job = job.clone();
        let semaphore = semaphore.clone();
        handles.push(tokio::spawn(async move {
            // The semaphore is never closed, so a permit always arrives
            let _permit = semaphore.acquire_owned().await.ok();
            let path = source.clone();
            let outcome: Result<Outcome, BatchError> =
                match tokio::task::spawn_blocking(move || job.process(&path, &destination)).await
                {
                    Ok(result) => result,
                    Err(e) => Err(BatchError::Join(e)),
                };
            if let Err(e) = &outcome {
                error!("Failed to watermark {}: {}", source.display(), e);
            }
            outcome
        }));
    }

    for handle in handles {
        match handle.await {
            Ok(Ok(Outcome::Written(_))) => summary.success += 1,
            Ok(Ok(Outcome::Skipped)) => summary.skipped += 1,
            Ok(Err(_)) => summary.failed += 1,
            Err(e) => {
                error!("Worker task failed: {}", e);
                summary.failed += 1;
            }
        }
    }

    if summary.failed > 0 {
        warn!("Batch finished with failures: {}", summary);
    } else {
        info!("Batch finished: {}", summary);
    }
    Ok(summary)
}

/// One line of a dry run listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DryRunEntry {
    pub path: PathBuf,
    pub date: Option<String>,
    /// Undated files are only skipped outright when EXIF dates are required
    pub exif_only: bool,
}

impl fmt::Display for DryRunEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.date {
            Some(date) => write!(f, "{} -> {}", self.path.display(), date),
            None if self.exif_only => write!(f, "{} -> SKIP: no date", self.path.display()),
            None => write!(f, "{} -> no date", self.path.display()),
        }
    }
}

/// List the files a batch would touch along with their capture dates,
/// without decoding or writing anything.
pub fn dry_run(config: &Config, input: &Path) -> Result<Vec<DryRunEntry>, BatchError> {
    let files = enumerate_candidate_files(
        input,
        config.batch.recursive,
        &config.batch.include_extensions,
    )?;
    let dates = date_options(config);

    Ok(files
        .into_iter()
        .map(|path| {
            let date = extract_photo_date(&path, &dates);
            DryRunEntry {
                path,
                date,
                exif_only: dates.exif_only,
            }
        })
        .collect())
}
