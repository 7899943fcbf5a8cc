use std::path::PathBuf;
use thiserror::Error;

use crate::watermark::WatermarkError;

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Watermark(#[from] WatermarkError),

    #[error("Config error: {0}")]
    Config(#[from] toml_edit::de::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Path does not exist or not accessible: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("Output directory cannot be the source directory: {}", .0.display())]
    OutputDirectoryIsSource(PathBuf),

    #[error(
        "{} would overwrite {}, already claimed by {}",
        .path.display(),
        .destination.display(),
        .first.display()
    )]
    DuplicateOutput {
        path: PathBuf,
        first: PathBuf,
        destination: PathBuf,
    },

    #[error("Image watermark selected but no watermark image configured")]
    MissingWatermarkImage,

    #[error("Template not found: {0}")]
    TemplateNotFound(String),
}
