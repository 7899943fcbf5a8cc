use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatermarkError {
    #[error("Invalid color spec: {0}")]
    InvalidColorSpec(String),

    #[error("Invalid anchor spec: {0}")]
    InvalidAnchorSpec(String),

    #[error("Invalid watermark asset: {0}")]
    InvalidWatermarkAsset(String),

    #[error("Invalid resize spec: {0}")]
    InvalidResizeSpec(String),

    #[error("Render failure: {0}")]
    RenderFailure(String),
}
