use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

pub mod batch;
pub mod formats;
pub mod metadata;
pub mod templates;
pub mod watermark;

#[cfg(test)]
mod test_fixtures;

use batch::BatchError;
use watermark::{
    Anchor, ColorSpec, ImageWatermarkStyle, Placement, ResizeSpec, TextStyle, WatermarkError,
};

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub watermark: WatermarkSettings,
    pub resize: ResizeConfig,
    pub output: OutputConfig,
    pub batch: BatchConfig,
}

impl Config {
    /// Load the TOML configuration at `path`. A missing file yields the
    /// defaults.
    pub fn load(path: &Path) -> Result<Self, BatchError> {
        if !path.exists() {
            info!("Config file not found at {:?}, using defaults", path);
            return Ok(Config::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config = toml_edit::de::from_str::<Config>(&content)?;
        info!("Configuration loaded from: {:?}", path);
        Ok(config)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WatermarkKind {
    /// Fixed text from `text`
    Text,
    /// Capture date of each photo
    #[default]
    Date,
    /// Image asset from `image_path`
    Image,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WatermarkSettings {
    pub kind: WatermarkKind,
    pub text: String,
    pub date_format: String,
    pub font_path: Option<PathBuf>,
    pub font_size: f32,
    pub color: String,
    pub opacity: f32,
    pub stroke_width: u32,
    pub stroke_color: String,
    pub shadow_offset: (i32, i32),
    pub shadow_color: String,
    pub shadow_opacity: f32,
    pub rotation: f32,
    pub image_path: Option<PathBuf>,
    pub image_scale_percent: u32,
    pub position: String,
    pub margin_x: i32,
    pub margin_y: i32,
    /// Explicit top-left corner; overrides `position` and the margins
    pub manual_position: Option<(i32, i32)>,
}

impl Default for WatermarkSettings {
    fn default() -> Self {
        Self {
            kind: WatermarkKind::Date,
            text: String::new(),
            date_format: metadata::DEFAULT_DATE_FORMAT.to_string(),
            font_path: None,
            font_size: 32.0,
            color: "#FFFFFF".to_string(),
            opacity: 1.0,
            stroke_width: 0,
            stroke_color: "#000000".to_string(),
            shadow_offset: (0, 0),
            shadow_color: "#000000".to_string(),
            shadow_opacity: 0.5,
            rotation: 0.0,
            image_path: None,
            image_scale_percent: 20,
            position: "br".to_string(),
            margin_x: 24,
            margin_y: 24,
            manual_position: None,
        }
    }
}

impl WatermarkSettings {
    pub fn to_text_style(&self) -> Result<TextStyle, WatermarkError> {
        let style = TextStyle {
            font_path: self.font_path.clone(),
            font_size: self.font_size,
            fill: ColorSpec::new(self.color.clone(), self.opacity),
            stroke_width: self.stroke_width,
            stroke: ColorSpec::new(self.stroke_color.clone(), 1.0),
            shadow_offset: self.shadow_offset,
            shadow: ColorSpec::new(self.shadow_color.clone(), self.shadow_opacity),
            rotation: self.rotation,
        };
        // Surface bad color strings before any image is touched
        style.fill.resolve()?;
        style.stroke.resolve()?;
        style.shadow.resolve()?;
        Ok(style)
    }

    pub fn to_image_style(&self) -> ImageWatermarkStyle {
        ImageWatermarkStyle {
            scale_percent: self.image_scale_percent,
            opacity: self.opacity,
            rotation: self.rotation,
        }
    }

    pub fn to_placement(&self) -> Result<Placement, WatermarkError> {
        if let Some((x, y)) = self.manual_position {
            return Ok(Placement::manual(x, y));
        }
        let anchor = Anchor::parse(&self.position)?;
        Ok(Placement::new(anchor, self.margin_x, self.margin_y))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ResizeConfig {
    /// `none`, `width`, `height` or `percent`
    pub mode: String,
    pub value: i64,
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            mode: "none".to_string(),
            value: 100,
        }
    }
}

impl ResizeConfig {
    pub fn to_spec(&self) -> Result<ResizeSpec, WatermarkError> {
        ResizeSpec::from_mode(&self.mode, self.value)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormatChoice {
    /// PNG sources stay PNG, everything else becomes JPEG
    #[default]
    Auto,
    Jpeg,
    Png,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Defaults to `<dir>/<dir-name>_watermark` next to the inputs
    pub directory: Option<PathBuf>,
    pub format: OutputFormatChoice,
    pub jpeg_quality: u8,
    pub prefix: String,
    pub suffix: String,
    pub preserve_exif: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: None,
            format: OutputFormatChoice::Auto,
            jpeg_quality: 95,
            prefix: String::new(),
            suffix: "_watermarked".to_string(),
            preserve_exif: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchConfig {
    pub recursive: bool,
    pub include_extensions: Vec<String>,
    pub exif_only: bool,
    pub fallback_mtime: bool,
    /// Images processed at once
    pub workers: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            recursive: false,
            include_extensions: batch::DEFAULT_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            exif_only: false,
            fallback_mtime: true,
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watermark::{AnchorCode, HorizontalAlign, VerticalAlign};
    use tempfile::TempDir;

    #[test]
    fn test_missing_config_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load(&temp_dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            r##"
[watermark]
kind = "text"
text = "(c) Example"
color = "#FF000080"
position = "TL"
shadow_offset = [2, 3]

[resize]
mode = "width"
value = 640

[output]
format = "png"
"##,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.watermark.kind, WatermarkKind::Text);
        assert_eq!(config.watermark.text, "(c) Example");
        assert_eq!(config.watermark.shadow_offset, (2, 3));
        assert_eq!(config.watermark.font_size, 32.0);
        assert_eq!(config.watermark.margin_x, 24);
        assert_eq!(config.resize.to_spec().unwrap(), ResizeSpec::Width(640));
        assert_eq!(config.output.format, OutputFormatChoice::Png);
        assert_eq!(config.output.suffix, "_watermarked");
        assert!(config.batch.fallback_mtime);
    }

    #[test]
    fn test_malformed_config_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[watermark\nkind = ").unwrap();
        assert!(matches!(Config::load(&path), Err(BatchError::Config(_))));
    }

    #[test]
    fn test_settings_to_placement() {
        let settings = WatermarkSettings {
            position: "Tl".to_string(),
            margin_x: 5,
            margin_y: 7,
            ..WatermarkSettings::default()
        };
        let placement = settings.to_placement().unwrap();
        assert_eq!(
            placement.anchor,
            Anchor::Symbolic(AnchorCode::new(VerticalAlign::Top, HorizontalAlign::Left))
        );
        assert_eq!((placement.margin_x, placement.margin_y), (5, 7));

        let manual = WatermarkSettings {
            manual_position: Some((12, -4)),
            position: "garbage".to_string(),
            ..WatermarkSettings::default()
        };
        assert_eq!(manual.to_placement().unwrap(), Placement::manual(12, -4));

        let bad = WatermarkSettings {
            position: "xx".to_string(),
            ..WatermarkSettings::default()
        };
        assert!(matches!(
            bad.to_placement(),
            Err(WatermarkError::InvalidAnchorSpec(_))
        ));
    }

    #[test]
    fn test_settings_to_text_style_validates_colors() {
        let style = WatermarkSettings::default().to_text_style().unwrap();
        assert_eq!(style.fill, ColorSpec::new("#FFFFFF", 1.0));
        assert_eq!(style.shadow, ColorSpec::new("#000000", 0.5));

        let bad = WatermarkSettings {
            shadow_color: "#GGGGGG".to_string(),
            ..WatermarkSettings::default()
        };
        assert!(matches!(
            bad.to_text_style(),
            Err(WatermarkError::InvalidColorSpec(_))
        ));
    }
}
