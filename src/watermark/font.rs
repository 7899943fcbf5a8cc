//! Font resolution for text watermarks.
//!
//! Resolution is an injectable strategy so callers (and tests) decide where
//! fonts come from. A missing or unreadable font never fails a render: the
//! resolver walks its fallback chain and finally settles on the built-in
//! bitmap face.

use ab_glyph::{Font, FontVec, GlyphId, PxScale, ScaleFont, point};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::builtin_font;

/// A loaded face ready for layout. Cloning shares the parsed font.
#[derive(Clone)]
pub enum Typeface {
    Outline(Arc<FontVec>),
    Builtin,
}

impl fmt::Debug for Typeface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Typeface::Outline(_) => f.write_str("Typeface::Outline"),
            Typeface::Builtin => f.write_str("Typeface::Builtin"),
        }
    }
}

impl Typeface {
    pub fn load(path: &Path) -> Result<Self, String> {
        let data = std::fs::read(path).map_err(|e| format!("{}: {}", path.display(), e))?;
        let font = FontVec::try_from_vec(data)
            .map_err(|_| format!("{}: failed to parse font", path.display()))?;
        Ok(Typeface::Outline(Arc::new(font)))
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self, Typeface::Builtin)
    }

    /// Lay `text` out on one horizontal line and report every covered pixel
    /// relative to the pen origin (top of the ascent, left of the first glyph).
    pub fn trace(&self, text: &str, font_size: f32, plot: &mut dyn FnMut(i32, i32, f32)) {
        match self {
            Typeface::Builtin => builtin_font::trace(text, font_size, plot),
            Typeface::Outline(font) => {
                let font: &FontVec = font.as_ref();
                let scale = PxScale::from(font_size);
                let scaled = font.as_scaled(scale);

                let mut caret = 0.0f32;
                let mut previous: Option<GlyphId> = None;

                for c in text.chars() {
                    let id = scaled.glyph_id(c);
                    if let Some(prev) = previous {
                        caret += scaled.kern(prev, id);
                    }
                    let glyph = id.with_scale_and_position(scale, point(caret, scaled.ascent()));
                    caret += scaled.h_advance(id);
                    previous = Some(id);

                    if let Some(outlined) = font.outline_glyph(glyph) {
                        let bounds = outlined.px_bounds();
                        let (left, top) = (bounds.min.x as i32, bounds.min.y as i32);
                        outlined.draw(|gx, gy, coverage| {
                            plot(left + gx as i32, top + gy as i32, coverage)
                        });
                    }
                }
            }
        }
    }
}

/// Strategy that turns an optional requested font into a usable face.
pub trait FontResolver: Send + Sync {
    fn resolve(&self, requested: Option<&Path>) -> Typeface;
}

/// Always hands out the built-in bitmap face. Deterministic across machines.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinFontResolver;

impl FontResolver for BuiltinFontResolver {
    fn resolve(&self, _requested: Option<&Path>) -> Typeface {
        Typeface::Builtin
    }
}

/// Requested font, then well-known system fonts, then the built-in face.
///
/// The system fallback is searched for and parsed once, when the resolver is
/// built. Resolving afterwards never walks the font directories.
#[derive(Debug, Clone)]
pub struct SystemFontResolver {
    fallback: Typeface,
    fallback_path: Option<PathBuf>,
}

impl Default for SystemFontResolver {
    fn default() -> Self {
        Self::new(
            vec![
                "arial.ttf".to_string(),
                "Arial.ttf".to_string(),
                "DejaVuSans.ttf".to_string(),
            ],
            vec![
                PathBuf::from("."),
                PathBuf::from("static"),
                PathBuf::from("/usr/share/fonts"),
                PathBuf::from("/usr/local/share/fonts"),
                PathBuf::from("/Library/Fonts"),
                PathBuf::from("/System/Library/Fonts"),
                PathBuf::from("C:\\Windows\\Fonts"),
            ],
        )
    }
}

impl SystemFontResolver {
    /// Search `search_dirs` for the first of `candidates` that parses.
    pub fn new(candidates: Vec<String>, search_dirs: Vec<PathBuf>) -> Self {
        for name in &candidates {
            let Some(path) = find_candidate(&search_dirs, name) else {
                debug!("Font candidate {} not found", name);
                continue;
            };
            match Typeface::load(&path) {
                Ok(face) => {
                    debug!("Using fallback font {:?}", path);
                    return Self {
                        fallback: face,
                        fallback_path: Some(path),
                    };
                }
                Err(e) => debug!("Font candidate rejected: {}", e),
            }
        }

        debug!("No outline font available, using built-in face");
        Self {
            fallback: Typeface::Builtin,
            fallback_path: None,
        }
    }

    /// File the fallback face was loaded from, if any outline font was found.
    pub fn fallback_path(&self) -> Option<&Path> {
        self.fallback_path.as_deref()
    }
}

fn find_candidate(search_dirs: &[PathBuf], name: &str) -> Option<PathBuf> {
    search_dirs
        .iter()
        .filter(|dir| dir.is_dir())
        .find_map(|dir| {
            WalkDir::new(dir)
                .max_depth(4)
                .into_iter()
                .filter_map(Result::ok)
                .find(|entry| entry.file_type().is_file() && entry.file_name() == name)
                .map(|entry| entry.into_path())
        })
}

impl FontResolver for SystemFontResolver {
    fn resolve(&self, requested: Option<&Path>) -> Typeface {
        if let Some(path) = requested {
            match Typeface::load(path) {
                Ok(face) => return face,
                Err(e) => warn!("Requested font unavailable, falling back: {}", e),
            }
        }
        self.fallback.clone()
    }
}
