use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use std::fmt::Write;
use std::path::Path;
use tracing::{debug, trace};

pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// How a capture date is looked up and rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateOptions {
    /// chrono strftime pattern
    pub date_format: String,
    /// Never fall back to filesystem times
    pub exif_only: bool,
    /// Use the modification time when EXIF has no usable date
    pub fallback_mtime: bool,
}

impl Default for DateOptions {
    fn default() -> Self {
        Self {
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            exif_only: false,
            fallback_mtime: true,
        }
    }
}

/// Capture date of the photo at `path`, formatted with `options.date_format`.
///
/// EXIF `DateTimeOriginal`, `DateTimeDigitized` and `DateTime` are tried in
/// that order. Unless `exif_only` is set, the file's modification time in
/// local time is used next. `None` when nothing applies or the format string
/// cannot be rendered.
pub fn extract_photo_date(path: &Path, options: &DateOptions) -> Option<String> {
    if let Some(taken) = exif_capture_date(path) {
        return format_date(&taken, &options.date_format);
    }

    if options.exif_only {
        trace!("No EXIF date for {} and exif_only is set", path.display());
        return None;
    }

    if options.fallback_mtime {
        let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok()?;
        let local = DateTime::<Local>::from(modified).naive_local();
        debug!("Using modification time for {}: {}", path.display(), local);
        return format_date(&local, &options.date_format);
    }

    None
}

fn format_date(date: &NaiveDateTime, pattern: &str) -> Option<String> {
    let mut out = String::new();
    match write!(out, "{}", date.format(pattern)) {
        Ok(()) => Some(out),
        Err(_) => {
            debug!("Invalid date format pattern {:?}", pattern);
            None
        }
    }
}

/// Capture timestamp recorded in the file's EXIF block.
pub fn exif_capture_date(path: &Path) -> Option<NaiveDateTime> {
    let exif = match rexif::parse_file(path) {
        Ok(exif) => exif,
        Err(e) => {
            trace!("No EXIF data for {}: {}", path.display(), e);
            return None;
        }
    };

    let date_fields = [
        rexif::ExifTag::DateTimeOriginal,
        rexif::ExifTag::DateTimeDigitized,
        rexif::ExifTag::DateTime,
    ];

    for field in &date_fields {
        if let Some(entry) = exif.entries.iter().find(|e| e.tag == *field)
            && let Some(date) = parse_exif_datetime(&entry.value_more_readable)
        {
            debug!("Found capture date in {:?}: {}", field, date);
            return Some(date);
        }
    }

    None
}

/// Parse an EXIF timestamp such as `2005:07:30 07:22:46`. A handful of
/// separators seen in the wild and date-only values are accepted too.
pub fn parse_exif_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim().trim_end_matches('\0');

    let datetime_formats = ["%Y:%m:%d %H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y/%m/%d %H:%M:%S"];
    for format in &datetime_formats {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Some(parsed);
        }
    }

    let date_formats = ["%Y:%m:%d", "%Y-%m-%d", "%Y/%m/%d"];
    for format in &date_formats {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }

    None
}
