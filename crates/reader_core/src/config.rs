//! Reader configuration

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Characters the OCR engine is allowed to emit
pub const DEFAULT_CHAR_WHITELIST: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789&";

/// Tesseract page segmentation mode 7: treat the image as a single text line
pub const PSM_SINGLE_LINE: u8 = 7;

/// Configuration for target selection, preprocessing and recognition
#[derive(Debug, Clone, PartialEq)]
pub struct ReaderConfig {
    /// OCR language (default: eng)
    pub language: String,
    /// Directory holding `<lang>.traineddata` (default: Tesseract's own lookup)
    pub tessdata_dir: Option<PathBuf>,
    /// Allowed output characters
    pub char_whitelist: String,
    /// Page segmentation mode passed to the engine
    pub page_seg_mode: u8,
    /// Upscale factor applied before binarization (default: 2)
    pub scale_factor: u32,
    /// Channel-average threshold; brighter pixels become white (default: 128)
    pub threshold: u8,
    /// Minimum surface width and height in CSS pixels, exclusive (default: 10)
    pub min_surface_size: f64,
    /// How long a filled field stays highlighted (default: 2s)
    pub highlight_duration: Duration,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            tessdata_dir: None,
            char_whitelist: DEFAULT_CHAR_WHITELIST.to_string(),
            page_seg_mode: PSM_SINGLE_LINE,
            scale_factor: 2,
            threshold: 128,
            min_surface_size: 10.0,
            highlight_duration: Duration::from_millis(2000),
        }
    }
}

impl ReaderConfig {
    /// Create config from `CANVAS_READER_*` environment variables
    ///
    /// Unset variables keep their defaults; malformed values are an error.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(language) = lookup("CANVAS_READER_LANG") {
            config.language = language;
        }
        if let Some(dir) = lookup("CANVAS_READER_TESSDATA") {
            config.tessdata_dir = Some(PathBuf::from(dir));
        }
        if let Some(threshold) = lookup("CANVAS_READER_THRESHOLD") {
            config.threshold = threshold
                .parse()
                .context("CANVAS_READER_THRESHOLD must be 0-255")?;
        }
        if let Some(scale) = lookup("CANVAS_READER_SCALE") {
            config.scale_factor = scale
                .parse()
                .context("CANVAS_READER_SCALE must be a positive integer")?;
            if config.scale_factor == 0 {
                anyhow::bail!("CANVAS_READER_SCALE must be a positive integer");
            }
        }
        if let Some(size) = lookup("CANVAS_READER_MIN_SIZE") {
            config.min_surface_size = size
                .parse()
                .context("CANVAS_READER_MIN_SIZE must be a number")?;
        }
        if let Some(ms) = lookup("CANVAS_READER_HIGHLIGHT_MS") {
            let ms: u64 = ms
                .parse()
                .context("CANVAS_READER_HIGHLIGHT_MS must be milliseconds")?;
            config.highlight_duration = Duration::from_millis(ms);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_reader_config_default() {
        let config = ReaderConfig::default();
        assert_eq!(config.language, "eng");
        assert_eq!(config.scale_factor, 2);
        assert_eq!(config.threshold, 128);
        assert_eq!(config.page_seg_mode, 7);
        assert!(config.char_whitelist.ends_with("0123456789&"));
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = ReaderConfig::from_lookup(lookup(&[
            ("CANVAS_READER_LANG", "deu"),
            ("CANVAS_READER_THRESHOLD", "100"),
            ("CANVAS_READER_HIGHLIGHT_MS", "500"),
        ]))
        .unwrap();
        assert_eq!(config.language, "deu");
        assert_eq!(config.threshold, 100);
        assert_eq!(config.highlight_duration, Duration::from_millis(500));
        assert_eq!(config.scale_factor, 2);
    }

    #[test]
    fn test_from_lookup_rejects_bad_values() {
        assert!(ReaderConfig::from_lookup(lookup(&[("CANVAS_READER_THRESHOLD", "300")])).is_err());
        assert!(ReaderConfig::from_lookup(lookup(&[("CANVAS_READER_SCALE", "0")])).is_err());
    }
}
