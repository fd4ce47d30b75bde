//! Converter configuration file (TOML).
//!
//! ```toml
//! output_dir = "converted"
//! format = "png"
//! quality = 8
//! bake_ao = true
//! extract_height = false
//! default_porosity = 0.1
//! ```

use crate::conversion::{ConversionOptions, DEFAULT_POROSITY};
use crate::image_loading::OutputFormat;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming a config file when `--config` is not given
pub const CONFIG_ENV: &str = "LABPBR_CONFIG";

/// Quality used when neither config nor flags set one
pub const DEFAULT_QUALITY: u8 = 9;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConverterConfig {
    pub output_dir: Option<PathBuf>,
    pub format: Option<OutputFormat>,
    /// 1-10
    pub quality: Option<u8>,
    pub bake_ao: Option<bool>,
    pub extract_height: Option<bool>,
    /// Porosity written for pixels without subsurface, 0.0-1.0
    pub default_porosity: Option<f32>,
}

impl ConverterConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(crate::Error::NotFound(path.to_path_buf()));
        }
        let s = std::fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }

    /// Load from `explicit`, else from [`CONFIG_ENV`], else defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match std::env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => Self::load(PathBuf::from(path)),
            _ => Ok(Self::default()),
        }
    }

    pub fn to_options(&self) -> ConversionOptions {
        ConversionOptions {
            output_dir: self.output_dir.clone(),
            format: self.format.unwrap_or_default(),
            quality: self.quality.unwrap_or(DEFAULT_QUALITY).clamp(1, 10),
            bake_ao: self.bake_ao.unwrap_or(false),
            extract_height: self.extract_height.unwrap_or(false),
            default_porosity: self
                .default_porosity
                .unwrap_or(DEFAULT_POROSITY)
                .clamp(0.0, 1.0),
        }
    }
}
