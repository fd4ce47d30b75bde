//! Texture convention detection.
//!
//! Classifies a texture as packed MER ("Bedrock") or LabPBR from its file
//! name and the files next to it, falling back to channel statistics when
//! the name says nothing.

use crate::image_loading::{ImageLoader, PixelBuffer};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Packed texture suffix
pub const MER_SUFFIX: &str = "_mer";
/// Packed texture suffix when the alpha channel carries subsurface
pub const MERS_SUFFIX: &str = "_mers";
/// LabPBR specular suffix
pub const SPECULAR_SUFFIX: &str = "_s";
/// LabPBR normal suffix
pub const NORMAL_SUFFIX: &str = "_n";

/// Suffixes of files this tool writes next to its main outputs.
pub const DERIVED_SUFFIXES: &[&str] = &["_normal", "_heightmap", "_withAO"];

const SUFFIX_WEIGHT: f32 = 0.4;
const SIBLING_WEIGHT: f32 = 0.3;
const BASE_WEIGHT: f32 = 0.1;

/// Confidence reported when only the pixel statistics decided the format.
pub const CONTENT_CONFIDENCE: f32 = 0.3;

/// Tolerance around mid-gray for spotting tangent-space normal maps.
const NORMAL_MAP_TOLERANCE: f32 = 30.0;

/// Material encoding convention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextureFormat {
    /// Packed metallic/emissive/roughness(/subsurface)
    Bedrock,
    LabPbr,
    Unknown,
}

impl TextureFormat {
    pub fn label(&self) -> &'static str {
        match self {
            TextureFormat::Bedrock => "Bedrock (MER)",
            TextureFormat::LabPbr => "LabPBR",
            TextureFormat::Unknown => "unknown",
        }
    }
}

/// Which way a conversion runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConversionDirection {
    BedrockToLabPbr,
    LabPbrToBedrock,
    /// Not decided; the caller must force a direction
    Auto,
}

impl std::str::FromStr for ConversionDirection {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ConversionDirection::Auto),
            "to-labpbr" | "bedrock-to-labpbr" => Ok(ConversionDirection::BedrockToLabPbr),
            "to-bedrock" | "labpbr-to-bedrock" => Ok(ConversionDirection::LabPbrToBedrock),
            _ => Err(crate::Error::Other(format!(
                "Unknown direction: {}. Use auto, to-labpbr, or to-bedrock.",
                s
            ))),
        }
    }
}

impl std::fmt::Display for ConversionDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConversionDirection::BedrockToLabPbr => "Bedrock -> LabPBR",
            ConversionDirection::LabPbrToBedrock => "LabPBR -> Bedrock",
            ConversionDirection::Auto => "auto",
        };
        f.write_str(s)
    }
}

/// Outcome of [`FormatDetector::detect_format`]. Paths are only set for
/// files that exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub format: TextureFormat,
    pub confidence: f32,
    /// File stem with any convention suffix removed
    pub base_name: String,
    pub base_texture_path: Option<PathBuf>,
    pub mer_texture_path: Option<PathBuf>,
    pub specular_texture_path: Option<PathBuf>,
    pub normal_texture_path: Option<PathBuf>,
}

/// Mean channel values and the verdict drawn from them
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentAnalysis {
    pub format: TextureFormat,
    pub mean: [f32; 3],
    pub likely_normal_map: bool,
}

/// Convention suffix found on a file stem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameSuffix {
    Mer,
    Mers,
    Specular,
    Normal,
}

impl NameSuffix {
    pub fn as_str(&self) -> &'static str {
        match self {
            NameSuffix::Mer => MER_SUFFIX,
            NameSuffix::Mers => MERS_SUFFIX,
            NameSuffix::Specular => SPECULAR_SUFFIX,
            NameSuffix::Normal => NORMAL_SUFFIX,
        }
    }

    pub fn format(&self) -> TextureFormat {
        match self {
            NameSuffix::Mer | NameSuffix::Mers => TextureFormat::Bedrock,
            NameSuffix::Specular | NameSuffix::Normal => TextureFormat::LabPbr,
        }
    }
}

/// Split a file stem into its base name and convention suffix.
/// Matching ignores case.
pub fn split_suffix(stem: &str) -> (&str, Option<NameSuffix>) {
    for suffix in [NameSuffix::Mers, NameSuffix::Mer, NameSuffix::Specular, NameSuffix::Normal] {
        if let Some(base) = strip_suffix_ignore_case(stem, suffix.as_str()) {
            return (base, Some(suffix));
        }
    }
    (stem, None)
}

/// Whether a stem ends in one of the [`DERIVED_SUFFIXES`].
pub fn is_derived_output(stem: &str) -> bool {
    DERIVED_SUFFIXES
        .iter()
        .any(|s| strip_suffix_ignore_case(stem, s).is_some())
}

/// Strip an ASCII suffix, leaving a non-empty base.
fn strip_suffix_ignore_case<'a>(stem: &'a str, suffix: &str) -> Option<&'a str> {
    let split = stem.len().checked_sub(suffix.len()).filter(|&i| i > 0)?;
    if !stem.is_char_boundary(split) {
        return None;
    }
    let (base, tail) = stem.split_at(split);
    tail.eq_ignore_ascii_case(suffix).then_some(base)
}

pub struct FormatDetector;

impl FormatDetector {
    /// Classify a texture from its name and its siblings on disk.
    pub fn detect_format<P: AsRef<Path>>(path: P) -> DetectionResult {
        let path = path.as_ref();
        let dir = path.parent().unwrap_or_else(|| Path::new(""));
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("png");

        let (base_name, suffix) = split_suffix(stem);
        let sibling = |suffix: &str| {
            let candidate = dir.join(format!("{}{}.{}", base_name, suffix, ext));
            candidate.is_file().then_some(candidate)
        };

        let base = sibling("");
        let mer = sibling(MER_SUFFIX).or_else(|| sibling(MERS_SUFFIX));
        let specular = sibling(SPECULAR_SUFFIX);
        let normal = sibling(NORMAL_SUFFIX);

        let mut bedrock_score = 0.0f32;
        let mut labpbr_score = 0.0f32;

        match suffix.map(|s| s.format()) {
            Some(TextureFormat::Bedrock) => bedrock_score += SUFFIX_WEIGHT,
            Some(TextureFormat::LabPbr) => labpbr_score += SUFFIX_WEIGHT,
            _ => {}
        }
        if mer.is_some() {
            bedrock_score += SIBLING_WEIGHT;
        }
        if specular.is_some() && normal.is_some() {
            labpbr_score += SIBLING_WEIGHT;
        }
        if base.is_some() {
            bedrock_score += BASE_WEIGHT;
            labpbr_score += BASE_WEIGHT;
        }

        let (format, confidence) = if bedrock_score > labpbr_score {
            (TextureFormat::Bedrock, bedrock_score)
        } else if labpbr_score > bedrock_score {
            (TextureFormat::LabPbr, labpbr_score)
        } else {
            (TextureFormat::Unknown, 0.0)
        };

        DetectionResult {
            format,
            confidence: confidence.min(1.0),
            base_name: base_name.to_string(),
            base_texture_path: base,
            mer_texture_path: mer,
            specular_texture_path: specular,
            normal_texture_path: normal,
        }
    }

    /// Like [`Self::detect_format`], but loads the texture and inspects its
    /// channels when the name is inconclusive.
    pub fn detect_format_with_content<P: AsRef<Path>>(path: P) -> Result<DetectionResult> {
        let path = path.as_ref();
        let mut result = Self::detect_format(path);
        if result.format != TextureFormat::Unknown {
            return Ok(result);
        }

        let buffer = ImageLoader::load(path)?;
        let analysis = Self::analyze_texture_content(&buffer);
        match analysis.format {
            TextureFormat::Bedrock if result.mer_texture_path.is_none() => {
                result.mer_texture_path = Some(path.to_path_buf());
            }
            TextureFormat::LabPbr if result.specular_texture_path.is_none() => {
                result.specular_texture_path = Some(path.to_path_buf());
            }
            TextureFormat::Unknown => return Ok(result),
            _ => {}
        }
        result.format = analysis.format;
        result.confidence = CONTENT_CONFIDENCE;
        Ok(result)
    }

    /// Guess a convention from mean channel values.
    ///
    /// Bright red with dark green reads as LabPBR specular (smooth,
    /// dielectric); bright blue with dark red reads as MER (rough,
    /// non-metal). Mid-gray across the board is likely a normal map.
    pub fn analyze_texture_content(buffer: &PixelBuffer) -> ContentAnalysis {
        let stride = buffer.channels.max(1) as usize;
        let mut sums = [0u64; 3];
        let mut count = 0u64;
        for px in buffer.data.chunks_exact(stride) {
            for (c, sum) in sums.iter_mut().enumerate() {
                *sum += px[c.min(stride - 1)] as u64;
            }
            count += 1;
        }

        let mean = if count == 0 {
            [0.0; 3]
        } else {
            sums.map(|s| s as f32 / count as f32)
        };
        let [r, g, b] = mean;

        let likely_normal_map = mean.iter().all(|m| (m - 128.0).abs() <= NORMAL_MAP_TOLERANCE);
        let format = if r > 150.0 && g < 100.0 {
            TextureFormat::LabPbr
        } else if b > 150.0 && r < 100.0 {
            TextureFormat::Bedrock
        } else {
            TextureFormat::Unknown
        };

        ContentAnalysis {
            format,
            mean,
            likely_normal_map,
        }
    }

    pub fn determine_conversion_direction(format: TextureFormat) -> ConversionDirection {
        match format {
            TextureFormat::Bedrock => ConversionDirection::BedrockToLabPbr,
            TextureFormat::LabPbr => ConversionDirection::LabPbrToBedrock,
            TextureFormat::Unknown => ConversionDirection::Auto,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        image::RgbImage::from_pixel(2, 2, image::Rgb([128, 128, 128]))
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn split_suffix_strips_known_markers() {
        assert_eq!(split_suffix("foo_mer"), ("foo", Some(NameSuffix::Mer)));
        assert_eq!(split_suffix("foo_mers"), ("foo", Some(NameSuffix::Mers)));
        assert_eq!(split_suffix("Foo_S"), ("Foo", Some(NameSuffix::Specular)));
        assert_eq!(split_suffix("foo_n"), ("foo", Some(NameSuffix::Normal)));
        assert_eq!(split_suffix("foo"), ("foo", None));
        assert_eq!(split_suffix("_s"), ("_s", None));
    }

    #[test]
    fn derived_outputs_are_recognised() {
        assert!(is_derived_output("stone_normal"));
        assert!(is_derived_output("stone_heightmap"));
        assert!(is_derived_output("stone_withao"));
        assert!(!is_derived_output("stone_n"));
    }

    #[test]
    fn detects_mer_with_base() {
        let tmp = tempfile::tempdir().unwrap();
        let mer = touch(tmp.path(), "foo_mer.png");
        let base = touch(tmp.path(), "foo.png");

        let result = FormatDetector::detect_format(&mer);
        assert_eq!(result.format, TextureFormat::Bedrock);
        assert!(result.confidence >= 0.7, "confidence {}", result.confidence);
        assert_eq!(result.mer_texture_path, Some(mer));
        assert_eq!(result.base_texture_path, Some(base));
        assert_eq!(result.specular_texture_path, None);
        assert_eq!(result.base_name, "foo");
    }

    #[test]
    fn detects_labpbr_pair_with_base() {
        let tmp = tempfile::tempdir().unwrap();
        let specular = touch(tmp.path(), "foo_s.png");
        let normal = touch(tmp.path(), "foo_n.png");
        touch(tmp.path(), "foo.png");

        let result = FormatDetector::detect_format(&specular);
        assert_eq!(result.format, TextureFormat::LabPbr);
        assert!(result.confidence >= 0.7, "confidence {}", result.confidence);
        assert_eq!(result.specular_texture_path, Some(specular));
        assert_eq!(result.normal_texture_path, Some(normal));
        assert_eq!(result.mer_texture_path, None);
    }

    #[test]
    fn base_texture_alone_is_unknown() {
        let tmp = tempfile::tempdir().unwrap();
        let base = touch(tmp.path(), "foo.png");

        let result = FormatDetector::detect_format(&base);
        assert_eq!(result.format, TextureFormat::Unknown);
        assert_eq!(
            FormatDetector::determine_conversion_direction(result.format),
            ConversionDirection::Auto
        );
    }

    #[test]
    fn base_texture_with_mer_sibling_is_bedrock() {
        let tmp = tempfile::tempdir().unwrap();
        let base = touch(tmp.path(), "foo.png");
        touch(tmp.path(), "foo_mer.png");

        let result = FormatDetector::detect_format(&base);
        assert_eq!(result.format, TextureFormat::Bedrock);
        assert!(result.confidence > 0.3);
    }

    #[test]
    fn content_analysis_classifies_means() {
        let labpbr = PixelBuffer::filled(2, 2, &[220, 40, 10, 0]).unwrap();
        assert_eq!(FormatDetector::analyze_texture_content(&labpbr).format, TextureFormat::LabPbr);

        let mer = PixelBuffer::filled(2, 2, &[0, 0, 200]).unwrap();
        assert_eq!(FormatDetector::analyze_texture_content(&mer).format, TextureFormat::Bedrock);

        let normal = PixelBuffer::filled(2, 2, &[128, 128, 150]).unwrap();
        let analysis = FormatDetector::analyze_texture_content(&normal);
        assert_eq!(analysis.format, TextureFormat::Unknown);
        assert!(analysis.likely_normal_map);
        assert_eq!(analysis.mean, [128.0, 128.0, 150.0]);
    }

    #[test]
    fn content_fallback_fills_in_unknown_names() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("mystery.png");
        image::RgbImage::from_pixel(2, 2, image::Rgb([10, 0, 220]))
            .save(&path)
            .unwrap();

        let result = FormatDetector::detect_format_with_content(&path).unwrap();
        assert_eq!(result.format, TextureFormat::Bedrock);
        assert_eq!(result.confidence, CONTENT_CONFIDENCE);
        assert_eq!(result.mer_texture_path, Some(path));
    }

    #[test]
    fn direction_mapping_and_parsing() {
        assert_eq!(
            FormatDetector::determine_conversion_direction(TextureFormat::Bedrock),
            ConversionDirection::BedrockToLabPbr
        );
        assert_eq!(
            FormatDetector::determine_conversion_direction(TextureFormat::LabPbr),
            ConversionDirection::LabPbrToBedrock
        );
        assert_eq!(
            "to-bedrock".parse::<ConversionDirection>().unwrap(),
            ConversionDirection::LabPbrToBedrock
        );
        assert!("sideways".parse::<ConversionDirection>().is_err());
    }
}
