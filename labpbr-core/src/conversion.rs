//! Texture set conversion between packed MER and LabPBR.
//!
//! The `create_*` functions are pure pixel transforms over loaded buffers.
//! The `convert_*` functions add loading, naming and saving around them and
//! never fail: every fault ends up in [`ConversionResult::messages`] with
//! `success = false`.
//!
//! Output naming, next to the source unless an output directory is set:
//!
//! | Direction | Outputs |
//! |---|---|
//! | MER -> LabPBR | `<base>_s`, `<base>_n`, `<base>_heightmap` |
//! | LabPBR -> MER | `<base>_mer` / `<base>_mers`, `<base>_normal`, `<base>_heightmap`, `<base>_withAO` |

use crate::bidirectional::BidirectionalWorkflowConverter;
use crate::channels::{ChannelExtractor, ChannelPlanes};
use crate::detection::{
    is_derived_output, split_suffix, ConversionDirection, DetectionResult, FormatDetector,
    NameSuffix, MERS_SUFFIX, MER_SUFFIX, NORMAL_SUFFIX, SPECULAR_SUFFIX,
};
use crate::image_loading::{save_texture, ImageLoader, OutputFormat, PixelBuffer, SaveOptions};
use crate::normal_map::NormalMapProcessor;
use crate::workflow::{WorkflowConverter, SUBSURFACE_MIN};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Porosity written for pixels without subsurface. A placeholder, not a
/// measured material property.
pub const DEFAULT_POROSITY: f32 = 0.1;

/// Suffix of a conventional (non-LabPBR) normal map next to a MER texture
pub const COMPANION_NORMAL_SUFFIX: &str = "_normal";
pub const HEIGHTMAP_SUFFIX: &str = "_heightmap";
pub const WITH_AO_SUFFIX: &str = "_withAO";

/// Options shared by every conversion
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionOptions {
    /// Output folder (None = next to the source texture)
    pub output_dir: Option<PathBuf>,
    pub format: OutputFormat,
    /// 1-10
    pub quality: u8,
    /// Darken the base color with the LabPBR AO channel
    pub bake_ao: bool,
    /// Write the LabPBR height channel as its own texture
    pub extract_height: bool,
    pub default_porosity: f32,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            output_dir: None,
            format: OutputFormat::Png,
            quality: crate::config::DEFAULT_QUALITY,
            bake_ao: false,
            extract_height: false,
            default_porosity: DEFAULT_POROSITY,
        }
    }
}

impl ConversionOptions {
    fn save_options(&self) -> SaveOptions {
        SaveOptions {
            format: self.format,
            quality: self.quality,
        }
    }

    fn output_path(&self, source: &Path, base_name: &str, suffix: &str) -> PathBuf {
        let dir = match &self.output_dir {
            Some(dir) => dir.as_path(),
            None => source.parent().unwrap_or_else(|| Path::new("")),
        };
        dir.join(format!("{}{}.{}", base_name, suffix, self.format.extension()))
    }
}

/// Kind of texture written by a conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    /// LabPBR specular (`_s`)
    Specular,
    /// LabPBR normal (`_n`)
    LabPbrNormal,
    /// Packed MER (`_mer` / `_mers`)
    Mer,
    /// RGB normal map with reconstructed Z (`_normal`)
    Normal,
    HeightMap,
    BaseColorWithAo,
}

impl OutputKind {
    pub fn label(&self) -> &'static str {
        match self {
            OutputKind::Specular => "specular",
            OutputKind::LabPbrNormal => "LabPBR normal",
            OutputKind::Mer => "MER",
            OutputKind::Normal => "normal",
            OutputKind::HeightMap => "heightmap",
            OutputKind::BaseColorWithAo => "base color with AO",
        }
    }
}

/// Outcome of one conversion call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResult {
    pub source_path: PathBuf,
    pub output_paths: BTreeMap<OutputKind, PathBuf>,
    pub success: bool,
    pub messages: Vec<String>,
    pub direction: Option<ConversionDirection>,
}

impl ConversionResult {
    pub fn new<P: Into<PathBuf>>(source_path: P) -> Self {
        Self {
            source_path: source_path.into(),
            output_paths: BTreeMap::new(),
            success: true,
            messages: Vec::new(),
            direction: None,
        }
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    pub fn warn(&mut self, message: impl std::fmt::Display) {
        self.messages.push(format!("warning: {}", message));
    }

    pub fn fail(&mut self, error: &Error) {
        self.success = false;
        self.messages.push(format!("error: {}", error));
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn output(&self, kind: OutputKind) -> Option<&Path> {
        self.output_paths.get(&kind).map(PathBuf::as_path)
    }

    fn finish(mut self, outcome: Result<()>) -> Self {
        if let Err(e) = outcome {
            self.fail(&e);
        }
        self
    }

    fn save(
        &mut self,
        kind: OutputKind,
        buffer: &PixelBuffer,
        path: PathBuf,
        options: &ConversionOptions,
    ) -> Result<()> {
        if buffer.has_alpha() && !options.format.supports_alpha() {
            self.warn(format!(
                "{} does not store alpha; {} alpha channel dropped",
                options.format.extension(),
                kind.label()
            ));
        }
        let written = save_texture(buffer, path, options.save_options())?;
        self.info(format!("wrote {}: {}", kind.label(), written.display()));
        self.output_paths.insert(kind, written);
        Ok(())
    }
}

fn ensure_same_size(expected: &PixelBuffer, actual: &PixelBuffer) -> Result<()> {
    if expected.dimensions() != actual.dimensions() {
        return Err(Error::DimensionMismatch {
            expected: expected.dimensions(),
            actual: actual.dimensions(),
        });
    }
    Ok(())
}

fn base_name_of(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("texture");
    split_suffix(stem).0.to_string()
}

/// Build a LabPBR specular texture from a packed MER texture.
///
/// Metal pixels take a predefined-metal code guessed from the base color;
/// without a base color every metal is treated as mid-gray (iron).
pub fn create_labpbr_specular(
    mer: &PixelBuffer,
    base_color: Option<&PixelBuffer>,
    default_porosity: f32,
) -> Result<PixelBuffer> {
    let planes = ChannelExtractor::extract(mer)?;
    let color = match base_color {
        Some(base) => {
            ensure_same_size(mer, base)?;
            Some(ChannelExtractor::extract(base)?)
        }
        None => None,
    };

    let channels = planes.as_mer();
    let count = planes.pixel_count();
    let porosity = WorkflowConverter::convert_porosity(default_porosity);

    let mut smoothness = Vec::with_capacity(count);
    let mut reflectance = Vec::with_capacity(count);
    let mut porosity_or_subsurface = Vec::with_capacity(count);
    let mut emission = Vec::with_capacity(count);

    for i in 0..count {
        smoothness.push(WorkflowConverter::roughness_to_smoothness(channels.roughness[i]));

        let metallic = channels.metallic[i];
        let f0 = if WorkflowConverter::is_metallic(metallic) {
            let (r, g, b) = color
                .as_ref()
                .map(|c| (c.r[i], c.g[i], c.b[i]))
                .unwrap_or((128, 128, 128));
            WorkflowConverter::get_predefined_metal(r, g, b).code()
        } else {
            WorkflowConverter::metallic_to_f0(metallic)
        };
        reflectance.push(f0);

        let subsurface = channels.subsurface.map(|s| s[i]).unwrap_or(0);
        porosity_or_subsurface.push(if subsurface > 0 {
            WorkflowConverter::convert_subsurface(subsurface)
        } else {
            porosity
        });

        emission.push(WorkflowConverter::convert_emissive(channels.emissive[i]));
    }

    ChannelExtractor::combine(&ChannelPlanes {
        width: planes.width,
        height: planes.height,
        r: smoothness,
        g: reflectance,
        b: porosity_or_subsurface,
        a: Some(emission),
    })
}

/// Build a LabPBR normal texture from a conventional normal map: X/Y kept,
/// no occlusion, height from the source alpha (flat when absent).
pub fn create_labpbr_normal(normal: &PixelBuffer) -> Result<PixelBuffer> {
    let planes = ChannelExtractor::extract(normal)?;
    let count = planes.pixel_count();
    let height = planes.a.unwrap_or_else(|| vec![255; count]);

    ChannelExtractor::combine(&ChannelPlanes {
        width: planes.width,
        height: planes.height,
        r: planes.r,
        g: planes.g,
        b: vec![255; count],
        a: Some(height),
    })
}

/// A packed texture produced from LabPBR
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerTexture {
    pub buffer: PixelBuffer,
    /// Any pixel carried subsurface; selects the `_mers` suffix
    pub has_subsurface: bool,
}

impl MerTexture {
    pub fn suffix(&self) -> &'static str {
        if self.has_subsurface {
            MERS_SUFFIX
        } else {
            MER_SUFFIX
        }
    }
}

/// Whether any pixel's porosity/subsurface channel is in the subsurface range.
pub fn has_subsurface(specular: &ChannelPlanes) -> bool {
    specular
        .as_specular()
        .porosity_or_subsurface
        .iter()
        .any(|&v| v >= SUBSURFACE_MIN)
}

/// Build a packed MER texture from a LabPBR specular texture.
///
/// Two passes: the whole image is scanned for subsurface first, and alpha
/// is only written per pixel when some pixel has it. Emissive is always 0.
pub fn create_bedrock_mer(specular: &PixelBuffer) -> Result<MerTexture> {
    let planes = ChannelExtractor::extract(specular)?;
    let any_subsurface = has_subsurface(&planes);

    let channels = planes.as_specular();
    let count = planes.pixel_count();

    let metallic = channels
        .reflectance
        .iter()
        .map(|&f0| BidirectionalWorkflowConverter::f0_to_metallic(f0))
        .collect();
    let roughness = channels
        .smoothness
        .iter()
        .map(|&s| BidirectionalWorkflowConverter::smoothness_to_bedrock_roughness(s))
        .collect();
    let subsurface = if any_subsurface {
        channels
            .porosity_or_subsurface
            .iter()
            .map(|&v| if v >= SUBSURFACE_MIN { v } else { 255 })
            .collect()
    } else {
        vec![255; count]
    };

    let buffer = ChannelExtractor::combine(&ChannelPlanes {
        width: planes.width,
        height: planes.height,
        r: metallic,
        g: vec![0; count],
        b: roughness,
        a: Some(subsurface),
    })?;

    Ok(MerTexture {
        buffer,
        has_subsurface: any_subsurface,
    })
}

/// Convert a packed MER texture (plus optional base color and normal map)
/// to LabPBR.
pub fn convert_to_labpbr(
    mer_path: &Path,
    base_path: Option<&Path>,
    normal_path: Option<&Path>,
    options: &ConversionOptions,
) -> ConversionResult {
    let mut result = ConversionResult::new(mer_path);
    result.direction = Some(ConversionDirection::BedrockToLabPbr);
    let outcome = run_to_labpbr(&mut result, mer_path, base_path, normal_path, options);
    result.finish(outcome)
}

fn run_to_labpbr(
    result: &mut ConversionResult,
    mer_path: &Path,
    base_path: Option<&Path>,
    normal_path: Option<&Path>,
    options: &ConversionOptions,
) -> Result<()> {
    let base_name = base_name_of(mer_path);
    let mer = ImageLoader::load(mer_path)?;
    let base = match base_path {
        Some(path) => Some(ImageLoader::load(path)?),
        None => {
            result.warn("no base color texture; metals default to iron");
            None
        }
    };

    let specular = create_labpbr_specular(&mer, base.as_ref(), options.default_porosity)?;
    result.save(
        OutputKind::Specular,
        &specular,
        options.output_path(mer_path, &base_name, SPECULAR_SUFFIX),
        options,
    )?;

    if let Some(path) = normal_path {
        let normal = ImageLoader::load(path)?;
        let labpbr_normal = create_labpbr_normal(&normal)?;
        result.save(
            OutputKind::LabPbrNormal,
            &labpbr_normal,
            options.output_path(mer_path, &base_name, NORMAL_SUFFIX),
            options,
        )?;

        if options.extract_height {
            match NormalMapProcessor::extract_height_map(&normal) {
                Ok(height) => result.save(
                    OutputKind::HeightMap,
                    &height,
                    options.output_path(mer_path, &base_name, HEIGHTMAP_SUFFIX),
                    options,
                )?,
                Err(e) => result.warn(format!("heightmap skipped: {}", e)),
            }
        }
    } else if options.extract_height {
        result.warn("heightmap skipped: no normal map to read height from");
    }

    if options.bake_ao {
        result.warn("AO baking skipped: packed textures carry no ambient occlusion");
    }

    Ok(())
}

/// Convert a LabPBR specular + normal pair to packed MER.
pub fn convert_to_bedrock(
    specular_path: &Path,
    normal_path: &Path,
    base_path: Option<&Path>,
    options: &ConversionOptions,
) -> ConversionResult {
    let mut result = ConversionResult::new(specular_path);
    result.direction = Some(ConversionDirection::LabPbrToBedrock);
    let outcome = run_to_bedrock(&mut result, specular_path, normal_path, base_path, options);
    result.finish(outcome)
}

fn run_to_bedrock(
    result: &mut ConversionResult,
    specular_path: &Path,
    normal_path: &Path,
    base_path: Option<&Path>,
    options: &ConversionOptions,
) -> Result<()> {
    let base_name = base_name_of(specular_path);
    let specular = ImageLoader::load(specular_path)?;
    let normal = ImageLoader::load(normal_path)?;

    let mer = create_bedrock_mer(&specular)?;
    if mer.has_subsurface {
        result.info("subsurface found; writing alpha");
    }
    result.save(
        OutputKind::Mer,
        &mer.buffer,
        options.output_path(specular_path, &base_name, mer.suffix()),
        options,
    )?;

    let reconstructed = NormalMapProcessor::reconstruct_normal_map(&normal)?;
    result.save(
        OutputKind::Normal,
        &reconstructed,
        options.output_path(specular_path, &base_name, COMPANION_NORMAL_SUFFIX),
        options,
    )?;

    if options.extract_height {
        match NormalMapProcessor::extract_height_map(&normal) {
            Ok(height) => result.save(
                OutputKind::HeightMap,
                &height,
                options.output_path(specular_path, &base_name, HEIGHTMAP_SUFFIX),
                options,
            )?,
            Err(e) => result.warn(format!("heightmap skipped: {}", e)),
        }
    }

    if options.bake_ao {
        match base_path {
            Some(path) => {
                let base = ImageLoader::load(path)?;
                ensure_same_size(&normal, &base)?;
                let planes = ChannelExtractor::extract(&normal)?;
                let ao = planes.as_normal().ambient_occlusion;
                let baked = NormalMapProcessor::bake_ao_into_base_color(ao, &base)?;
                result.save(
                    OutputKind::BaseColorWithAo,
                    &baked,
                    options.output_path(specular_path, &base_name, WITH_AO_SUFFIX),
                    options,
                )?;
            }
            None => result.warn("AO baking skipped: no base color texture"),
        }
    }

    Ok(())
}

/// Detect the convention of `path` and convert it. A forced direction other
/// than [`ConversionDirection::Auto`] overrides detection.
pub fn convert_auto(
    path: &Path,
    forced: Option<ConversionDirection>,
    options: &ConversionOptions,
) -> ConversionResult {
    let mut result = ConversionResult::new(path);
    let outcome = FormatDetector::detect_format_with_content(path).and_then(|detection| {
        result.info(format!(
            "detected {} (confidence {:.2})",
            detection.format.label(),
            detection.confidence
        ));
        run_detected(&mut result, path, &detection, forced, options)
    });
    result.finish(outcome)
}

fn run_detected(
    result: &mut ConversionResult,
    path: &Path,
    detection: &DetectionResult,
    forced: Option<ConversionDirection>,
    options: &ConversionOptions,
) -> Result<()> {
    let direction = match forced {
        Some(d) if d != ConversionDirection::Auto => d,
        _ => FormatDetector::determine_conversion_direction(detection.format),
    };
    result.direction = Some(direction);

    match direction {
        ConversionDirection::BedrockToLabPbr => {
            let mer = source_texture(
                path,
                detection.mer_texture_path.as_deref(),
                &detection.base_name,
                NameSuffix::Mer,
            )?;
            let base = detection
                .base_texture_path
                .as_deref()
                .filter(|b| *b != mer);
            let normal = sibling_of(&mer, &detection.base_name, COMPANION_NORMAL_SUFFIX);
            let normal = normal.is_file().then_some(normal);
            run_to_labpbr(result, &mer, base, normal.as_deref(), options)
        }
        ConversionDirection::LabPbrToBedrock => {
            let specular = source_texture(
                path,
                detection.specular_texture_path.as_deref(),
                &detection.base_name,
                NameSuffix::Specular,
            )?;
            let normal = detection.normal_texture_path.as_deref().ok_or_else(|| {
                Error::NotFound(sibling_of(&specular, &detection.base_name, NORMAL_SUFFIX))
            })?;
            let base = detection
                .base_texture_path
                .as_deref()
                .filter(|b| *b != specular);
            run_to_bedrock(result, &specular, normal, base, options)
        }
        ConversionDirection::Auto => Err(Error::AmbiguousFormat(path.to_path_buf())),
    }
}

/// `<base_name><suffix>.<ext>` in the directory of `path`, with the extension
/// of `path`.
fn sibling_of(path: &Path, base_name: &str, suffix: &str) -> PathBuf {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("png");
    path.with_file_name(format!("{}{}.{}", base_name, suffix, ext))
}

/// The texture a conversion reads from: the sibling found by detection, or
/// the input itself when its suffix does not tie it to another role in the
/// set. A `_n` input never stands in for a specular or MER texture.
fn source_texture(
    path: &Path,
    detected: Option<&Path>,
    base_name: &str,
    wanted: NameSuffix,
) -> Result<PathBuf> {
    if let Some(found) = detected {
        return Ok(found.to_path_buf());
    }
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    match split_suffix(stem).1 {
        None => Ok(path.to_path_buf()),
        Some(suffix) if suffix != NameSuffix::Normal && suffix.format() == wanted.format() => {
            Ok(path.to_path_buf())
        }
        Some(_) => Err(Error::NotFound(sibling_of(path, base_name, wanted.as_str()))),
    }
}

/// Results of a directory conversion
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub results: Vec<ConversionResult>,
    /// Files whose convention could not be determined
    pub skipped: Vec<PathBuf>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Collect texture files under `dir`, sorted, leaving out this tool's own
/// derived outputs.
fn collect_textures(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let mut walker = WalkDir::new(dir).min_depth(1);
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file() || !ImageLoader::is_image_path(path) {
            continue;
        }
        let derived = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(is_derived_output)
            .unwrap_or(true);
        if !derived {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

/// Convert every texture set in a directory, one set at a time.
///
/// Files sharing a base name form one set and are converted once. A failing
/// set is recorded and the batch moves on.
pub fn convert_directory(
    dir: &Path,
    recursive: bool,
    forced: Option<ConversionDirection>,
    options: &ConversionOptions,
) -> Result<BatchReport> {
    if !dir.is_dir() {
        return Err(Error::NotFound(dir.to_path_buf()));
    }

    let files = collect_textures(dir, recursive)?;
    let mut report = BatchReport::default();
    let mut seen: HashSet<PathBuf> = HashSet::new();

    for file in files {
        let detection = FormatDetector::detect_format(&file);
        let key = file.with_file_name(detection.base_name.to_lowercase());
        if seen.contains(&key) {
            continue;
        }

        let direction = match forced {
            Some(d) if d != ConversionDirection::Auto => d,
            _ => FormatDetector::determine_conversion_direction(detection.format),
        };
        if direction == ConversionDirection::Auto {
            report.skipped.push(file);
            continue;
        }
        seen.insert(key);

        let mut result = ConversionResult::new(&file);
        result.info(format!(
            "detected {} (confidence {:.2})",
            detection.format.label(),
            detection.confidence
        ));
        let outcome = run_detected(&mut result, &file, &detection, Some(direction), options);
        report.results.push(result.finish(outcome));
    }

    Ok(report)
}
