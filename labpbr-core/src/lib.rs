//! # LabPBR Core
//!
//! Converts material textures between the packed MER convention
//! (metallic/emissive/roughness, optional subsurface in alpha) and LabPBR
//! (specular + normal textures). Designed for use by CLI tools.
//!
//! ## Architecture
//!
//! - [`image_loading`] - Pixel buffers, image loading and saving
//! - [`channels`] - Splitting buffers into channel planes and back
//! - [`workflow`] - MER -> LabPBR channel math
//! - [`bidirectional`] - LabPBR -> MER channel math
//! - [`normal_map`] - Normal reconstruction, heightmaps, AO baking
//! - [`detection`] - Naming and content based format detection
//! - [`conversion`] - Whole-texture conversions and directory batches
//! - [`config`] - TOML configuration

pub mod bidirectional;
pub mod channels;
pub mod config;
pub mod conversion;
pub mod detection;
pub mod image_loading;
pub mod normal_map;
pub mod workflow;

// Re-export main types for convenient access
pub use bidirectional::BidirectionalWorkflowConverter;
pub use channels::{ChannelExtractor, ChannelPlanes, MerChannels, NormalChannels, SpecularChannels};
pub use config::ConverterConfig;
pub use conversion::{
    convert_auto, convert_directory, convert_to_bedrock, convert_to_labpbr, create_bedrock_mer,
    create_labpbr_normal, create_labpbr_specular, BatchReport, ConversionOptions, ConversionResult,
    MerTexture, OutputKind,
};
pub use detection::{
    ContentAnalysis, ConversionDirection, DetectionResult, FormatDetector, TextureFormat,
};
pub use image_loading::{save_texture, ImageLoader, OutputFormat, PixelBuffer, SaveOptions};
pub use normal_map::NormalMapProcessor;
pub use workflow::{PredefinedMetal, WorkflowConverter};

/// Common result type for conversion operations
pub type Result<T> = std::result::Result<T, Error>;

/// Library-wide error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("File not found: {}", .0.display())]
    NotFound(std::path::PathBuf),

    #[error("Invalid pixel buffer: expected {expected} bytes, got {actual}")]
    InvalidBuffer { expected: usize, actual: usize },

    #[error("Unsupported channel count: {0} (expected 1, 3 or 4)")]
    InvalidChannelCount(usize),

    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error(
        "Texture size mismatch: expected {}x{}, got {}x{}",
        .expected.0,
        .expected.1,
        .actual.0,
        .actual.1
    )]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("Missing {0} channel")]
    MissingChannel(&'static str),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Format is ambiguous for {}: force a conversion direction", .0.display())]
    AmbiguousFormat(std::path::PathBuf),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("{0}")]
    Other(String),
}
