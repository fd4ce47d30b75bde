//! LabPBR to packed MER channel transfer functions.
//!
//! These are not mathematical inverses of [`crate::workflow`]: roughness is a
//! plain complement and metallic is recovered in six coarse tiers.

use crate::workflow::{PredefinedMetal, EMISSION_MAX, PREDEFINED_METAL_START, SUBSURFACE_MIN};

/// Inverse (LabPBR -> packed) conversions
pub struct BidirectionalWorkflowConverter;

impl BidirectionalWorkflowConverter {
    /// Roughness as the direct complement of smoothness.
    pub fn smoothness_to_bedrock_roughness(smoothness: u8) -> u8 {
        255 - smoothness
    }

    /// Reflectance to one of six metallic tiers.
    pub fn f0_to_metallic(f0: u8) -> u8 {
        match f0 {
            200..=255 => 255,
            150..=199 => 230,
            100..=149 => 180,
            50..=99 => 100,
            _ => 0,
        }
    }

    /// Rescale LabPBR emission (0-254) back to the full 0-255 range.
    pub fn labpbr_emissive_to_bedrock_emissive(emission: u8) -> u8 {
        if emission == 0 {
            return 0;
        }
        let scaled = (emission as f32 / EMISSION_MAX as f32 * 255.0).round();
        scaled.min(255.0) as u8
    }

    /// Unpack subsurface from 65-255 to 0-255. Values below 65 are porosity,
    /// which has no packed counterpart, and map to zero.
    pub fn labpbr_subsurface_to_bedrock_subsurface(value: u8) -> u8 {
        if value < SUBSURFACE_MIN {
            return 0;
        }
        let span = (255 - SUBSURFACE_MIN) as f32;
        ((value - SUBSURFACE_MIN) as f32 / span * 255.0).round() as u8
    }

    /// Tangent-space Z from X/Y via the unit-length constraint.
    ///
    /// X and Y are read as 0-1 magnitudes; anything outside the unit disc
    /// clamps to Z = 0.
    pub fn reconstruct_normal_map_blue_channel(r: u8, g: u8) -> u8 {
        let x = r as f32 / 255.0;
        let y = g as f32 / 255.0;
        let z2 = 1.0 - x * x - y * y;
        let z = if z2.is_nan() || z2 <= 0.0 { 0.0 } else { z2.sqrt() };
        (z * 255.0).round().clamp(0.0, 255.0) as u8
    }

    pub fn is_predefined_metal(f0: u8) -> bool {
        f0 >= PREDEFINED_METAL_START
    }

    /// Metal named by a reflectance code; `None` for dielectrics and for the
    /// unassigned codes 238-255.
    pub fn get_predefined_metal_type(f0: u8) -> Option<PredefinedMetal> {
        if !Self::is_predefined_metal(f0) {
            return None;
        }
        PredefinedMetal::from_code(f0)
    }
}
