//! Packed MER to LabPBR channel transfer functions.
//!
//! Every function maps 8-bit channel values to 8-bit channel values. LabPBR
//! reserves parts of several channels for special meanings:
//!
//! - reflectance 230-255 names a predefined metal instead of an F0 value
//! - emission 255 is ignored by shaders, so it is never produced
//! - porosity/subsurface shares one channel: 0-64 porosity, 65-255 subsurface

use serde::{Deserialize, Serialize};

/// Metallic values above this are treated as metal.
pub const METALLIC_THRESHOLD: u8 = 200;

/// First reflectance code of the predefined-metal range.
pub const PREDEFINED_METAL_START: u8 = 230;

/// Highest porosity value; subsurface starts right after it.
pub const POROSITY_MAX: u8 = 64;

/// Lowest non-zero subsurface value.
pub const SUBSURFACE_MIN: u8 = 65;

/// Largest emission value LabPBR treats as emissive.
pub const EMISSION_MAX: u8 = 254;

/// Lowest dielectric reflectance produced by [`WorkflowConverter::metallic_to_f0`].
const DIELECTRIC_F0_MIN: f32 = 4.0;
/// Highest dielectric reflectance, just below the predefined-metal range.
const DIELECTRIC_F0_MAX: f32 = 229.0;

/// Metals with reserved LabPBR reflectance codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredefinedMetal {
    Iron,
    Gold,
    Aluminum,
    Chrome,
    Copper,
    Lead,
    Platinum,
    Silver,
}

impl PredefinedMetal {
    pub const ALL: [PredefinedMetal; 8] = [
        PredefinedMetal::Iron,
        PredefinedMetal::Gold,
        PredefinedMetal::Aluminum,
        PredefinedMetal::Chrome,
        PredefinedMetal::Copper,
        PredefinedMetal::Lead,
        PredefinedMetal::Platinum,
        PredefinedMetal::Silver,
    ];

    /// Reflectance code stored in the specular green channel (230-237).
    pub fn code(&self) -> u8 {
        match self {
            PredefinedMetal::Iron => 230,
            PredefinedMetal::Gold => 231,
            PredefinedMetal::Aluminum => 232,
            PredefinedMetal::Chrome => 233,
            PredefinedMetal::Copper => 234,
            PredefinedMetal::Lead => 235,
            PredefinedMetal::Platinum => 236,
            PredefinedMetal::Silver => 237,
        }
    }

    /// The metal a code names, if any. 238-255 are reserved but unassigned.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.code() == code)
    }

    pub fn label(&self) -> &'static str {
        match self {
            PredefinedMetal::Iron => "iron",
            PredefinedMetal::Gold => "gold",
            PredefinedMetal::Aluminum => "aluminum",
            PredefinedMetal::Chrome => "chrome",
            PredefinedMetal::Copper => "copper",
            PredefinedMetal::Lead => "lead",
            PredefinedMetal::Platinum => "platinum",
            PredefinedMetal::Silver => "silver",
        }
    }
}

#[inline]
fn to_byte(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Forward (packed -> LabPBR) conversions
pub struct WorkflowConverter;

impl WorkflowConverter {
    /// Perceptual roughness to LabPBR smoothness: `255 * (1 - sqrt(r / 255))`.
    pub fn roughness_to_smoothness(roughness: u8) -> u8 {
        let r = roughness as f32 / 255.0;
        to_byte(255.0 * (1.0 - r.sqrt()))
    }

    /// Smoothness to roughness: `255 * (1 - s / 255)^2`.
    ///
    /// Not an exact inverse of [`Self::roughness_to_smoothness`]; rounding
    /// on both sides loses up to a couple of levels.
    pub fn smoothness_to_roughness(smoothness: u8) -> u8 {
        let s = smoothness as f32 / 255.0;
        to_byte(255.0 * (1.0 - s).powi(2))
    }

    /// Metallic to reflectance. Metals land in the predefined range 230-255,
    /// dielectrics are spread linearly over 4-229.
    pub fn metallic_to_f0(metallic: u8) -> u8 {
        if Self::is_metallic(metallic) {
            let step = (metallic - METALLIC_THRESHOLD) / 5;
            return PREDEFINED_METAL_START.saturating_add(step);
        }
        let m = metallic as f32 / 255.0;
        to_byte(DIELECTRIC_F0_MIN + m * (DIELECTRIC_F0_MAX - DIELECTRIC_F0_MIN))
    }

    /// Clamp emission below the reserved value 255.
    pub fn convert_emissive(emissive: u8) -> u8 {
        emissive.min(EMISSION_MAX)
    }

    pub fn is_metallic(metallic: u8) -> bool {
        metallic > METALLIC_THRESHOLD
    }

    /// Best-effort guess of a metal from its base color.
    ///
    /// The buckets overlap and everything unrecognised falls back to iron, so
    /// treat the answer as low confidence.
    pub fn get_predefined_metal(r: u8, g: u8, b: u8) -> PredefinedMetal {
        if r > 200 && g > 200 && b > 200 {
            return PredefinedMetal::Silver;
        }
        if r > 200 && g > 150 && b < 100 {
            return PredefinedMetal::Gold;
        }
        if r > 200 && g < 150 && b < 100 {
            return PredefinedMetal::Copper;
        }
        PredefinedMetal::Iron
    }

    /// Pack subsurface strength into 65-255. Zero stays zero (no subsurface).
    pub fn convert_subsurface(subsurface: u8) -> u8 {
        if subsurface == 0 {
            return 0;
        }
        let s = subsurface as f32 / 255.0;
        let span = (255 - SUBSURFACE_MIN) as f32;
        SUBSURFACE_MIN + (s * span).floor() as u8
    }

    /// Pack a porosity fraction (0.0-1.0) into 0-64.
    pub fn convert_porosity(porosity: f32) -> u8 {
        (porosity.clamp(0.0, 1.0) * POROSITY_MAX as f32).round() as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smoothness_is_monotonic_and_in_range() {
        let mut prev = u8::MAX;
        for r in 0..=255u8 {
            let s = WorkflowConverter::roughness_to_smoothness(r);
            assert!(s <= prev, "smoothness increased at roughness {}", r);
            prev = s;
        }
        assert_eq!(WorkflowConverter::roughness_to_smoothness(0), 255);
        assert_eq!(WorkflowConverter::roughness_to_smoothness(255), 0);
    }

    #[test]
    fn roughness_round_trip_is_close_but_lossy() {
        let mut exact = true;
        for r in 0..=255u8 {
            let s = WorkflowConverter::roughness_to_smoothness(r);
            let back = WorkflowConverter::smoothness_to_roughness(s);
            assert!(
                (back as i16 - r as i16).abs() <= 2,
                "roughness {} came back as {}",
                r,
                back
            );
            exact &= back == r;
        }
        assert!(!exact, "round trip should not be an exact identity");
    }

    #[test]
    fn metallic_to_f0_ranges() {
        for m in 0..=255u8 {
            let f0 = WorkflowConverter::metallic_to_f0(m);
            if m > 200 {
                assert!((230..=255).contains(&f0), "metal {} -> {}", m, f0);
            } else {
                assert!((4..=229).contains(&f0), "dielectric {} -> {}", m, f0);
            }
        }
        assert_eq!(WorkflowConverter::metallic_to_f0(0), 4);
        assert_eq!(WorkflowConverter::metallic_to_f0(201), 230);
        assert_eq!(WorkflowConverter::metallic_to_f0(255), 241);
    }

    #[test]
    fn emissive_never_reaches_reserved_value() {
        assert_eq!(WorkflowConverter::convert_emissive(255), 254);
        assert_eq!(WorkflowConverter::convert_emissive(0), 0);
        assert_eq!(WorkflowConverter::convert_emissive(128), 128);
    }

    #[test]
    fn subsurface_packs_above_porosity_range() {
        assert_eq!(WorkflowConverter::convert_subsurface(0), 0);
        for s in 1..=255u8 {
            let v = WorkflowConverter::convert_subsurface(s);
            assert!((65..=255).contains(&v), "subsurface {} -> {}", s, v);
        }
        assert_eq!(WorkflowConverter::convert_subsurface(255), 255);
    }

    #[test]
    fn porosity_stays_in_porosity_range() {
        assert_eq!(WorkflowConverter::convert_porosity(0.0), 0);
        assert_eq!(WorkflowConverter::convert_porosity(0.1), 6);
        assert_eq!(WorkflowConverter::convert_porosity(1.0), 64);
        assert_eq!(WorkflowConverter::convert_porosity(3.0), 64);
    }

    #[test]
    fn predefined_metal_buckets() {
        assert_eq!(WorkflowConverter::get_predefined_metal(230, 190, 50), PredefinedMetal::Gold);
        assert_eq!(WorkflowConverter::get_predefined_metal(230, 120, 60), PredefinedMetal::Copper);
        assert_eq!(WorkflowConverter::get_predefined_metal(240, 240, 240), PredefinedMetal::Silver);
        assert_eq!(WorkflowConverter::get_predefined_metal(128, 128, 128), PredefinedMetal::Iron);
        assert_eq!(WorkflowConverter::get_predefined_metal(0, 0, 0), PredefinedMetal::Iron);
    }

    #[test]
    fn metal_codes_round_trip() {
        for metal in PredefinedMetal::ALL {
            assert_eq!(PredefinedMetal::from_code(metal.code()), Some(metal));
        }
        assert_eq!(PredefinedMetal::from_code(238), None);
        assert_eq!(PredefinedMetal::from_code(229), None);
    }
}
