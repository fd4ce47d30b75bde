//! Normal map processing: blue-channel reconstruction, heightmap extraction,
//! and ambient-occlusion baking.

use crate::bidirectional::BidirectionalWorkflowConverter;
use crate::channels::ChannelExtractor;
use crate::image_loading::PixelBuffer;
use crate::{Error, Result};

/// Strength of the AO darkening applied by [`NormalMapProcessor::bake_ao_into_base_color`].
const AO_STRENGTH: f32 = 0.5;

pub struct NormalMapProcessor;

impl NormalMapProcessor {
    /// Copy the alpha (height) channel of a LabPBR normal texture into a
    /// single-channel buffer.
    pub fn extract_height_map(normal: &PixelBuffer) -> Result<PixelBuffer> {
        if !normal.has_alpha() {
            return Err(Error::MissingChannel("height (alpha)"));
        }
        let planes = ChannelExtractor::extract(normal)?;
        let height = planes.a.ok_or(Error::MissingChannel("height (alpha)"))?;
        ChannelExtractor::single(height, normal.width, normal.height)
    }

    /// RGB normal map with Z rebuilt from X/Y. Whatever the source stored in
    /// blue (LabPBR keeps AO there) is discarded.
    pub fn reconstruct_normal_map(normal: &PixelBuffer) -> Result<PixelBuffer> {
        let planes = ChannelExtractor::extract(normal)?;
        Self::create_directx_normal_map(&planes.r, &planes.g, normal.width, normal.height)
    }

    /// Darken base color by an AO plane (0 = fully occluded, 255 = open).
    /// Alpha passes through.
    pub fn bake_ao_into_base_color(ao: &[u8], base_color: &PixelBuffer) -> Result<PixelBuffer> {
        base_color.validate()?;
        if ao.len() != base_color.pixel_count() {
            return Err(Error::InvalidBuffer {
                expected: base_color.pixel_count(),
                actual: ao.len(),
            });
        }

        let stride = base_color.channels as usize;
        let color_channels = stride.min(3);
        let mut data = base_color.data.clone();

        for (px, &occlusion) in data.chunks_exact_mut(stride).zip(ao) {
            let ao_factor = 1.0 - occlusion as f32 / 255.0;
            let scale = 1.0 - ao_factor * AO_STRENGTH;
            for value in px.iter_mut().take(color_channels) {
                *value = (*value as f32 * scale).round().clamp(0.0, 255.0) as u8;
            }
        }

        PixelBuffer::new(base_color.width, base_color.height, base_color.channels, data)
    }

    /// Build an RGB normal map from separate X and Y planes.
    pub fn create_directx_normal_map(
        x: &[u8],
        y: &[u8],
        width: u32,
        height: u32,
    ) -> Result<PixelBuffer> {
        let count = (width as usize) * (height as usize);
        if x.len() != count || y.len() != count {
            return Err(Error::InvalidBuffer {
                expected: count,
                actual: x.len().min(y.len()),
            });
        }

        let mut data = Vec::with_capacity(count * 3);
        for (&nx, &ny) in x.iter().zip(y) {
            let nz = BidirectionalWorkflowConverter::reconstruct_normal_map_blue_channel(nx, ny);
            data.extend_from_slice(&[nx, ny, nz]);
        }
        PixelBuffer::new(width, height, 3, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn labpbr_normal() -> PixelBuffer {
        // x, y, ao, height
        PixelBuffer::new(
            2,
            1,
            4,
            vec![0, 0, 255, 10, 255, 255, 0, 200],
        )
        .unwrap()
    }

    #[test]
    fn extract_height_map_copies_alpha() {
        let height = NormalMapProcessor::extract_height_map(&labpbr_normal()).unwrap();
        assert_eq!(height.channels, 1);
        assert_eq!(height.data, vec![10, 200]);
    }

    #[test]
    fn extract_height_map_requires_alpha() {
        let rgb = PixelBuffer::filled(2, 2, &[128, 128, 255]).unwrap();
        let err = NormalMapProcessor::extract_height_map(&rgb).unwrap_err();
        assert!(matches!(err, Error::MissingChannel(_)));
    }

    #[test]
    fn reconstruct_replaces_blue() {
        let normal = NormalMapProcessor::reconstruct_normal_map(&labpbr_normal()).unwrap();
        assert_eq!(normal.channels, 3);
        assert_eq!(normal.data, vec![0, 0, 255, 255, 255, 0]);
    }

    #[test]
    fn bake_ao_darkens_color_and_keeps_alpha() {
        let base = PixelBuffer::new(2, 1, 4, vec![200, 100, 50, 77, 200, 100, 50, 88]).unwrap();
        let baked = NormalMapProcessor::bake_ao_into_base_color(&[0, 255], &base).unwrap();
        // Full occlusion halves the color, no occlusion leaves it alone.
        assert_eq!(baked.data, vec![100, 50, 25, 77, 200, 100, 50, 88]);
    }

    #[test]
    fn bake_ao_rejects_mismatched_plane() {
        let base = PixelBuffer::filled(2, 2, &[1, 2, 3]).unwrap();
        assert!(NormalMapProcessor::bake_ao_into_base_color(&[0; 3], &base).is_err());
    }

    #[test]
    fn directx_normal_from_planes() {
        let map =
            NormalMapProcessor::create_directx_normal_map(&[0, 128], &[0, 128], 2, 1).unwrap();
        assert_eq!(map.data, vec![0, 0, 255, 128, 128, 180]);
    }
}
