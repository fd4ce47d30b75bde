//! Planar channel views over interleaved pixel buffers.
//!
//! Conversion math works one channel at a time, so textures are split into
//! per-channel planes, transformed, and recombined.

use crate::image_loading::PixelBuffer;
use crate::{Error, Result};

/// One byte plane per channel, addressed by pixel index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelPlanes {
    pub width: u32,
    pub height: u32,
    pub r: Vec<u8>,
    pub g: Vec<u8>,
    pub b: Vec<u8>,
    pub a: Option<Vec<u8>>,
}

impl ChannelPlanes {
    /// Total number of pixels
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Packed convention: metallic (R), emissive (G), roughness (B), subsurface (A).
    pub fn as_mer(&self) -> MerChannels<'_> {
        MerChannels {
            metallic: &self.r,
            emissive: &self.g,
            roughness: &self.b,
            subsurface: self.a.as_deref(),
        }
    }

    /// LabPBR specular: smoothness (R), reflectance (G), porosity/subsurface (B), emission (A).
    pub fn as_specular(&self) -> SpecularChannels<'_> {
        SpecularChannels {
            smoothness: &self.r,
            reflectance: &self.g,
            porosity_or_subsurface: &self.b,
            emission: self.a.as_deref(),
        }
    }

    /// LabPBR normal: X (R), Y (G), ambient occlusion (B), height (A).
    pub fn as_normal(&self) -> NormalChannels<'_> {
        NormalChannels {
            x: &self.r,
            y: &self.g,
            ambient_occlusion: &self.b,
            height: self.a.as_deref(),
        }
    }

    fn check_lengths(&self) -> Result<()> {
        let expected = self.pixel_count();
        let planes = [Some(&self.r), Some(&self.g), Some(&self.b), self.a.as_ref()];
        for plane in planes.into_iter().flatten() {
            if plane.len() != expected {
                return Err(Error::InvalidBuffer {
                    expected,
                    actual: plane.len(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MerChannels<'a> {
    pub metallic: &'a [u8],
    pub emissive: &'a [u8],
    pub roughness: &'a [u8],
    pub subsurface: Option<&'a [u8]>,
}

#[derive(Debug, Clone, Copy)]
pub struct SpecularChannels<'a> {
    pub smoothness: &'a [u8],
    pub reflectance: &'a [u8],
    pub porosity_or_subsurface: &'a [u8],
    pub emission: Option<&'a [u8]>,
}

#[derive(Debug, Clone, Copy)]
pub struct NormalChannels<'a> {
    pub x: &'a [u8],
    pub y: &'a [u8],
    pub ambient_occlusion: &'a [u8],
    pub height: Option<&'a [u8]>,
}

/// Splits interleaved buffers into planes and back
pub struct ChannelExtractor;

impl ChannelExtractor {
    /// Split an RGB/RGBA buffer into planes. Single-channel buffers are
    /// replicated into R, G and B.
    pub fn extract(buffer: &PixelBuffer) -> Result<ChannelPlanes> {
        buffer.validate()?;
        let count = buffer.pixel_count();
        let stride = buffer.channels as usize;

        let mut r = Vec::with_capacity(count);
        let mut g = Vec::with_capacity(count);
        let mut b = Vec::with_capacity(count);
        let mut a = buffer.has_alpha().then(|| Vec::with_capacity(count));

        for px in buffer.data.chunks_exact(stride) {
            if stride == 1 {
                r.push(px[0]);
                g.push(px[0]);
                b.push(px[0]);
                continue;
            }
            r.push(px[0]);
            g.push(px[1]);
            b.push(px[2]);
            if let Some(a) = a.as_mut() {
                a.push(px[3]);
            }
        }

        Ok(ChannelPlanes {
            width: buffer.width,
            height: buffer.height,
            r,
            g,
            b,
            a,
        })
    }

    /// Interleave planes into a buffer; 4 channels when alpha is present, else 3.
    pub fn combine(planes: &ChannelPlanes) -> Result<PixelBuffer> {
        planes.check_lengths()?;
        let count = planes.pixel_count();
        let channels: u8 = if planes.a.is_some() { 4 } else { 3 };
        let mut data = Vec::with_capacity(count * channels as usize);

        for i in 0..count {
            data.extend_from_slice(&[planes.r[i], planes.g[i], planes.b[i]]);
            if let Some(a) = planes.a.as_ref() {
                data.push(a[i]);
            }
        }

        Ok(PixelBuffer {
            width: planes.width,
            height: planes.height,
            channels,
            data,
        })
    }

    /// Wrap a single plane as a one-channel buffer.
    pub fn single(plane: Vec<u8>, width: u32, height: u32) -> Result<PixelBuffer> {
        PixelBuffer::new(width, height, 1, plane)
    }
}
