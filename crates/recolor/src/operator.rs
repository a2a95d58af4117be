//! Per-pixel recolor transform.
//!
//! The transform reads the first channel of each input pixel as a
//! quantized intensity index and replaces the whole pixel with the table
//! color for that index. It is applied on every render pass of the raster
//! layer and touches nothing but the produced pixels.

use rayon::prelude::*;

use crate::colormap::{ColorMap, Rgba};

/// Pixels per row chunk handed to the thread pool.
const PAR_CHUNK_PIXELS: usize = 256;

/// Recolor a single pixel: `table[min(intensity, N - 1)]`.
///
/// Out-of-range intensity is defined behavior (clamp), not a fault.
#[inline]
pub fn recolor_pixel(intensity: u8, map: &ColorMap) -> Rgba {
    map.lookup(intensity)
}

/// Recolor a whole RGBA tile buffer, producing a new buffer.
///
/// The first byte of each 4-byte pixel is the intensity index; the other
/// three input channels are ignored. Any ragged tail shorter than one
/// pixel is copied through unchanged.
pub fn recolor_tile(pixels: &[u8], map: &ColorMap) -> Vec<u8> {
    let mut out = pixels.to_vec();
    recolor_tile_in_place(&mut out, map);
    out
}

/// Recolor a whole RGBA tile buffer in place.
pub fn recolor_tile_in_place(pixels: &mut [u8], map: &ColorMap) {
    pixels
        .par_chunks_mut(PAR_CHUNK_PIXELS * 4)
        .for_each(|chunk| {
            for px in chunk.chunks_exact_mut(4) {
                let color = map.lookup(px[0]);
                px.copy_from_slice(&color);
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colormap::ColorMap;

    fn two_entry_map() -> ColorMap {
        ColorMap::new("test", vec![[0, 0, 0, 0], [10, 20, 30, 40]]).unwrap()
    }

    #[test]
    fn test_recolor_pixel_clamps() {
        let map = two_entry_map();
        assert_eq!(recolor_pixel(0, &map), [0, 0, 0, 0]);
        assert_eq!(recolor_pixel(1, &map), [10, 20, 30, 40]);
        assert_eq!(recolor_pixel(200, &map), [10, 20, 30, 40]);
    }

    #[test]
    fn test_recolor_tile_maps_first_channel() {
        let map = two_entry_map();
        // Two pixels: intensity 0 and intensity 7 (clamped to 1).
        let src = vec![0, 99, 99, 99, 7, 99, 99, 99];
        let out = recolor_tile(&src, &map);
        assert_eq!(out, vec![0, 0, 0, 0, 10, 20, 30, 40]);
        // Input untouched.
        assert_eq!(src[1], 99);
    }

    #[test]
    fn test_recolor_tile_ragged_tail() {
        let map = two_entry_map();
        let src = vec![1, 2, 3, 4, 5, 6];
        let out = recolor_tile(&src, &map);
        assert_eq!(&out[0..4], &[10, 20, 30, 40]);
        // Trailing partial pixel passes through.
        assert_eq!(&out[4..], &[5, 6]);
    }
}
