use crate::palette::Palette;

/// Dithering mode. Off by default — error diffusion is an opt-in tradeoff
/// between banding and LZW compressibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DitherMode {
    /// Nearest color only.
    #[default]
    None,
    /// Floyd–Steinberg error diffusion in raster order.
    FloydSteinberg,
}

/// Map one frame's pixels to palette indices.
///
/// Pixels with alpha below `alpha_threshold` take the sentinel index and
/// neither receive nor emit diffusion error.
pub fn remap_frame(
    pixels: &[rgb::RGBA<u8>],
    width: usize,
    height: usize,
    palette: &Palette,
    alpha_threshold: u8,
    mode: DitherMode,
) -> Vec<u8> {
    match mode {
        DitherMode::None => simple_remap(pixels, palette, alpha_threshold),
        DitherMode::FloydSteinberg => {
            dither_floyd_steinberg(pixels, width, height, palette, alpha_threshold)
        }
    }
}

fn simple_remap(pixels: &[rgb::RGBA<u8>], palette: &Palette, alpha_threshold: u8) -> Vec<u8> {
    let sentinel = palette.transparent_index().unwrap_or(0);
    pixels
        .iter()
        .map(|p| {
            if p.a < alpha_threshold {
                sentinel
            } else {
                palette.nearest(p.r, p.g, p.b)
            }
        })
        .collect()
}

/// Floyd–Steinberg: quantization error at each pixel is spread to the
/// unvisited right/below neighbors with weights 7/16, 3/16, 5/16, 1/16.
/// Channels are clamped to [0, 255] before the next palette lookup.
fn dither_floyd_steinberg(
    pixels: &[rgb::RGBA<u8>],
    width: usize,
    height: usize,
    palette: &Palette,
    alpha_threshold: u8,
) -> Vec<u8> {
    let sentinel = palette.transparent_index().unwrap_or(0);

    // Working buffer carries the accumulated error per channel.
    let mut buf: Vec<[f32; 3]> = pixels
        .iter()
        .map(|p| [p.r as f32, p.g as f32, p.b as f32])
        .collect();

    let mut indices = vec![0u8; pixels.len()];

    for y in 0..height {
        for x in 0..width {
            let idx = y * width + x;

            if pixels[idx].a < alpha_threshold {
                indices[idx] = sentinel;
                continue;
            }

            let r = buf[idx][0].clamp(0.0, 255.0);
            let g = buf[idx][1].clamp(0.0, 255.0);
            let b = buf[idx][2].clamp(0.0, 255.0);

            let chosen = palette.nearest(r as u8, g as u8, b as u8);
            indices[idx] = chosen;

            let e = palette.entries()[chosen as usize];
            let err = [r - e[0] as f32, g - e[1] as f32, b - e[2] as f32];

            let mut diffuse = |target: usize, fraction: f32| {
                if pixels[target].a >= alpha_threshold {
                    buf[target][0] += err[0] * fraction;
                    buf[target][1] += err[1] * fraction;
                    buf[target][2] += err[2] * fraction;
                }
            };

            if x + 1 < width {
                diffuse(idx + 1, 7.0 / 16.0);
            }
            if y + 1 < height {
                if x > 0 {
                    diffuse((y + 1) * width + (x - 1), 3.0 / 16.0);
                }
                diffuse((y + 1) * width + x, 5.0 / 16.0);
                if x + 1 < width {
                    diffuse((y + 1) * width + (x + 1), 1.0 / 16.0);
                }
            }
        }
    }

    indices
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgba(r: u8, g: u8, b: u8, a: u8) -> rgb::RGBA<u8> {
        rgb::RGBA { r, g, b, a }
    }

    fn gray_palette() -> Palette {
        Palette::from_colors(
            vec![
                rgb::RGB { r: 0, g: 0, b: 0 },
                rgb::RGB { r: 85, g: 85, b: 85 },
                rgb::RGB { r: 170, g: 170, b: 170 },
                rgb::RGB { r: 255, g: 255, b: 255 },
            ],
            false,
        )
    }

    fn gradient(width: usize, height: usize) -> Vec<rgb::RGBA<u8>> {
        let mut pixels = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                let v = ((x + y) * 255 / (width + height - 2).max(1)) as u8;
                pixels.push(rgba(v, v, v, 255));
            }
        }
        pixels
    }

    #[test]
    fn no_dither_produces_valid_indices() {
        let palette = gray_palette();
        let pixels = gradient(16, 4);
        let indices = remap_frame(&pixels, 16, 4, &palette, 0, DitherMode::None);
        assert_eq!(indices.len(), 64);
        for &idx in &indices {
            assert!((idx as usize) < palette.len());
        }
    }

    #[test]
    fn dither_produces_valid_indices() {
        let palette = gray_palette();
        let pixels = gradient(16, 16);
        let indices = remap_frame(&pixels, 16, 16, &palette, 0, DitherMode::FloydSteinberg);
        assert_eq!(indices.len(), 256);
        for &idx in &indices {
            assert!((idx as usize) < palette.len());
        }
    }

    #[test]
    fn dither_is_deterministic() {
        let palette = gray_palette();
        let pixels = gradient(16, 16);
        let a = remap_frame(&pixels, 16, 16, &palette, 0, DitherMode::FloydSteinberg);
        let b = remap_frame(&pixels, 16, 16, &palette, 0, DitherMode::FloydSteinberg);
        assert_eq!(a, b);
    }

    #[test]
    fn dither_spreads_midtone_between_neighbors() {
        // A flat 128 field between levels 85 and 170 must use both.
        let palette = gray_palette();
        let pixels = vec![rgba(128, 128, 128, 255); 256];
        let indices = remap_frame(&pixels, 16, 16, &palette, 0, DitherMode::FloydSteinberg);
        assert!(indices.contains(&1));
        assert!(indices.contains(&2));
    }

    #[test]
    fn exact_palette_color_has_no_error_to_spread() {
        let palette = gray_palette();
        let pixels = vec![rgba(85, 85, 85, 255); 64];
        let indices = remap_frame(&pixels, 8, 8, &palette, 0, DitherMode::FloydSteinberg);
        assert!(indices.iter().all(|&i| i == 1));
    }

    #[test]
    fn transparent_pixels_take_sentinel_and_block_diffusion() {
        let palette = Palette::from_colors(
            vec![rgb::RGB { r: 85, g: 85, b: 85 }, rgb::RGB { r: 170, g: 170, b: 170 }],
            true,
        );
        let mut pixels = vec![rgba(128, 128, 128, 255); 16];
        pixels[1] = rgba(0, 0, 0, 0);
        let indices = remap_frame(&pixels, 4, 4, &palette, 1, DitherMode::FloydSteinberg);
        assert_eq!(indices[1], 0);
        for (i, &idx) in indices.iter().enumerate() {
            if i != 1 {
                assert_ne!(idx, 0, "opaque pixel {i} mapped to sentinel");
            }
        }
    }
}
