use std::collections::BTreeMap;

/// One histogram bucket: an exact RGB color and its accumulated pixel count.
///
/// Bucketing is exact-match — no lossy pre-rounding — so an input whose
/// distinct color count fits the palette budget quantizes losslessly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorSample {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub count: u64,
}

impl ColorSample {
    pub fn rgb(&self) -> rgb::RGB<u8> {
        rgb::RGB {
            r: self.r,
            g: self.g,
            b: self.b,
        }
    }
}

/// Weighted color histogram accumulated across every frame of one job.
///
/// Pixels with alpha below the configured threshold are counted toward a
/// reserved transparent bucket and excluded from color statistics. The
/// backing map is ordered by packed RGB key, so iteration order (and
/// everything downstream of it) is deterministic for identical input.
#[derive(Debug, Default)]
pub struct ColorHistogram {
    buckets: BTreeMap<u32, u64>,
    transparent_count: u64,
}

fn pack(r: u8, g: u8, b: u8) -> u32 {
    (r as u32) << 16 | (g as u32) << 8 | b as u32
}

fn unpack(key: u32) -> (u8, u8, u8) {
    ((key >> 16) as u8, (key >> 8) as u8, key as u8)
}

impl ColorHistogram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate one frame's pixels. `alpha_threshold` classifies pixels:
    /// alpha strictly below it goes to the transparent bucket.
    pub fn add_frame(&mut self, pixels: &[rgb::RGBA<u8>], alpha_threshold: u8) {
        for p in pixels {
            if p.a < alpha_threshold {
                self.transparent_count += 1;
            } else {
                *self.buckets.entry(pack(p.r, p.g, p.b)).or_insert(0) += 1;
            }
        }
    }

    /// Number of distinct opaque colors seen so far.
    pub fn distinct_colors(&self) -> usize {
        self.buckets.len()
    }

    /// Whether any pixel fell below the alpha threshold.
    pub fn has_transparency(&self) -> bool {
        self.transparent_count > 0
    }

    pub fn transparent_count(&self) -> u64 {
        self.transparent_count
    }

    /// Total opaque pixel count across all accumulated frames.
    pub fn opaque_count(&self) -> u64 {
        self.buckets.values().sum()
    }

    /// Drain the buckets into (color, count) samples in key order.
    pub fn samples(&self) -> Vec<ColorSample> {
        self.buckets
            .iter()
            .map(|(&key, &count)| {
                let (r, g, b) = unpack(key);
                ColorSample { r, g, b, count }
            })
            .collect()
    }

    /// Exact palette when the distinct opaque color count already fits
    /// `max_colors`; `None` once more colors exist. Lets the quantizer skip
    /// reduction entirely for lossless inputs.
    pub fn exact_palette(&self, max_colors: usize) -> Option<Vec<rgb::RGB<u8>>> {
        if self.buckets.len() > max_colors {
            return None;
        }
        Some(
            self.buckets
                .keys()
                .map(|&key| {
                    let (r, g, b) = unpack(key);
                    rgb::RGB { r, g, b }
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgba(r: u8, g: u8, b: u8, a: u8) -> rgb::RGBA<u8> {
        rgb::RGBA { r, g, b, a }
    }

    #[test]
    fn single_color_one_bucket() {
        let mut hist = ColorHistogram::new();
        hist.add_frame(&vec![rgba(128, 128, 128, 255); 100], 1);
        assert_eq!(hist.distinct_colors(), 1);
        assert_eq!(hist.samples()[0].count, 100);
    }

    #[test]
    fn counts_accumulate_across_frames() {
        let mut hist = ColorHistogram::new();
        hist.add_frame(&vec![rgba(10, 20, 30, 255); 4], 1);
        hist.add_frame(&vec![rgba(10, 20, 30, 255); 6], 1);
        assert_eq!(hist.distinct_colors(), 1);
        assert_eq!(hist.samples()[0].count, 10);
    }

    #[test]
    fn distinct_colors_separate_buckets() {
        let mut hist = ColorHistogram::new();
        hist.add_frame(&[rgba(0, 0, 0, 255), rgba(255, 255, 255, 255)], 1);
        assert_eq!(hist.distinct_colors(), 2);
    }

    #[test]
    fn below_threshold_is_transparent() {
        let mut hist = ColorHistogram::new();
        hist.add_frame(&[rgba(128, 128, 128, 255), rgba(0, 0, 0, 0)], 1);
        assert!(hist.has_transparency());
        assert_eq!(hist.transparent_count(), 1);
        assert_eq!(hist.distinct_colors(), 1);
    }

    #[test]
    fn threshold_zero_disables_transparency() {
        let mut hist = ColorHistogram::new();
        hist.add_frame(&[rgba(0, 0, 0, 0)], 0);
        assert!(!hist.has_transparency());
        assert_eq!(hist.distinct_colors(), 1);
    }

    #[test]
    fn exact_palette_within_budget() {
        let mut hist = ColorHistogram::new();
        hist.add_frame(&[rgba(1, 2, 3, 255), rgba(4, 5, 6, 255)], 1);
        let pal = hist.exact_palette(4).unwrap();
        assert_eq!(pal.len(), 2);
        assert!(hist.exact_palette(1).is_none());
    }

    #[test]
    fn samples_are_key_ordered() {
        let mut hist = ColorHistogram::new();
        hist.add_frame(
            &[rgba(200, 0, 0, 255), rgba(0, 0, 200, 255), rgba(0, 200, 0, 255)],
            1,
        );
        let samples = hist.samples();
        let keys: Vec<(u8, u8, u8)> = samples.iter().map(|s| (s.r, s.g, s.b)).collect();
        assert_eq!(keys, vec![(0, 0, 200), (0, 200, 0), (200, 0, 0)]);
    }
}
