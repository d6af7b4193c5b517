/// The shared global color table for one export.
///
/// Immutable once generated; every frame references it read-only. When any
/// input pixel fell below the alpha threshold, index 0 is the transparency
/// sentinel and the usable color range starts at 1.
#[derive(Debug, Clone)]
pub struct Palette {
    entries: Vec<[u8; 3]>,
    transparent_index: Option<u8>,
}

impl Palette {
    /// Build a palette from reduced colors, reserving index 0 for the
    /// transparency sentinel when requested.
    ///
    /// A transparent-only input (no usable colors at all) still gets one
    /// opaque entry next to the sentinel so the color table is never empty.
    pub fn from_colors(mut colors: Vec<rgb::RGB<u8>>, has_transparency: bool) -> Self {
        if colors.is_empty() {
            colors.push(rgb::RGB { r: 0, g: 0, b: 0 });
        }

        let mut entries: Vec<[u8; 3]> = colors.iter().map(|c| [c.r, c.g, c.b]).collect();

        let transparent_index = if has_transparency {
            entries.insert(0, [0, 0, 0]);
            Some(0)
        } else {
            None
        };

        Self {
            entries,
            transparent_index,
        }
    }

    /// RGB palette entries, sentinel included.
    pub fn entries(&self) -> &[[u8; 3]] {
        &self.entries
    }

    pub fn transparent_index(&self) -> Option<u8> {
        self.transparent_index
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Squared Euclidean RGB distance to a palette entry.
    pub fn distance_sq(&self, r: u8, g: u8, b: u8, index: u8) -> u32 {
        let e = self.entries[index as usize];
        let dr = r as i32 - e[0] as i32;
        let dg = g as i32 - e[1] as i32;
        let db = b as i32 - e[2] as i32;
        (dr * dr + dg * dg + db * db) as u32
    }

    /// Nearest opaque palette index by Euclidean RGB distance.
    /// Ties break toward the lowest index; the sentinel is never a candidate.
    pub fn nearest(&self, r: u8, g: u8, b: u8) -> u8 {
        let start = if self.transparent_index.is_some() { 1 } else { 0 };

        let mut best_idx = start;
        let mut best_dist = u32::MAX;

        for i in start..self.entries.len() {
            let d = self.distance_sq(r, g, b, i as u8);
            if d < best_dist {
                best_dist = d;
                best_idx = i;
            }
        }

        best_idx as u8
    }

    /// Smallest power-of-two exponent covering the palette, clamped to
    /// GIF's minimum LZW root size of 2.
    pub fn min_code_size(&self) -> u8 {
        let padded = self.entries.len().next_power_of_two().max(2);
        (padded.trailing_zeros() as u8).max(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn color(r: u8, g: u8, b: u8) -> rgb::RGB<u8> {
        rgb::RGB { r, g, b }
    }

    #[test]
    fn empty_colors_get_fallback_entry() {
        let p = Palette::from_colors(Vec::new(), false);
        assert_eq!(p.len(), 1);
        let p = Palette::from_colors(Vec::new(), true);
        assert_eq!(p.len(), 2); // sentinel + fallback
        assert_eq!(p.transparent_index(), Some(0));
    }

    #[test]
    fn nearest_finds_closest() {
        let p = Palette::from_colors(
            vec![color(0, 0, 0), color(128, 128, 128), color(255, 255, 255)],
            false,
        );
        assert_eq!(p.nearest(10, 10, 10), 0);
        assert_eq!(p.nearest(120, 130, 128), 1);
        assert_eq!(p.nearest(250, 250, 250), 2);
    }

    #[test]
    fn ties_break_to_lowest_index() {
        // 100 is equidistant from 90 and 110.
        let p = Palette::from_colors(vec![color(90, 0, 0), color(110, 0, 0)], false);
        assert_eq!(p.nearest(100, 0, 0), 0);
    }

    #[test]
    fn transparency_reserves_index_zero() {
        let p = Palette::from_colors(vec![color(0, 0, 0), color(255, 0, 0)], true);
        assert_eq!(p.len(), 3);
        assert_eq!(p.transparent_index(), Some(0));
        // Sentinel is black but nearest(black) must skip it.
        assert_eq!(p.nearest(0, 0, 0), 1);
    }

    #[test]
    fn min_code_size_floor_is_two() {
        assert_eq!(Palette::from_colors(vec![color(0, 0, 0)], false).min_code_size(), 2);
        let four: Vec<rgb::RGB<u8>> = (0..4).map(|i| color(i * 60, 0, 0)).collect();
        assert_eq!(Palette::from_colors(four, false).min_code_size(), 2);
        let five: Vec<rgb::RGB<u8>> = (0..5).map(|i| color(i * 50, 0, 0)).collect();
        assert_eq!(Palette::from_colors(five, false).min_code_size(), 3);
        let all: Vec<rgb::RGB<u8>> = (0..=255).map(|i| color(i, 0, 0)).collect();
        assert_eq!(Palette::from_colors(all, false).min_code_size(), 8);
    }
}
