use crate::histogram::ColorSample;

/// A box of histogram samples for median cut subdivision.
#[derive(Debug, Clone)]
struct ColorBox {
    entries: Vec<ColorSample>,
}

impl ColorBox {
    fn new(entries: Vec<ColorSample>) -> Self {
        Self { entries }
    }

    fn total_weight(&self) -> u64 {
        self.entries.iter().map(|e| e.count).sum()
    }

    /// Range (max - min) along each RGB axis.
    fn ranges(&self) -> (u8, u8, u8) {
        let mut r_min = u8::MAX;
        let mut r_max = u8::MIN;
        let mut g_min = u8::MAX;
        let mut g_max = u8::MIN;
        let mut b_min = u8::MAX;
        let mut b_max = u8::MIN;

        for e in &self.entries {
            r_min = r_min.min(e.r);
            r_max = r_max.max(e.r);
            g_min = g_min.min(e.g);
            g_max = g_max.max(e.g);
            b_min = b_min.min(e.b);
            b_max = b_max.max(e.b);
        }

        (r_max - r_min, g_max - g_min, b_max - b_min)
    }

    /// Split priority: heavier boxes with more color spread split first.
    /// Integer arithmetic keeps the ordering total and reproducible.
    fn priority(&self) -> u64 {
        let (rr, rg, rb) = self.ranges();
        let spread = rr.max(rg).max(rb) as u64;
        self.total_weight() * spread
    }

    /// Weighted centroid of all samples, rounded to the nearest RGB triple.
    fn centroid(&self) -> rgb::RGB<u8> {
        let mut r_sum = 0u64;
        let mut g_sum = 0u64;
        let mut b_sum = 0u64;
        let mut w_sum = 0u64;

        for e in &self.entries {
            r_sum += e.r as u64 * e.count;
            g_sum += e.g as u64 * e.count;
            b_sum += e.b as u64 * e.count;
            w_sum += e.count;
        }

        if w_sum == 0 {
            return rgb::RGB { r: 0, g: 0, b: 0 };
        }

        rgb::RGB {
            r: ((r_sum + w_sum / 2) / w_sum) as u8,
            g: ((g_sum + w_sum / 2) / w_sum) as u8,
            b: ((b_sum + w_sum / 2) / w_sum) as u8,
        }
    }

    /// Split along the axis with the largest range at the weighted median.
    fn split(mut self) -> (ColorBox, ColorBox) {
        let (rr, rg, rb) = self.ranges();

        // Axis preference on ties: R, then G, then B.
        let axis = if rr >= rg && rr >= rb {
            0
        } else if rg >= rb {
            1
        } else {
            2
        };

        // Sort by the chosen axis; secondary key is the full color so equal
        // axis values still order identically run-to-run.
        self.entries.sort_unstable_by_key(|e| {
            let primary = match axis {
                0 => e.r,
                1 => e.g,
                _ => e.b,
            };
            (primary, e.r, e.g, e.b)
        });

        // Weighted median split point, at least one entry per side.
        let half_weight = self.total_weight() / 2;
        let mut accumulated = 0u64;
        let mut split_idx = 1;

        for (i, e) in self.entries.iter().enumerate() {
            accumulated += e.count;
            if accumulated >= half_weight && i + 1 < self.entries.len() {
                split_idx = i + 1;
                break;
            }
        }

        split_idx = split_idx.clamp(1, self.entries.len() - 1);

        let right = self.entries.split_off(split_idx);
        (ColorBox::new(self.entries), ColorBox::new(right))
    }
}

/// Weighted median cut over exact-match histogram samples.
///
/// Produces up to `max_colors` representative RGB colors. Tie-breaking is
/// fully ordered (axis preference, secondary sort keys, first-maximum box
/// selection), so identical input always yields an identical palette.
pub fn median_cut(samples: Vec<ColorSample>, max_colors: usize) -> Vec<rgb::RGB<u8>> {
    if samples.is_empty() || max_colors == 0 {
        return Vec::new();
    }

    if samples.len() <= max_colors {
        return samples.into_iter().map(|s| s.rgb()).collect();
    }

    let mut boxes = Vec::with_capacity(max_colors);
    boxes.push(ColorBox::new(samples));

    while boxes.len() < max_colors {
        // First box with the highest priority; strict comparison keeps the
        // choice stable when priorities tie.
        let mut best: Option<(usize, u64)> = None;
        for (i, b) in boxes.iter().enumerate() {
            if b.entries.len() < 2 {
                continue;
            }
            let p = b.priority();
            if best.map_or(true, |(_, bp)| p > bp) {
                best = Some((i, p));
            }
        }

        let Some((idx, _)) = best else {
            break; // no more splittable boxes
        };

        let to_split = boxes.swap_remove(idx);
        let (left, right) = to_split.split();
        boxes.push(left);
        boxes.push(right);
    }

    boxes.iter().map(|b| b.centroid()).collect()
}
