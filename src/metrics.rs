use crate::lab::srgb_to_lab;
use crate::palette::Palette;
use crate::{Frame, QuantizedFrame};

/// Per-export quality summary.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityReport {
    /// Mean CIE76 ΔE across all opaque pixels of all frames.
    pub mean_delta_e: f32,
    /// 95th-percentile ΔE.
    pub p95_delta_e: f32,
    /// Final palette length, sentinel included.
    pub palette_size: usize,
    /// Fraction of the palette's dominant mass shared across frames.
    /// Fixed at 1.0: a single global palette is shared by construction.
    pub stability_score: f32,
}

/// Measure perceptual quantization error for every opaque pixel.
///
/// Pixels below the alpha threshold map to the sentinel and carry no color
/// information, so they are excluded from the aggregate.
pub fn measure(
    frames: &[Frame],
    quantized: &[QuantizedFrame],
    palette: &Palette,
    alpha_threshold: u8,
) -> QualityReport {
    let mut deltas: Vec<f32> = Vec::new();

    for (frame, q) in frames.iter().zip(quantized.iter()) {
        for (p, &idx) in frame.pixels.iter().zip(q.indices.iter()) {
            if p.a < alpha_threshold {
                continue;
            }
            let original = srgb_to_lab(p.r, p.g, p.b);
            let e = palette.entries()[idx as usize];
            let assigned = srgb_to_lab(e[0], e[1], e[2]);
            deltas.push(original.delta_e(assigned));
        }
    }

    let (mean, p95) = if deltas.is_empty() {
        (0.0, 0.0)
    } else {
        let mean = deltas.iter().sum::<f32>() / deltas.len() as f32;
        deltas.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let idx = ((deltas.len() as f64 * 0.95).ceil() as usize).saturating_sub(1);
        (mean, deltas[idx.min(deltas.len() - 1)])
    };

    QualityReport {
        mean_delta_e: mean,
        p95_delta_e: p95,
        palette_size: palette.len(),
        stability_score: 1.0,
    }
}
