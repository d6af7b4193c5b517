/// CIE Lab color representation (D65 white point).
///
/// Approximately perceptually uniform; Euclidean distance here is the CIE76
/// ΔE — cheap and deterministic, good enough for a quality signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lab {
    pub l: f32,
    pub a: f32,
    pub b: f32,
}

impl Lab {
    pub const fn new(l: f32, a: f32, b: f32) -> Self {
        Self { l, a, b }
    }

    /// CIE76 color difference: Euclidean distance in Lab space.
    pub fn delta_e(self, other: Self) -> f32 {
        let dl = self.l - other.l;
        let da = self.a - other.a;
        let db = self.b - other.b;
        (dl * dl + da * da + db * db).sqrt()
    }
}

/// sRGB gamma → linear (single channel, 0..255 → 0.0..1.0).
fn srgb_to_linear(c: u8) -> f32 {
    let c = c as f32 / 255.0;
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Lab f(t) with the linear segment below the junction point.
fn lab_f(t: f32) -> f32 {
    const DELTA: f32 = 6.0 / 29.0;
    if t > DELTA * DELTA * DELTA {
        t.cbrt()
    } else {
        t / (3.0 * DELTA * DELTA) + 4.0 / 29.0
    }
}

/// Convert sRGB (0..255 per channel) to CIE Lab under D65.
pub fn srgb_to_lab(r: u8, g: u8, b: u8) -> Lab {
    let r = srgb_to_linear(r);
    let g = srgb_to_linear(g);
    let b = srgb_to_linear(b);

    // Linear sRGB → XYZ (sRGB/Rec.709 primaries, D65)
    let x = 0.4124564 * r + 0.3575761 * g + 0.1804375 * b;
    let y = 0.2126729 * r + 0.7151522 * g + 0.0721750 * b;
    let z = 0.0193339 * r + 0.1191920 * g + 0.9503041 * b;

    // Normalize by D65 reference white
    let fx = lab_f(x / 0.95047);
    let fy = lab_f(y / 1.0);
    let fz = lab_f(z / 1.08883);

    Lab {
        l: 116.0 * fy - 16.0,
        a: 500.0 * (fx - fy),
        b: 200.0 * (fy - fz),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn black_is_origin() {
        let lab = srgb_to_lab(0, 0, 0);
        assert!(lab.l.abs() < 0.01);
        assert!(lab.a.abs() < 0.01);
        assert!(lab.b.abs() < 0.01);
    }

    #[test]
    fn white_is_l100_neutral() {
        let lab = srgb_to_lab(255, 255, 255);
        assert!((lab.l - 100.0).abs() < 0.01, "L = {}", lab.l);
        assert!(lab.a.abs() < 0.05);
        assert!(lab.b.abs() < 0.05);
    }

    #[test]
    fn mid_gray_is_neutral() {
        let lab = srgb_to_lab(128, 128, 128);
        assert!(lab.a.abs() < 0.05);
        assert!(lab.b.abs() < 0.05);
        assert!(lab.l > 50.0 && lab.l < 58.0, "L = {}", lab.l);
    }

    #[test]
    fn delta_e_identity_and_symmetry() {
        let a = srgb_to_lab(100, 150, 200);
        let b = srgb_to_lab(10, 250, 30);
        assert!(a.delta_e(a) < 1e-6);
        assert!((a.delta_e(b) - b.delta_e(a)).abs() < 1e-6);
    }

    #[test]
    fn near_colors_closer_than_far_colors() {
        let base = srgb_to_lab(100, 100, 100);
        let near = srgb_to_lab(102, 100, 100);
        let far = srgb_to_lab(200, 40, 40);
        assert!(base.delta_e(near) < base.delta_e(far));
    }
}
