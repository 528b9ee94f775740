//! Heat-map colouring of index arrays.
use ndarray::Array2;

/// Viridis sampled at 9 evenly spaced stops.
const VIRIDIS: [(f64, [u8; 3]); 9] = [
    (0.000, [68, 1, 84]),
    (0.125, [71, 44, 122]),
    (0.250, [59, 81, 139]),
    (0.375, [44, 113, 142]),
    (0.500, [33, 144, 141]),
    (0.625, [39, 173, 129]),
    (0.750, [92, 200, 99]),
    (0.875, [170, 220, 50]),
    (1.000, [253, 231, 37]),
];

/// Colour for missing pixels.
pub const MISSING_RGB: [u8; 3] = [255, 255, 255];

/// Colour at position `t` in `[0, 1]` (clamped).
pub fn viridis(t: f64) -> [u8; 3] {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
    for pair in VIRIDIS.windows(2) {
        let (t0, c0) = pair[0];
        let (t1, c1) = pair[1];
        if t <= t1 {
            let f = (t - t0) / (t1 - t0);
            let mut out = [0u8; 3];
            for i in 0..3 {
                out[i] = (c0[i] as f64 + f * (c1[i] as f64 - c0[i] as f64)).round() as u8;
            }
            return out;
        }
    }
    VIRIDIS[VIRIDIS.len() - 1].1
}

/// Interleaved RGB bytes for `values`, stretched over their own min..max.
pub fn render_rgb(values: &Array2<Option<f64>>) -> Vec<u8> {
    let (lo, hi) = values
        .iter()
        .flatten()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let span = hi - lo;

    let mut rgb = Vec::with_capacity(values.len() * 3);
    for v in values.iter() {
        let px = match v {
            Some(v) if v.is_finite() => {
                let t = if span > 0.0 { (v - lo) / span } else { 0.5 };
                viridis(t)
            }
            _ => MISSING_RGB,
        };
        rgb.extend_from_slice(&px);
    }
    rgb
}
