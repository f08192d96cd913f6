//! Integer to world coordinate conversion.

use las::{Transform, Vector};

/// Rounding applied to decoded positions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Precision {
    /// Keep `raw * scale + offset` as computed
    Full,
    /// Round to the given number of decimal places
    Decimals(u32),
}

impl Default for Precision {
    fn default() -> Self {
        Precision::Decimals(2)
    }
}

impl Precision {
    /// Apply this precision to an already unscaled position.
    pub fn apply(&self, position: Vector<f64>) -> Vector<f64> {
        match *self {
            Precision::Full => position,
            Precision::Decimals(places) => Vector {
                x: round_to(position.x, places),
                y: round_to(position.y, places),
                z: round_to(position.z, places),
            },
        }
    }
}

/// Maps a raw coordinate triple to world coordinates, `raw * scale + offset` per axis.
#[inline]
pub fn unscale(raw: Vector<i32>, transforms: &Vector<Transform>) -> Vector<f64> {
    Vector {
        x: transforms.x.direct(raw.x),
        y: transforms.y.direct(raw.y),
        z: transforms.z.direct(raw.z),
    }
}

/// [unscale] followed by rounding to `places` decimals.
pub fn unscale_rounded(raw: Vector<i32>, transforms: &Vector<Transform>, places: u32) -> Vector<f64> {
    Precision::Decimals(places).apply(unscale(raw, transforms))
}

/// Decimals an f64 can carry
const MAX_DECIMALS: u32 = 15;

/// Rounds half away from zero to `places` decimals.
///
/// `places` is capped at 15; values too large to scale are returned unchanged.
#[inline]
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places.min(MAX_DECIMALS) as i32);
    let scaled = value * factor;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / factor
}
