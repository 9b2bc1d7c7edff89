//! Four-parameter logistic (4PL) dose-response model.
//!
//! ```text
//! OD(x) = D + (A - D) / (1 + (x/C)^B)
//! ```
//!
//! Numerical notes:
//! - We write `1 / (1 + (x/C)^B)` as `σ(-B·ln(x/C))` with a logistic `σ`
//!   that never exponentiates a positive argument, so very steep slopes or
//!   far-off concentrations saturate to 0/1 instead of overflowing.
//! - `x = 0` uses the analytic limit: `(x/C)^B → 0` for `B > 0` and `→ ∞`
//!   for `B < 0`.
//! - The optimizer works on `θ = (A, B, ln C, D)` so `C` stays positive.

use crate::domain::CurveParameters;

/// Number of model parameters.
pub const PARAM_COUNT: usize = 4;

/// Stable logistic function `1 / (1 + e^{-z})`.
pub fn logistic(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Weight of the `A` asymptote at concentration `x`: `1 / (1 + (x/C)^B)`.
///
/// Also returns `ln(x/C)` (0 at `x <= 0`, where no gradient flows through `B`/`C`).
fn lower_weight(x: f64, b: f64, ln_c: f64) -> (f64, f64) {
    if x <= 0.0 {
        let s = if b > 0.0 {
            1.0
        } else if b < 0.0 {
            0.0
        } else {
            0.5
        };
        return (s, 0.0);
    }
    let l = x.ln() - ln_c;
    (logistic(-b * l), l)
}

/// Mix of the asymptotes with weight `s` on `A`; exact at `s = 0` and `s = 1`.
fn blend(a: f64, d: f64, s: f64) -> f64 {
    a * s + d * (1.0 - s)
}

/// Evaluate the 4PL curve at concentration `x`.
pub fn four_pl(x: f64, params: &CurveParameters) -> f64 {
    let (s, _) = lower_weight(x, params.b, params.c.ln());
    blend(params.a, params.d, s)
}

/// Evaluate the model in optimizer coordinates `θ = (A, B, ln C, D)`.
pub fn four_pl_theta(x: f64, theta: &[f64; PARAM_COUNT]) -> f64 {
    let [a, b, ln_c, d] = *theta;
    let (s, _) = lower_weight(x, b, ln_c);
    blend(a, d, s)
}

/// Fill `out` with `∂OD/∂θ` at `x` and return the model value.
///
/// With `s = 1/(1 + (x/C)^B)`:
///
/// - `∂/∂A    = s`
/// - `∂/∂B    = -(A - D) · s(1 - s) · ln(x/C)`
/// - `∂/∂lnC  =  (A - D) · s(1 - s) · B`
/// - `∂/∂D    = 1 - s`
pub fn fill_jacobian_row(x: f64, theta: &[f64; PARAM_COUNT], out: &mut [f64; PARAM_COUNT]) -> f64 {
    let [a, b, ln_c, d] = *theta;
    let (s, l) = lower_weight(x, b, ln_c);
    let q = s * (1.0 - s);
    out[0] = s;
    out[1] = -(a - d) * q * l;
    out[2] = (a - d) * q * b;
    out[3] = 1.0 - s;
    blend(a, d, s)
}

/// Convert optimizer coordinates back to curve parameters.
pub fn params_from_theta(theta: &[f64; PARAM_COUNT]) -> CurveParameters {
    CurveParameters::new(theta[0], theta[1], theta[2].exp(), theta[3])
}

pub fn theta_from_params(params: &CurveParameters) -> [f64; PARAM_COUNT] {
    [params.a, params.b, params.c.ln(), params.d]
}
