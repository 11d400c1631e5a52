use crate::random::{RandomError, RandomSource};
use serde::{Deserialize, Serialize};

/// Output of one randomized-response draw.
///
/// `p` is the probability the released bit is 1 given the true value is
/// "true" (sampling-adjusted); `q = 1 - p` holds by construction. `variance`
/// is the Bernoulli variance of the released bit under the branch that was
/// actually sampled, shipped so server-side aggregation can build unbiased
/// estimators and confidence intervals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RandomizedResponse {
    pub bit: u8,
    pub p: f64,
    pub q: f64,
    pub variance: f64,
}

/// Probability of reporting "true" truthfully: `e^eps / (1 + e^eps)`.
///
/// Monotone increasing in epsilon; 0.5 at epsilon 0, approaching 1 as
/// epsilon grows. This calibration gives the single-report epsilon-LDP
/// guarantee.
pub fn prob_true(epsilon: f64) -> f64 {
    let e = epsilon.exp();
    e / (1.0 + e)
}

/// Sampling-adjusted `(p, q)` under a client-side drop rate of `1 - s`.
///
/// An analyst who only sees sent reports must not sharpen their inference
/// past the stated epsilon, so both branch probabilities blend toward the
/// uninformative 0.5 in proportion to the drop rate. `p + q = 1` always;
/// `s = 1` is unadjusted RR, `s = 0` collapses to (0.5, 0.5).
pub fn adjusted_probability(epsilon: f64, sampling_rate: f64) -> (f64, f64) {
    let p = prob_true(epsilon);
    let q = 1.0 - p;
    let s = sampling_rate.clamp(0.0, 1.0);
    let blend = (1.0 - s) * 0.5;
    (s * p + blend, s * q + blend)
}

/// Draws one bit that is 1 with the given probability.
///
/// Degenerate probabilities short-circuit without consuming randomness.
pub fn flip(rng: &mut dyn RandomSource, probability: f64) -> Result<bool, RandomError> {
    if probability <= 0.0 {
        return Ok(false);
    }
    if probability >= 1.0 {
        return Ok(true);
    }
    Ok(rng.next_float()? < probability)
}

/// Randomized response over a boolean under `(epsilon, sampling_rate)`.
pub fn rr_bit(
    rng: &mut dyn RandomSource,
    true_value: bool,
    epsilon: f64,
    sampling_rate: f64,
) -> Result<RandomizedResponse, RandomError> {
    let (p, q) = adjusted_probability(epsilon, sampling_rate);
    let branch = if true_value { p } else { q };
    let bit = u8::from(flip(rng, branch)?);
    Ok(RandomizedResponse {
        bit,
        p,
        q,
        variance: branch * (1.0 - branch),
    })
}
