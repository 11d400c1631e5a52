use std::cell::RefCell;
use std::rc::Rc;
use thiserror::Error;

/// Error raised when the host's secure randomness source is unavailable.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("secure randomness unavailable: {message}")]
pub struct RandomError {
    message: String,
}

impl RandomError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Capability trait over the host's cryptographically strong RNG.
///
/// Every draw the SDK performs (randomized-response flips, sampling gates,
/// envelope nonces, flush jitter) goes through this seam so tests can script
/// outcomes deterministically.
pub trait RandomSource {
    /// Fills `buf` with uniformly distributed random bytes.
    fn fill_bytes(&mut self, buf: &mut [u8]) -> Result<(), RandomError>;

    /// Returns a uniform float in `[0, 1)` derived from four random bytes.
    fn next_float(&mut self) -> Result<f64, RandomError> {
        let mut buf = [0u8; 4];
        self.fill_bytes(&mut buf)?;
        Ok(u32::from_le_bytes(buf) as f64 / 4_294_967_296.0)
    }
}

impl RandomSource for Box<dyn RandomSource> {
    fn fill_bytes(&mut self, buf: &mut [u8]) -> Result<(), RandomError> {
        (**self).fill_bytes(buf)
    }

    fn next_float(&mut self) -> Result<f64, RandomError> {
        (**self).next_float()
    }
}

/// Default source backed by the operating system CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill_bytes(&mut self, buf: &mut [u8]) -> Result<(), RandomError> {
        getrandom::fill(buf).map_err(|err| RandomError::new(err.to_string()))
    }
}

/// Clonable handle sharing one underlying source between components, so a
/// single injected source feeds every draw the SDK performs.
#[derive(Clone)]
pub struct SharedRandom {
    inner: Rc<RefCell<dyn RandomSource>>,
}

impl SharedRandom {
    pub fn new(source: impl RandomSource + 'static) -> Self {
        Self {
            inner: Rc::new(RefCell::new(source)),
        }
    }
}

impl RandomSource for SharedRandom {
    fn fill_bytes(&mut self, buf: &mut [u8]) -> Result<(), RandomError> {
        self.inner.borrow_mut().fill_bytes(buf)
    }

    fn next_float(&mut self) -> Result<f64, RandomError> {
        self.inner.borrow_mut().next_float()
    }
}

/// Produces a fresh lowercase-hex token of `bytes` random bytes.
pub fn nonce_hex(rng: &mut dyn RandomSource, bytes: usize) -> Result<String, RandomError> {
    let mut buf = vec![0u8; bytes];
    rng.fill_bytes(&mut buf)?;
    let mut out = String::with_capacity(bytes * 2);
    for byte in buf {
        out.push_str(&format!("{byte:02x}"));
    }
    Ok(out)
}

/// Bernoulli gate used for client-side sampling decisions.
///
/// Degenerate probabilities short-circuit without consuming randomness.
pub fn sample_gate(rng: &mut dyn RandomSource, probability: f64) -> Result<bool, RandomError> {
    if probability >= 1.0 {
        return Ok(true);
    }
    if probability <= 0.0 {
        return Ok(false);
    }
    Ok(rng.next_float()? < probability)
}
