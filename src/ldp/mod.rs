//! Local differential privacy primitives: the randomized-response channel
//! and the per-day privacy-budget accountant built on top of it.

pub mod budget;
pub mod rr;
