//! Core types and trait definitions for the Tally learner-state engine.
//!
//! This crate is deliberately free of HTTP and database dependencies. It
//! defines the immutable records (attempts, progress, score entries,
//! competency awards), the evaluation payloads that drive them, and the
//! traits that storage backends and courseware readers implement.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod attempt;
pub mod competency;
pub mod courseware;
pub mod error;
pub mod evaluation;
pub mod event;
pub mod progress;
pub mod score;
pub mod store;

pub use error::{Error, Result};

/// Clamp a value into the closed unit interval. `NaN` becomes `0.0`.
pub fn clamp_unit(value: f64) -> f64 {
  if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}
