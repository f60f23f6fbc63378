//! # Gait Analytics Engine
//!
//! This crate derives spatiotemporal gait metrics (stride time, stride
//! length, velocity, cadence, step and stance timing) from a trial's timing
//! events and foot marker trajectories.
//!
//! ## Architectural Principles
//!
//! - **Pure Logic:** This crate has no knowledge of file formats or external
//!   systems. It depends only on `core-types`.
//! - **Stateless Calculation:** The `AnalyticsEngine` is a stateless
//!   calculator. It takes a `Trial` as input and produces a
//!   `SpatiotemporalReport` as output, which makes it easy to test.
//!
//! ## Public API
//!
//! - `AnalyticsEngine`: The main struct containing the calculation logic.
//! - `GaitOptions`: The event labels and markers the calculations key on.
//! - `SpatiotemporalReport`: Per-side metrics with per-cycle values.
//! - `AnalyticsError`: The specific error types returned from this crate.

// Declare the modules that constitute this crate.
pub mod engine;
pub mod error;
pub mod report;

// Re-export the key components to create a clean, public-facing API.
pub use engine::{AnalyticsEngine, GaitOptions};
pub use error::AnalyticsError;
pub use report::{SideMetrics, SpatiotemporalReport};
