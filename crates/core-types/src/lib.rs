//! # Stride Core Types
//!
//! This crate defines the domain model for motion-capture trials: marker
//! trajectories, analog channels, force platforms, timing events and the
//! `Trial` container that ties them together.
//!
//! As a Layer 0 crate it has no knowledge of file formats or external
//! toolkits. The `c3d` crate produces these types, the `opensim-io` and
//! `analytics` crates consume them.

pub mod enums;
pub mod error;
pub mod events;
pub mod force_platform;
pub mod time_series;
pub mod trial;

// Re-export the core types to provide a clean public API.
pub use enums::{ImportMethod, OpenSimOutput, ParamValue};
pub use error::CoreError;
pub use events::{Event, EventTiming, Side};
pub use force_platform::ForcePlatform;
pub use time_series::{AnalogChannel, Analogs, MarkerTrajectory, Points, TimeSeriesInfo};
pub use trial::{GapRegion, Trial, TrialParts};
