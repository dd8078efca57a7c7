//! Clearance cookie acquisition.
//!
//! Strategies and header presets are plain data tables; the acquirer walks
//! them in order and records the outcome through the settings store.

pub mod acquirer;
pub mod headers;
pub mod state;
pub mod strategy;

pub use acquirer::{ClearanceAcquirer, ClearanceError};
pub use headers::header_preset;
pub use state::{ClearanceState, mask_relay, strip_clearance_prefix};
pub use strategy::{AcquisitionStrategy, EndpointKind, default_strategies};
