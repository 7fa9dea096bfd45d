//! Source registry module.
//!
//! This module provides orchestration of the rate sources, including:
//! - Priority ordering and sequential fallback
//! - Rate validation against a plausible range
//! - Debug reporting of each attempt

mod registry;
mod reporter;
mod validator;

pub use registry::SourceRegistry;
pub use reporter::{DebugReporter, FnReporter, LogReporter, NoopReporter};
pub use validator::{PlausibleRange, RateValidator};
