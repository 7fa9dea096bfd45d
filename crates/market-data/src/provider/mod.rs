//! Rate source abstractions and implementations.
//!
//! This module contains:
//! - The `RateSource` trait that all sources implement
//! - Shared HTTP plumbing for the API sources
//! - Concrete sources, in default priority order: the SBV portal, the
//!   Vietcombank XML feed, the Vietcombank JSON API and exchangerate-api.com
//!
//! Sources know nothing about each other or about fallback; ordering and
//! validation happen in the registry.

mod http;
mod traits;

pub mod exchangerate_api;
pub mod sbv_portal;
pub mod vietcombank_json;
pub mod vietcombank_xml;

// Re-exports
pub use exchangerate_api::ExchangeRateApiSource;
pub use sbv_portal::SbvPortalSource;
pub use traits::RateSource;
pub use vietcombank_json::VietcombankJsonSource;
pub use vietcombank_xml::VietcombankXmlSource;
