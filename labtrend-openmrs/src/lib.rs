//! OpenMRS laboratory client and the caching aggregation engine built on it.

mod cache;
mod client;
mod concepts;
mod config;
mod engine;
mod error;
mod pages;
mod source;
pub mod wire;

pub use cache::{CacheRecord, FreshnessCache};
pub use client::OpenMrsClient;
pub use concepts::ConceptResolver;
pub use config::ClientConfig;
pub use engine::LabEngine;
pub use error::FetchError;
pub use pages::fetch_all_pages;
pub use source::{LabSource, ObservationPage};
