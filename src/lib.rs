//! Hacker News best stories with generated headline art.
//!
//! Every remote dependency is read through a local cache: the story list and
//! items through [`cache::CacheStore`], generated images through
//! [`images::ImageAssetCache`]. When a refresh fails the last good copy is
//! used, so a run degrades to stale data instead of failing.

pub mod cache;
pub mod config;
pub mod error;
pub mod feed;
pub mod generator;
pub mod http;
pub mod images;
pub mod models;
pub mod pipeline;
pub mod publish;
pub mod store;

pub use error::{Error, Result};
pub use pipeline::AggregationPipeline;
