//! Snaplink - URL shortener core
//!
//! This library implements the redirect-resolution path and the
//! click-analytics pipeline of a URL-shortening service.
//!
//! # Architecture
//! - `cache`: bounded, sliding-TTL resolution cache (cache-aside)
//! - `storages`: link store trait, data models and the in-memory backend
//! - `services`: code generation, resolution, link lifecycle, HTTP surface
//! - `analytics`: click enrichment, asynchronous tracking, aggregation
//! - `config`: configuration management
//! - `utils`: code drawing and client-IP helpers

pub mod analytics;
pub mod cache;
pub mod config;
pub mod errors;
pub mod services;
pub mod storages;
pub mod utils;
