//! Click analytics: enrichment, asynchronous tracking and aggregation.

pub mod aggregate;
pub mod enricher;
pub mod geoip;
pub mod pipeline;

pub use aggregate::{AggregationEngine, DailyCount, LinkStats};
pub use enricher::{DeviceGeoEnricher, DeviceInfo, EdgeGeoHeaders, Enrichment};
pub use geoip::{ExternalApiProvider, GeoInfo, GeoLookup};
pub use pipeline::{ClickPayload, ClickPipeline, ClickTracker, RetryPolicy, TrackOutcome};
