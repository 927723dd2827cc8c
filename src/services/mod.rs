//! Services built on top of the guide providers

pub mod guide_aggregator;

pub use guide_aggregator::{CollectionStatistics, GuideAggregator, ProviderGuide};
