//! Guide providers
//!
//! Every EPG backend implements [`GuideProvider`]; the rest of the system
//! programs against that trait only. A [`Configuration`] picks and builds the
//! backend through [`Configuration::get_provider`].
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::collections::HashSet;
//! use guide_providers::models::Configuration;
//!
//! async fn example() -> guide_providers::errors::AppResult<()> {
//!     let config = Configuration {
//!         xmltv_url: "http://example.com/guide.xml".to_string(),
//!         ..Default::default()
//!     };
//!
//!     let provider = config.get_provider()?;
//!     provider.refresh().await?;
//!
//!     let channels = provider.channels().await?;
//!     let ids: HashSet<String> = channels.iter().map(|c| c.id.clone()).collect();
//!     let programmes = provider.schedule(&ids).await?;
//!
//!     let xmltv_channels: Vec<_> = channels.iter().map(|c| c.to_xmltv()).collect();
//!     println!("{} channels, {} programmes", xmltv_channels.len(), programmes.len());
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use std::collections::HashSet;

use crate::errors::AppResult;
use crate::models::{Channel, Configuration};
use crate::xmltv::Programme;

pub mod cache;
pub mod factory;
pub mod schedules_direct;
pub mod xmltv;

pub use cache::{GuideCache, ProviderState};
pub use factory::ProviderKind;
pub use schedules_direct::SchedulesDirectProvider;
pub use xmltv::XmltvProvider;

/// Capability contract every guide backend satisfies.
///
/// Backends own their HTTP clients, tokens and caches. All shipped backends
/// keep their data behind an `RwLock` snapshot, so `refresh` may run while
/// other tasks read `channels`/`schedule`; readers see either the old or the
/// new snapshot, never a mix.
#[async_trait]
pub trait GuideProvider: Send + Sync {
    /// Stable human-readable identifier of the backend or account. No I/O.
    fn name(&self) -> String;

    /// The full current channel lineup(s).
    ///
    /// An error means no channel data is available this cycle; it is never
    /// fatal to the caller.
    async fn channels(&self) -> AppResult<Vec<Channel>>;

    /// Programmes for the given channel IDs, in the provider's ID space.
    ///
    /// IDs not present in the lineup are skipped, not reported.
    async fn schedule(&self, channel_ids: &HashSet<String>) -> AppResult<Vec<Programme>>;

    /// Re-fetch source data so the next read reflects it. On failure the
    /// previous data stays available.
    async fn refresh(&self) -> AppResult<()>;

    /// The configuration this backend was built from.
    fn configuration(&self) -> Configuration;
}
