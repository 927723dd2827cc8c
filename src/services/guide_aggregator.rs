use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::errors::AppResult;
use crate::guide_providers::GuideProvider;
use crate::models::Channel;
use crate::xmltv::{Programme, Tv};

/// One provider's channels and programmes from a successful cycle
#[derive(Debug, Clone, Default)]
pub struct ProviderGuide {
    pub channels: Vec<Channel>,
    pub programmes: Vec<Programme>,
}

/// Statistics about a collection cycle
#[derive(Debug, Clone, Default)]
pub struct CollectionStatistics {
    pub providers: usize,
    /// Providers whose fetch failed this cycle, whether or not older data
    /// could stand in
    pub degraded_providers: Vec<String>,
    /// Providers that contributed nothing
    pub empty_providers: Vec<String>,
    pub channels: usize,
    pub programmes: usize,
    pub duplicate_channels_removed: usize,
    pub generation_time_ms: u64,
}

struct ProviderSlot {
    provider: Arc<dyn GuideProvider>,
    last_good: RwLock<Option<Arc<ProviderGuide>>>,
}

enum Outcome {
    Fresh(Arc<ProviderGuide>),
    Stale(Arc<ProviderGuide>),
    Missing,
}

/// Collects guide data from several providers into one XMLTV document.
///
/// A provider whose cycle fails contributes the guide from its last
/// successful cycle instead, so one broken source never blanks its channels.
pub struct GuideAggregator {
    slots: Vec<ProviderSlot>,
    generator_name: String,
}

impl GuideAggregator {
    pub fn new(providers: Vec<Arc<dyn GuideProvider>>, generator_name: impl Into<String>) -> Self {
        Self {
            slots: providers
                .into_iter()
                .map(|provider| ProviderSlot {
                    provider,
                    last_good: RwLock::new(None),
                })
                .collect(),
            generator_name: generator_name.into(),
        }
    }

    /// Run one cycle over every provider concurrently and merge the results.
    ///
    /// Channels are kept in provider order; when two providers report the same
    /// channel id the earlier provider wins. Programmes are grouped by channel
    /// and ordered by start time.
    pub async fn collect(&self) -> (Tv, CollectionStatistics) {
        let start_time = Instant::now();
        info!("Starting guide collection from {} providers", self.slots.len());

        let outcomes = join_all(self.slots.iter().map(|slot| self.collect_slot(slot))).await;

        let mut stats = CollectionStatistics {
            providers: self.slots.len(),
            ..Default::default()
        };
        let mut tv = Tv {
            generator_info_name: Some(self.generator_name.clone()),
            ..Default::default()
        };
        let mut seen_channels = HashSet::new();

        for (slot, outcome) in self.slots.iter().zip(outcomes) {
            let name = slot.provider.name();
            let guide = match outcome {
                Outcome::Fresh(guide) => guide,
                Outcome::Stale(guide) => {
                    stats.degraded_providers.push(name.clone());
                    guide
                }
                Outcome::Missing => {
                    stats.degraded_providers.push(name.clone());
                    stats.empty_providers.push(name);
                    continue;
                }
            };

            let mut kept = HashSet::new();
            for channel in &guide.channels {
                if seen_channels.insert(channel.id.clone()) {
                    kept.insert(channel.id.as_str());
                    tv.channels.push(channel.to_xmltv());
                } else {
                    debug!("Channel '{}' from '{}' already provided, skipping", channel.id, name);
                    stats.duplicate_channels_removed += 1;
                }
            }

            tv.programmes.extend(
                guide
                    .programmes
                    .iter()
                    .filter(|p| kept.contains(p.channel.as_str()))
                    .cloned(),
            );
        }

        sort_programmes(&mut tv);

        stats.channels = tv.channels.len();
        stats.programmes = tv.programmes.len();
        stats.generation_time_ms = start_time.elapsed().as_millis() as u64;

        info!(
            "Guide collection complete: {} channels, {} programmes, {} degraded providers in {}ms",
            stats.channels,
            stats.programmes,
            stats.degraded_providers.len(),
            stats.generation_time_ms
        );

        (tv, stats)
    }

    async fn collect_slot(&self, slot: &ProviderSlot) -> Outcome {
        let name = slot.provider.name();

        match fetch_guide(slot.provider.as_ref()).await {
            Ok(guide) => {
                let guide = Arc::new(guide);
                *slot.last_good.write().await = Some(Arc::clone(&guide));
                debug!(
                    "Provider '{}' returned {} channels and {} programmes",
                    name,
                    guide.channels.len(),
                    guide.programmes.len()
                );
                Outcome::Fresh(guide)
            }
            Err(e) => match slot.last_good.read().await.clone() {
                Some(guide) => {
                    warn!("Provider '{}' failed, using last known good guide: {}", name, e);
                    Outcome::Stale(guide)
                }
                None => {
                    warn!("Provider '{}' failed with no earlier guide to fall back on: {}", name, e);
                    Outcome::Missing
                }
            },
        }
    }
}

/// A failed refresh fails the cycle for that provider; its cached reads
/// would only repeat stale data, or fetch the source a second time when it
/// has none yet.
async fn fetch_guide(provider: &dyn GuideProvider) -> AppResult<ProviderGuide> {
    provider.refresh().await?;

    let channels = provider.channels().await?;
    let ids: HashSet<String> = channels.iter().map(|c| c.id.clone()).collect();
    let programmes = provider.schedule(&ids).await?;

    Ok(ProviderGuide {
        channels,
        programmes,
    })
}

/// Group programmes by channel in channel order, then by start time.
/// Programmes whose start time does not parse keep their relative order at
/// the end of their channel.
fn sort_programmes(tv: &mut Tv) {
    let positions: HashMap<&str, usize> = tv
        .channels
        .iter()
        .enumerate()
        .map(|(i, c)| (c.id.as_str(), i))
        .collect();

    let mut keyed: Vec<_> = std::mem::take(&mut tv.programmes)
        .into_iter()
        .map(|p| {
            let position = positions.get(p.channel.as_str()).copied().unwrap_or(usize::MAX);
            let start = p.start_time();
            (position, start.is_none(), start, p)
        })
        .collect();
    keyed.sort_by(|a, b| (a.0, a.1, a.2).cmp(&(b.0, b.1, b.2)));

    tv.programmes = keyed.into_iter().map(|(_, _, _, p)| p).collect();
}
