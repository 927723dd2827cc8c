//! Schedules Direct guide provider
//!
//! Credentialed JSON API backend. Logs in with a SHA-1 digest of the
//! account password, caches the session token, and keeps the channels of
//! every configured lineup as its snapshot. Schedules and programme metadata
//! are fetched per `schedule` call for the requested stations only.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{GuideCache, GuideProvider, ProviderState};
use crate::errors::{AppError, AppResult, SourceError};
use crate::models::{Channel, Configuration, Logo};
use crate::utils::url::UrlUtils;
use crate::utils::{DecompressingHttpClient, StandardHttpClient};
use crate::xmltv::{self, CommonElement, EpisodeNum, Programme};

pub const DEFAULT_BASE_URL: &str = "https://json.schedulesdirect.org/20141201/";

/// API limit on stations per `schedules` request
const MAX_STATIONS_PER_REQUEST: usize = 5000;
/// API limit on programme IDs per `programs` request
const MAX_PROGRAMS_PER_REQUEST: usize = 5000;

const SOURCE_TYPE: &str = "schedules_direct";

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    username: &'a str,
    password: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LineupResponse {
    #[serde(default)]
    map: Vec<StationMapping>,
    #[serde(default)]
    stations: Vec<Station>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StationMapping {
    #[serde(rename = "stationID")]
    station_id: String,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    atsc_major: Option<u32>,
    #[serde(default)]
    atsc_minor: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Station {
    #[serde(rename = "stationID")]
    station_id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    callsign: String,
    #[serde(default)]
    logo: Option<Logo>,
    #[serde(default)]
    station_logo: Vec<Logo>,
}

#[derive(Debug, Serialize)]
struct ScheduleRequest<'a> {
    #[serde(rename = "stationID")]
    station_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct StationSchedule {
    #[serde(rename = "stationID", default)]
    station_id: String,
    #[serde(default)]
    programs: Vec<Airing>,
    #[serde(default)]
    code: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Airing {
    #[serde(rename = "programID")]
    program_id: String,
    air_date_time: String,
    #[serde(default)]
    duration: i64,
    #[serde(default)]
    new: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProgramInfo {
    #[serde(rename = "programID")]
    program_id: String,
    #[serde(default)]
    titles: Vec<ProgramTitle>,
    #[serde(default)]
    episode_title150: Option<String>,
    #[serde(default)]
    descriptions: ProgramDescriptions,
    #[serde(default)]
    genres: Vec<String>,
    #[serde(default)]
    original_air_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProgramTitle {
    #[serde(default)]
    title120: String,
}

#[derive(Debug, Default, Deserialize)]
struct ProgramDescriptions {
    #[serde(default)]
    description1000: Vec<ProgramDescription>,
    #[serde(default)]
    description100: Vec<ProgramDescription>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProgramDescription {
    #[serde(default)]
    description_language: Option<String>,
    #[serde(default)]
    description: String,
}

/// Channels of all configured lineups plus the reverse station lookup
#[derive(Debug, Default)]
struct LineupSnapshot {
    channels: Vec<Channel>,
    /// channel id -> Schedules Direct station id
    stations: HashMap<String, String>,
}

impl LineupSnapshot {
    /// Merge one lineup; stations already seen in an earlier lineup are kept
    /// as they were. Returns the number of channels added.
    fn add_lineup(&mut self, lineup: &str, response: LineupResponse) -> usize {
        let stations: HashMap<&str, &Station> = response
            .stations
            .iter()
            .map(|s| (s.station_id.as_str(), s))
            .collect();

        let mut added = 0;
        for mapping in &response.map {
            let id = channel_id(&mapping.station_id);
            if self.stations.contains_key(&id) {
                continue;
            }

            let station = stations.get(mapping.station_id.as_str()).copied();
            let call_sign = station.map(|s| s.callsign.clone()).unwrap_or_default();
            let name = station
                .map(|s| s.name.clone())
                .filter(|n| !n.is_empty())
                .or_else(|| Some(call_sign.clone()).filter(|c| !c.is_empty()))
                .unwrap_or_else(|| mapping.station_id.clone());

            let number = match (&mapping.channel, mapping.atsc_major, mapping.atsc_minor) {
                (Some(channel), _, _) if !channel.is_empty() => channel.clone(),
                (_, Some(major), Some(minor)) => format!("{major}.{minor}"),
                _ => String::new(),
            };

            let logos = match station {
                Some(s) if !s.station_logo.is_empty() => s.station_logo.clone(),
                Some(s) => s.logo.iter().cloned().collect(),
                None => Vec::new(),
            };

            self.stations
                .insert(id.clone(), mapping.station_id.clone());
            self.channels.push(Channel {
                id,
                name,
                logos,
                number,
                call_sign,
                urls: Vec::new(),
                lineup: lineup.to_string(),
            });
            added += 1;
        }
        added
    }
}

/// Schedules Direct guide provider
pub struct SchedulesDirectProvider {
    config: Configuration,
    lineups: Vec<String>,
    base_url: String,
    http_client: StandardHttpClient,
    token: Mutex<Option<String>>,
    cache: GuideCache<LineupSnapshot>,
}

impl SchedulesDirectProvider {
    /// Create a provider with a default HTTP client
    pub fn new(config: &Configuration) -> AppResult<Self> {
        Self::with_client(config, StandardHttpClient::new()?)
    }

    /// Create a provider using the given HTTP client.
    ///
    /// Validates the credentials and lineups are present; performs no I/O, so
    /// wrong credentials only surface on the first refresh.
    pub fn with_client(config: &Configuration, http_client: StandardHttpClient) -> AppResult<Self> {
        if config.username.trim().is_empty() {
            return Err(AppError::configuration(format!(
                "Schedules Direct provider '{}' requires a username",
                config.label()
            )));
        }
        if config.password.is_empty() {
            return Err(AppError::configuration(format!(
                "Schedules Direct provider '{}' requires a password",
                config.label()
            )));
        }

        let lineups: Vec<String> = config
            .lineups
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        if lineups.is_empty() {
            return Err(AppError::configuration(format!(
                "Schedules Direct provider '{}' requires at least one lineup",
                config.label()
            )));
        }

        Ok(Self {
            config: config.clone(),
            lineups,
            base_url: DEFAULT_BASE_URL.to_string(),
            http_client,
            token: Mutex::new(None),
            cache: GuideCache::new(),
        })
    }

    /// Point the provider at a different API root
    pub fn with_base_url(mut self, base_url: &str) -> AppResult<Self> {
        let url = UrlUtils::validate_http_url(base_url).map_err(|reason| {
            AppError::configuration(format!("Invalid Schedules Direct base URL: {reason}"))
        })?;
        self.base_url = UrlUtils::with_trailing_slash(url.as_str());
        Ok(self)
    }

    pub async fn state(&self) -> ProviderState {
        self.cache.state().await
    }

    pub async fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.cache.refreshed_at().await
    }

    fn endpoint(&self, path: &str) -> AppResult<String> {
        UrlUtils::join(&self.base_url, path)
            .map_err(|e| AppError::internal(format!("Failed to build Schedules Direct URL: {e}")))
    }

    async fn login(&self) -> AppResult<String> {
        debug!("Logging in to Schedules Direct as '{}'", self.config.username);

        let request = TokenRequest {
            username: self.config.username.trim(),
            password: password_digest(&self.config.password),
        };
        let url = self.endpoint("token")?;

        let response: TokenResponse = self
            .http_client
            .post_json(&url, &request, &[])
            .await
            .map_err(|e| match e {
                AppError::Source(SourceError::Http {
                    status: 400 | 401 | 403,
                    message,
                }) => SourceError::auth_failed(SOURCE_TYPE, message).into(),
                other => other,
            })?;

        if response.code != 0 {
            return Err(SourceError::auth_failed(
                SOURCE_TYPE,
                format!("code {}: {}", response.code, response.message),
            )
            .into());
        }

        response
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SourceError::auth_failed(SOURCE_TYPE, "no token in response").into())
    }

    /// Cached session token, logging in when there is none
    async fn token(&self) -> AppResult<String> {
        let mut token = self.token.lock().await;
        if let Some(existing) = token.as_ref() {
            return Ok(existing.clone());
        }

        let fresh = self.login().await?;
        *token = Some(fresh.clone());
        Ok(fresh)
    }

    /// Drop the token when the API rejected it so the next call logs in again
    async fn check_token<T: Send>(&self, result: AppResult<T>) -> AppResult<T> {
        if let Err(AppError::Source(SourceError::Http {
            status: 401 | 403, ..
        })) = &result
        {
            debug!("Schedules Direct rejected the session token, discarding it");
            *self.token.lock().await = None;
        }
        result
    }

    async fn get_authorized<T: DeserializeOwned + Send>(&self, path: &str) -> AppResult<T> {
        let token = self.token().await?;
        let url = self.endpoint(path)?;
        let result = self
            .http_client
            .fetch_json_with_headers(&url, &[("token", token.as_str())])
            .await;
        self.check_token(result).await
    }

    async fn post_authorized<B, T>(&self, path: &str, body: &B) -> AppResult<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned + Send,
    {
        let token = self.token().await?;
        let url = self.endpoint(path)?;
        let result = self
            .http_client
            .post_json(&url, body, &[("token", token.as_str())])
            .await;
        self.check_token(result).await
    }

    async fn fetch_lineups(&self) -> AppResult<LineupSnapshot> {
        let mut snapshot = LineupSnapshot::default();

        for lineup in &self.lineups {
            let response: LineupResponse = self.get_authorized(&format!("lineups/{lineup}")).await?;
            let added = snapshot.add_lineup(lineup, response);
            debug!("Lineup '{}' contributed {} channels", lineup, added);
        }

        info!(
            "Fetched {} channels from {} Schedules Direct lineup(s) for '{}'",
            snapshot.channels.len(),
            self.lineups.len(),
            self.name()
        );
        Ok(snapshot)
    }

    async fn snapshot(&self) -> AppResult<Arc<LineupSnapshot>> {
        self.cache.get_or_load(|| self.fetch_lineups()).await
    }

    async fn fetch_airings(&self, station_ids: &[&str]) -> AppResult<Vec<(String, Airing)>> {
        let mut airings = Vec::new();

        for chunk in station_ids.chunks(MAX_STATIONS_PER_REQUEST) {
            let body: Vec<ScheduleRequest<'_>> = chunk
                .iter()
                .map(|&station_id| ScheduleRequest { station_id })
                .collect();
            let schedules: Vec<StationSchedule> = self.post_authorized("schedules", &body).await?;

            for schedule in schedules {
                if schedule.code != 0 && schedule.programs.is_empty() {
                    debug!(
                        "No schedule for station {} (code {})",
                        schedule.station_id, schedule.code
                    );
                    continue;
                }
                let id = channel_id(&schedule.station_id);
                airings.extend(schedule.programs.into_iter().map(|a| (id.clone(), a)));
            }
        }

        Ok(airings)
    }

    async fn fetch_programs(&self, program_ids: &[&str]) -> AppResult<HashMap<String, ProgramInfo>> {
        let mut programs = HashMap::with_capacity(program_ids.len());

        for chunk in program_ids.chunks(MAX_PROGRAMS_PER_REQUEST) {
            let response: Vec<ProgramInfo> = self.post_authorized("programs", &chunk).await?;
            programs.extend(response.into_iter().map(|p| (p.program_id.clone(), p)));
        }

        Ok(programs)
    }
}

/// Lowercase hex SHA-1 of the account password, as the token endpoint expects
fn password_digest(password: &str) -> String {
    hex::encode(Sha1::digest(password.as_bytes()))
}

fn channel_id(station_id: &str) -> String {
    format!("I{station_id}.json.schedulesdirect.org")
}

/// `EP012345670001` -> `EP01234567.0001`
fn dd_progid(program_id: &str) -> String {
    if program_id.len() > 4 && program_id.is_ascii() {
        let (series, episode) = program_id.split_at(program_id.len() - 4);
        format!("{series}.{episode}")
    } else {
        program_id.to_string()
    }
}

fn to_programme(channel: &str, airing: &Airing, info: Option<&ProgramInfo>) -> Option<Programme> {
    let start = DateTime::parse_from_rfc3339(&airing.air_date_time)
        .ok()?
        .with_timezone(&Utc);
    let stop = (airing.duration > 0).then(|| start + Duration::seconds(airing.duration));

    let title = info
        .and_then(|i| i.titles.iter().map(|t| t.title120.trim()).find(|t| !t.is_empty()))
        .unwrap_or(airing.program_id.as_str());

    let mut programme = Programme {
        channel: channel.to_string(),
        start: xmltv::format_time(&start),
        stop: stop.as_ref().map(xmltv::format_time),
        titles: vec![CommonElement::new(title)],
        episode_nums: vec![EpisodeNum {
            system: "dd_progid".to_string(),
            value: dd_progid(&airing.program_id),
        }],
        new: airing.new,
        ..Default::default()
    };

    if let Some(info) = info {
        if let Some(sub_title) = info.episode_title150.as_deref().filter(|s| !s.is_empty()) {
            programme.sub_titles.push(CommonElement::new(sub_title));
        }

        let description = info
            .descriptions
            .description1000
            .first()
            .or_else(|| info.descriptions.description100.first());
        if let Some(desc) = description.filter(|d| !d.description.is_empty()) {
            programme.descriptions.push(CommonElement {
                value: desc.description.clone(),
                lang: desc.description_language.clone(),
            });
        }

        programme.categories = info.genres.iter().map(CommonElement::new).collect();
        programme.previously_shown = !airing.new && info.original_air_date.is_some();
    }

    Some(programme)
}

#[async_trait]
impl GuideProvider for SchedulesDirectProvider {
    fn name(&self) -> String {
        if !self.config.name.is_empty() {
            return self.config.name.clone();
        }
        format!("Schedules Direct ({})", self.config.username.trim())
    }

    async fn channels(&self) -> AppResult<Vec<Channel>> {
        Ok(self.snapshot().await?.channels.clone())
    }

    async fn schedule(&self, channel_ids: &HashSet<String>) -> AppResult<Vec<Programme>> {
        if channel_ids.is_empty() {
            return Ok(Vec::new());
        }

        let snapshot = self.snapshot().await?;
        let station_ids: Vec<&str> = snapshot
            .channels
            .iter()
            .filter(|c| channel_ids.contains(&c.id))
            .filter_map(|c| snapshot.stations.get(&c.id).map(String::as_str))
            .collect();

        if station_ids.is_empty() {
            debug!("None of the requested channels are in '{}'", self.name());
            return Ok(Vec::new());
        }

        let airings = self.fetch_airings(&station_ids).await?;

        let mut seen = HashSet::new();
        let program_ids: Vec<&str> = airings
            .iter()
            .map(|(_, a)| a.program_id.as_str())
            .filter(|id| seen.insert(*id))
            .collect();
        let programs = self.fetch_programs(&program_ids).await?;

        let mut programmes = Vec::with_capacity(airings.len());
        for (channel, airing) in &airings {
            match to_programme(channel, airing, programs.get(&airing.program_id)) {
                Some(programme) => programmes.push(programme),
                None => debug!(
                    "Skipping airing of {} with unparseable time '{}'",
                    airing.program_id, airing.air_date_time
                ),
            }
        }

        info!(
            "Fetched {} programmes for {} stations from '{}'",
            programmes.len(),
            station_ids.len(),
            self.name()
        );
        Ok(programmes)
    }

    async fn refresh(&self) -> AppResult<()> {
        match self.cache.refresh_with(|| self.fetch_lineups()).await {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!("Refresh of Schedules Direct provider '{}' failed: {}", self.name(), e);
                Err(AppError::refresh(self.name(), e.to_string()))
            }
        }
    }

    fn configuration(&self) -> Configuration {
        self.config.clone()
    }
}
