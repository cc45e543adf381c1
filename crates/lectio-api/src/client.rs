//! HTTP client for the university timetable API.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{FixedOffset, NaiveDate, Utc};
use serde::Deserialize;

use lectio_core::config::{ApiConfig, WatcherConfig};
use lectio_core::error::{LectioError, Result};
use lectio_core::traits::ScheduleSource;
use lectio_core::types::Event;
use lectio_core::normalize::is_session_event;

use crate::cache::TtlCache;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ATTEMPTS: u32 = 3;
const GROUPS_CACHE_TTL: Duration = Duration::from_secs(6 * 3600);
const GROUPS_CACHE_CAPACITY: usize = 16;

/// Timetable API client. One instance per process, shared by `Arc`.
pub struct TimetableClient {
    base_url: String,
    division_alias: String,
    client: reqwest::Client,
    regular_days: i64,
    session_days: i64,
    utc_offset_hours: i64,
    /// Bounded cache for year → group listings (they change rarely).
    groups_by_year: TtlCache<i32, Vec<Group>>,
}

impl TimetableClient {
    pub fn new(api: &ApiConfig, watcher: &WatcherConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LectioError::Api(format!("client init: {e}")))?;
        Ok(Self {
            base_url: api.base_url.trim_end_matches('/').to_string(),
            division_alias: api.division_alias.clone(),
            client,
            regular_days: watcher.regular_days,
            session_days: watcher.session_days,
            utc_offset_hours: watcher.utc_offset_hours,
            groups_by_year: TtlCache::new(GROUPS_CACHE_TTL, GROUPS_CACHE_CAPACITY),
        })
    }

    /// Campus-local date.
    pub fn today(&self) -> NaiveDate {
        let offset = FixedOffset::east_opt((self.utc_offset_hours * 3600) as i32)
            .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap());
        Utc::now().with_timezone(&offset).date_naive()
    }

    /// GET an endpoint with retry and exponential backoff.
    ///
    /// Server-side (5xx) and transport failures retry up to [`MAX_ATTEMPTS`]
    /// with 1s/2s backoff; client-side (4xx) failures fail fast.
    async fn request<T: serde::de::DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        let url = format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'));
        let mut last_error = LectioError::Api("request failed after retries".into());

        for attempt in 0..MAX_ATTEMPTS {
            match self.client.get(&url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response
                            .json::<T>()
                            .await
                            .map_err(|e| LectioError::Api(format!("invalid response: {e}")));
                    }
                    if status.is_server_error() {
                        tracing::warn!(
                            "API {status} (attempt {}/{MAX_ATTEMPTS}) for {url}",
                            attempt + 1
                        );
                        last_error = LectioError::Api(format!("API returned status {status}"));
                    } else {
                        // 4xx: not retryable.
                        tracing::error!("API error: {status} for {url}");
                        return Err(LectioError::Api(format!("API returned status {status}")));
                    }
                }
                Err(e) => {
                    tracing::warn!("HTTP error (attempt {}/{MAX_ATTEMPTS}): {e} for {url}", attempt + 1);
                    last_error = LectioError::Api(format!("HTTP error: {e}"));
                }
            }
            if attempt + 1 < MAX_ATTEMPTS {
                tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
            }
        }

        tracing::error!("All {MAX_ATTEMPTS} attempts failed for {url}");
        Err(last_error)
    }

    // ─── Schedule windows ──────────────────────────────────────

    /// Events for a group over an inclusive date range.
    pub async fn fetch_events(
        &self,
        group_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Event>> {
        let endpoint = format!(
            "groups/{group_id}/events/{}/{}",
            from.format("%Y-%m-%d"),
            to.format("%Y-%m-%d")
        );
        let response: EventsResponse = self.request(&endpoint).await?;
        Ok(response.flatten())
    }

    /// Health probe: one cheap read against the discovery endpoint.
    pub async fn check_health(&self) -> bool {
        self.divisions().await.is_ok()
    }

    // ─── Discovery ──────────────────────────────────────

    /// Faculties/divisions.
    pub async fn divisions(&self) -> Result<Vec<Division>> {
        self.request("study/divisions").await
    }

    /// Study programs of the configured division at a given level.
    pub async fn programs(&self, level: &str) -> Result<Vec<Program>> {
        let endpoint = format!("study/divisions/{}/programs/levels", self.division_alias);
        let levels: Vec<StudyLevel> = self.request(&endpoint).await?;

        let mut programs = Vec::new();
        for level_data in levels {
            if level_data.name != level {
                continue;
            }
            for combo in level_data.combinations {
                for year in combo.admission_years {
                    programs.push(Program {
                        program_id: year.student_group_id,
                        name: combo.name.clone(),
                        year: year.year_number,
                        year_name: year.year_name,
                    });
                }
            }
        }
        Ok(programs)
    }

    /// Student groups of one study program.
    pub async fn groups_by_program(&self, program_id: i64) -> Result<Vec<Group>> {
        let response: GroupsResponse = self
            .request(&format!("groups/{program_id}/groups"))
            .await?;
        Ok(response.flatten())
    }

    /// Bachelor groups by admission year, cached with TTL + capacity bounds.
    pub async fn groups_by_year(&self, year: i32) -> Result<Vec<Group>> {
        if let Some(groups) = self.groups_by_year.get(&year) {
            return Ok(groups);
        }

        let programs = self.programs("Bachelor").await?;
        let mut all_groups = Vec::new();
        for program in programs.iter().filter(|p| p.year == year) {
            match self.groups_by_program(program.program_id).await {
                Ok(mut groups) => {
                    for group in &mut groups {
                        group.program_name = program.name.clone();
                    }
                    all_groups.extend(groups);
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to get groups for program {}: {e}",
                        program.program_id
                    );
                }
            }
        }

        self.groups_by_year.insert(year, all_groups.clone());
        Ok(all_groups)
    }
}

#[async_trait]
impl ScheduleSource for TimetableClient {
    async fn regular_events(&self, group_id: i64) -> Result<Vec<Event>> {
        let start = self.today();
        let end = start + chrono::Duration::days(self.regular_days);
        self.fetch_events(group_id, start, end).await
    }

    async fn session_events(&self, group_id: i64) -> Result<Vec<Event>> {
        let start = self.today();
        let end = start + chrono::Duration::days(self.session_days);
        let events = self.fetch_events(group_id, start, end).await?;
        Ok(events.into_iter().filter(is_session_event).collect())
    }
}

// ─── Upstream payload shapes ──────────────────────────────────

/// Event listing: day-grouped on the usual endpoint, but occasionally a
/// flat list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EventsResponse {
    Grouped {
        #[serde(rename = "Days", default)]
        days: Vec<ScheduleDay>,
    },
    Flat(Vec<Event>),
}

impl EventsResponse {
    /// Flatten into a single event list, stamping each event with its day.
    fn flatten(self) -> Vec<Event> {
        match self {
            EventsResponse::Grouped { days } => days
                .into_iter()
                .flat_map(|day| {
                    let date = day.day;
                    day.events.into_iter().map(move |mut event| {
                        event.day_date = date.clone();
                        event
                    })
                })
                .collect(),
            EventsResponse::Flat(events) => events,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ScheduleDay {
    #[serde(rename = "Day", default)]
    day: String,
    #[serde(rename = "DayStudyEvents", default)]
    events: Vec<Event>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Division {
    #[serde(rename = "Alias", default)]
    pub alias: String,
    #[serde(rename = "Name", default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub program_id: i64,
    pub name: String,
    pub year: i32,
    pub year_name: String,
}

#[derive(Debug, Deserialize)]
struct StudyLevel {
    #[serde(rename = "StudyLevelName", default)]
    name: String,
    #[serde(rename = "StudyProgramCombinations", default)]
    combinations: Vec<ProgramCombination>,
}

#[derive(Debug, Deserialize)]
struct ProgramCombination {
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "AdmissionYears", default)]
    admission_years: Vec<AdmissionYear>,
}

#[derive(Debug, Deserialize)]
struct AdmissionYear {
    #[serde(rename = "StudentGroupId", default)]
    student_group_id: i64,
    #[serde(rename = "YearNumber", default)]
    year_number: i32,
    #[serde(rename = "YearName", default)]
    year_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Group {
    #[serde(rename = "StudentGroupId", default)]
    pub id: i64,
    #[serde(rename = "StudentGroupName", default)]
    pub name: String,
    #[serde(skip)]
    pub program_name: String,
}

/// Group listing: wrapped under `Groups` or a flat list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GroupsResponse {
    Wrapped {
        #[serde(rename = "Groups", default)]
        groups: Vec<Group>,
    },
    Flat(Vec<Group>),
}

impl GroupsResponse {
    fn flatten(self) -> Vec<Group> {
        match self {
            GroupsResponse::Wrapped { groups } => groups,
            GroupsResponse::Flat(groups) => groups,
        }
    }
}
