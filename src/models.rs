use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use crate::emotion::{EmotionLabel, EmotionRecord};

/// Numeric identifier of one completed walk.
pub type WalkId = u64;

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct EmotionAnalysisEntry {
    pub date: String,
    #[serde(default)]
    pub walkhistory_id: Vec<WalkId>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StableScoreEntry {
    pub date: String,
    #[serde(default)]
    pub end_time: String,
    #[serde(default)]
    pub stable_score: f64,
}

/// Body of `GET /walk-monthly-report/{year}/{month}/`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MonthlyReportResponse {
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub cactus_level: u8,
    #[serde(default)]
    pub cactus_score: f64,
    #[serde(default)]
    pub total_distance: f64,
    #[serde(default)]
    pub total_time: f64,
    #[serde(default)]
    pub sri_score: Option<f64>,
    #[serde(default)]
    pub sri_date: Option<String>,
    #[serde(default)]
    pub emotion_analysis: Vec<EmotionAnalysisEntry>,
    #[serde(default)]
    pub stable_scores: Vec<StableScoreEntry>,
}

/// Body of `GET /walk-once-report/{id}/`.
#[derive(Debug, Clone, Deserialize)]
pub struct WalkOnceResponse {
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub actual_walk_time: f64,
    #[serde(default)]
    pub stable_score: f64,
    #[serde(default)]
    pub walk_score: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmotionPayload {
    #[serde(default)]
    pub emotion_large: String,
    #[serde(default)]
    pub emotion_small: String,
    #[serde(default)]
    pub sentence: String,
}

/// Body of `GET /emotion-list-create/?todayDate=...`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct EmotionResponse {
    #[serde(default)]
    pub emotions: Option<EmotionPayload>,
}

impl EmotionResponse {
    pub fn into_record(self, date: NaiveDate) -> Option<EmotionRecord> {
        self.emotions.map(|payload| EmotionRecord {
            date,
            label: EmotionLabel::from_wire(&payload.emotion_large),
            fine_label: payload.emotion_small,
            sentence: payload.sentence,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StableScorePoint {
    pub date: String,
    pub end_time: String,
    #[serde(skip)]
    pub ended_at: Option<NaiveDateTime>,
    pub stable_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyWalkSummary {
    pub year: i32,
    pub month: u32,
    pub nickname: String,
    pub cactus_level: u8,
    pub cactus_score: f64,
    pub total_distance: f64,
    pub total_time: f64,
    pub stress_index: Option<f64>,
    pub stress_index_date: Option<String>,
    pub stability_series: Vec<StableScorePoint>,
    pub daily_entries: BTreeMap<NaiveDate, Vec<WalkId>>,
}

impl MonthlyWalkSummary {
    pub fn from_response(year: i32, month: u32, response: MonthlyReportResponse) -> Self {
        let mut daily_entries: BTreeMap<NaiveDate, Vec<WalkId>> = BTreeMap::new();
        for entry in response.emotion_analysis {
            let Some(date) = parse_iso_date(&entry.date) else {
                warn!(date = %entry.date, "skipping walk entry with invalid date");
                continue;
            };
            daily_entries
                .entry(date)
                .or_default()
                .extend(entry.walkhistory_id);
        }
        for ids in daily_entries.values_mut() {
            ids.sort_unstable();
            ids.dedup();
        }
        daily_entries.retain(|_, ids| !ids.is_empty());

        let stability_series = response
            .stable_scores
            .into_iter()
            .map(|entry| StableScorePoint {
                ended_at: parse_timestamp(&entry.end_time),
                date: entry.date,
                end_time: entry.end_time,
                stable_score: entry.stable_score,
            })
            .collect();

        Self {
            year,
            month,
            nickname: response.nickname,
            cactus_level: response.cactus_level.clamp(1, 5),
            cactus_score: response.cactus_score,
            total_distance: response.total_distance,
            total_time: response.total_time,
            stress_index: response.sri_score,
            stress_index_date: response.sri_date,
            stability_series,
            daily_entries,
        }
    }

    pub fn is_walk_day(&self, date: NaiveDate) -> bool {
        self.daily_entries
            .get(&date)
            .is_some_and(|ids| !ids.is_empty())
    }

    pub fn session_ids_for(&self, date: NaiveDate) -> &[WalkId] {
        self.daily_entries
            .get(&date)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn walk_days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.daily_entries.keys().copied()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalkSessionDetail {
    pub start_time: String,
    pub end_time: String,
    pub distance_meters: f64,
    pub actual_walk_minutes: f64,
    pub stability_score: f64,
    pub walk_score: Option<f64>,
}

impl From<WalkOnceResponse> for WalkSessionDetail {
    fn from(response: WalkOnceResponse) -> Self {
        Self {
            start_time: response.start_time,
            end_time: response.end_time,
            distance_meters: response.distance,
            actual_walk_minutes: response.actual_walk_time,
            stability_score: response.stable_score.clamp(0.0, 100.0),
            walk_score: response.walk_score,
        }
    }
}

pub fn iso_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn parse_iso_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

/// Accepts RFC 3339 as well as the naive `YYYY-MM-DD[ T]HH:MM:SS` forms the service emits.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.naive_utc());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
}
