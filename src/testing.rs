//! In-memory stand-in for the walk service used by unit tests.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::StatusCode;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::api::WalkApi;
use crate::emotion::{EmotionLabel, EmotionRecord};
use crate::errors::ApiError;
use crate::models::{MonthlyReportResponse, WalkId, WalkOnceResponse};
use crate::session::SessionStore;

pub const GOOD_USER: &str = "walker";
pub const GOOD_PASSWORD: &str = "secret";
pub const ISSUED_TOKEN: &str = "token-walker";

#[derive(Default)]
pub struct FakeWalkApi {
    months: HashMap<(i32, u32), (MonthlyReportResponse, Duration)>,
    walks: HashMap<WalkId, (WalkOnceResponse, Duration)>,
    emotions: HashMap<NaiveDate, EmotionRecord>,
    emotion_delay: Duration,
    fail_emotions: bool,
    fail_logout: bool,
    fail_warm_up: bool,
    reject_tokens: bool,
    pub month_calls: AtomicUsize,
    pub walk_calls: AtomicUsize,
    pub emotion_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
    pub warm_up_calls: AtomicUsize,
}

impl FakeWalkApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_month(mut self, year: i32, month: u32, report: serde_json::Value, delay_ms: u64) -> Self {
        let report: MonthlyReportResponse = serde_json::from_value(report).expect("month report");
        self.months
            .insert((year, month), (report, Duration::from_millis(delay_ms)));
        self
    }

    pub fn with_walk(mut self, id: WalkId, walk_score: Option<f64>, delay_ms: u64) -> Self {
        let walk = WalkOnceResponse {
            start_time: format!("08:{:02}", id % 60),
            end_time: format!("09:{:02}", id % 60),
            distance: 1000.0 + id as f64,
            actual_walk_time: 30.0,
            stable_score: 70.0,
            walk_score,
        };
        self.walks.insert(id, (walk, Duration::from_millis(delay_ms)));
        self
    }

    pub fn with_emotion(mut self, date: NaiveDate, label: EmotionLabel) -> Self {
        self.emotions.insert(
            date,
            EmotionRecord {
                date,
                label,
                fine_label: format!("{}-ish", label.as_str()),
                sentence: format!("felt {}", label.as_str()),
            },
        );
        self
    }

    pub fn with_emotion_delay(mut self, delay_ms: u64) -> Self {
        self.emotion_delay = Duration::from_millis(delay_ms);
        self
    }

    pub fn failing_emotions(mut self) -> Self {
        self.fail_emotions = true;
        self
    }

    pub fn failing_logout(mut self) -> Self {
        self.fail_logout = true;
        self
    }

    pub fn failing_warm_up(mut self) -> Self {
        self.fail_warm_up = true;
        self
    }

    pub fn rejecting_tokens(mut self) -> Self {
        self.reject_tokens = true;
        self
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn authorize(&self, token: &str) -> Result<(), ApiError> {
        if self.reject_tokens || token.is_empty() {
            return Err(ApiError::Unauthorized(StatusCode::UNAUTHORIZED));
        }
        Ok(())
    }
}

fn unavailable() -> ApiError {
    ApiError::Status {
        status: StatusCode::SERVICE_UNAVAILABLE,
        body: "unavailable".into(),
    }
}

#[async_trait]
impl WalkApi for FakeWalkApi {
    async fn login(&self, username: &str, password: &str) -> Result<String, ApiError> {
        if username == GOOD_USER && password == GOOD_PASSWORD {
            Ok(ISSUED_TOKEN.to_string())
        } else {
            Err(ApiError::Status {
                status: StatusCode::BAD_REQUEST,
                body: "invalid credentials".into(),
            })
        }
    }

    async fn logout(&self, token: &str) -> Result<(), ApiError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        self.authorize(token)?;
        if self.fail_logout {
            return Err(unavailable());
        }
        Ok(())
    }

    async fn warm_calendar(&self, token: &str) -> Result<(), ApiError> {
        self.warm_up_calls.fetch_add(1, Ordering::SeqCst);
        self.authorize(token)?;
        if self.fail_warm_up {
            return Err(unavailable());
        }
        Ok(())
    }

    async fn monthly_report(
        &self,
        token: &str,
        year: i32,
        month: u32,
    ) -> Result<MonthlyReportResponse, ApiError> {
        self.month_calls.fetch_add(1, Ordering::SeqCst);
        self.authorize(token)?;
        let (report, delay) = self.months.get(&(year, month)).cloned().unwrap_or_default();
        sleep(delay).await;
        Ok(report)
    }

    async fn walk_report(&self, token: &str, id: WalkId) -> Result<WalkOnceResponse, ApiError> {
        self.walk_calls.fetch_add(1, Ordering::SeqCst);
        self.authorize(token)?;
        let (walk, delay) = self.walks.get(&id).cloned().ok_or(ApiError::Status {
            status: StatusCode::NOT_FOUND,
            body: format!("walk {id} not found"),
        })?;
        sleep(delay).await;
        Ok(walk)
    }

    async fn emotion_on(
        &self,
        token: &str,
        date: NaiveDate,
    ) -> Result<Option<EmotionRecord>, ApiError> {
        self.emotion_calls.fetch_add(1, Ordering::SeqCst);
        self.authorize(token)?;
        sleep(self.emotion_delay).await;
        if self.fail_emotions {
            return Err(unavailable());
        }
        Ok(self.emotions.get(&date).cloned())
    }
}

pub fn signed_in_session() -> Arc<SessionStore> {
    Arc::new(SessionStore::with_token(
        scratch_session_path(),
        Some(ISSUED_TOKEN.to_string()),
    ))
}

pub fn scratch_session_path() -> PathBuf {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let n = COUNTER.fetch_add(1, Ordering::SeqCst);
    std::env::temp_dir().join(format!(
        "walk_dashboard_unit_{}_{n}/session.json",
        std::process::id()
    ))
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}
