//! Paging through the walks recorded on one calendar day.
//!
//! Each index change bumps a generation; a detail response is applied only if
//! it was requested under the current generation.

use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::api::WalkApi;
use crate::calendar::CalendarAggregator;
use crate::emotion::EmotionRecord;
use crate::errors::ApiError;
use crate::models::{WalkId, WalkSessionDetail};
use crate::session::SessionStore;

const MAX_STARS: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavigationContext {
    pub session_ids: Vec<WalkId>,
    pub current_index: usize,
    pub clicked_date: NaiveDate,
}

impl NavigationContext {
    pub fn current_id(&self) -> WalkId {
        self.session_ids[self.current_index]
    }

    pub fn has_previous(&self) -> bool {
        self.current_index > 0
    }

    pub fn has_next(&self) -> bool {
        self.current_index + 1 < self.session_ids.len()
    }
}

/// Filled/empty star split for the satisfaction score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StarRating {
    pub filled: usize,
    pub empty: usize,
    pub score: f64,
}

impl StarRating {
    pub fn from_walk_score(walk_score: Option<f64>) -> Self {
        let score = walk_score.unwrap_or(0.0);
        let whole = score.floor();
        Self {
            filled: whole.max(0.0) as usize,
            empty: (MAX_STARS - whole).max(0.0) as usize,
            score,
        }
    }

    pub fn label(&self) -> String {
        format!("{:.1}", self.score)
    }

    pub fn stars(&self) -> String {
        format!("{}{}", "★".repeat(self.filled), "☆".repeat(self.empty))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalkSnapshot {
    pub index: usize,
    pub session_id: WalkId,
    pub detail: WalkSessionDetail,
    pub emotion: EmotionRecord,
    pub rating: StarRating,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WalkView {
    Closed,
    Loading { index: usize },
    Ready(Box<WalkSnapshot>),
    Failed { index: usize, message: String },
}

struct NavState {
    context: Option<NavigationContext>,
    generation: u64,
    view: WalkView,
}

impl NavState {
    fn move_to(&mut self, index: usize) {
        if let Some(context) = self.context.as_mut() {
            context.current_index = index;
        }
        self.generation += 1;
        self.view = WalkView::Loading { index };
    }
}

pub struct WalkNavigator {
    api: Arc<dyn WalkApi>,
    session: Arc<SessionStore>,
    calendar: Arc<CalendarAggregator>,
    state: Mutex<NavState>,
}

impl WalkNavigator {
    pub fn new(
        api: Arc<dyn WalkApi>,
        session: Arc<SessionStore>,
        calendar: Arc<CalendarAggregator>,
    ) -> Self {
        Self {
            api,
            session,
            calendar,
            state: Mutex::new(NavState {
                context: None,
                generation: 0,
                view: WalkView::Closed,
            }),
        }
    }

    /// Starts navigating a day's walks. Returns `false` (and closes any context)
    /// when the day has no walks.
    pub async fn open(
        &self,
        mut session_ids: Vec<WalkId>,
        start_index: usize,
        clicked_date: NaiveDate,
    ) -> bool {
        session_ids.sort_unstable();
        session_ids.dedup();

        let mut state = self.state.lock().await;
        if session_ids.is_empty() {
            state.context = None;
            state.generation += 1;
            state.view = WalkView::Closed;
            return false;
        }

        let index = start_index.min(session_ids.len() - 1);
        state.context = Some(NavigationContext {
            session_ids,
            current_index: index,
            clicked_date,
        });
        state.move_to(index);
        true
    }

    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        state.context = None;
        state.generation += 1;
        state.view = WalkView::Closed;
    }

    pub async fn next(&self) -> bool {
        let mut state = self.state.lock().await;
        let Some(context) = state.context.as_ref().filter(|context| context.has_next()) else {
            return false;
        };
        let index = context.current_index + 1;
        state.move_to(index);
        true
    }

    pub async fn previous(&self) -> bool {
        let mut state = self.state.lock().await;
        let Some(context) = state.context.as_ref().filter(|context| context.has_previous()) else {
            return false;
        };
        let index = context.current_index - 1;
        state.move_to(index);
        true
    }

    /// Jumps to the walk with the given id if it belongs to the open day.
    pub async fn select(&self, session_id: WalkId) -> bool {
        let mut state = self.state.lock().await;
        let Some(context) = state.context.as_ref() else {
            return false;
        };
        let Ok(index) = context.session_ids.binary_search(&session_id) else {
            return false;
        };
        if index != context.current_index {
            state.move_to(index);
        }
        true
    }

    pub async fn context(&self) -> Option<NavigationContext> {
        self.state.lock().await.context.clone()
    }

    pub async fn current(&self) -> WalkView {
        self.state.lock().await.view.clone()
    }

    /// Fetches the detail and day emotion for the current index.
    ///
    /// Returns the view as it stands afterwards; a response for an index the
    /// user already left is dropped.
    pub async fn load_current(&self) -> Result<WalkView, ApiError> {
        let (generation, index, session_id, clicked_date) = {
            let mut state = self.state.lock().await;
            let Some(context) = state.context.clone() else {
                return Ok(WalkView::Closed);
            };
            let index = context.current_index;
            if !matches!(state.view, WalkView::Loading { .. }) {
                state.move_to(index);
            }
            (state.generation, index, context.current_id(), context.clicked_date)
        };

        let (detail, emotion) = tokio::join!(
            self.fetch_detail(session_id),
            self.calendar.resolve_emotion(clicked_date)
        );

        let mut state = self.state.lock().await;
        if state.generation != generation {
            debug!(session_id, index, generation, "discarding stale walk detail");
            return Ok(state.view.clone());
        }

        match detail {
            Ok(detail) => {
                let rating = StarRating::from_walk_score(detail.walk_score);
                state.view = WalkView::Ready(Box::new(WalkSnapshot {
                    index,
                    session_id,
                    detail,
                    emotion: emotion.unwrap_or_else(|| EmotionRecord::unrecorded(clicked_date)),
                    rating,
                }));
                Ok(state.view.clone())
            }
            Err(err) => {
                warn!(session_id, "walk detail failed: {err}");
                state.view = WalkView::Failed {
                    index,
                    message: err.to_string(),
                };
                Err(err)
            }
        }
    }

    async fn fetch_detail(&self, session_id: WalkId) -> Result<WalkSessionDetail, ApiError> {
        let token = self.session.token().await?;
        let response = self.api.walk_report(&token, session_id).await?;
        Ok(response.into())
    }
}
