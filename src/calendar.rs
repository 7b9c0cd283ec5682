//! Month-level walk data and the per-day emotion cache behind the calendar.
//!
//! Month loads carry the generation they were issued under and are committed
//! only if no newer load started meanwhile. Emotion lookups are cache-aside
//! with at most one fetch in flight per date; concurrent callers share it.

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::api::WalkApi;
use crate::emotion::{EmotionLookup, EmotionRecord};
use crate::errors::ApiError;
use crate::models::{MonthlyWalkSummary, WalkId};
use crate::session::SessionStore;

#[derive(Debug, Clone)]
pub enum MonthLoad {
    Committed(Arc<MonthlyWalkSummary>),
    /// A later `load_month` call started before this one finished.
    Superseded,
}

#[derive(Default)]
struct MonthState {
    generation: u64,
    requested: Option<(i32, u32)>,
    summary: Option<Arc<MonthlyWalkSummary>>,
}

enum EmotionSlot {
    InFlight {
        request: u64,
        sender: broadcast::Sender<Option<EmotionRecord>>,
    },
    Resolved(Option<EmotionRecord>),
}

#[derive(Default)]
struct EmotionCache {
    next_request: u64,
    slots: HashMap<NaiveDate, EmotionSlot>,
}

impl EmotionCache {
    fn start(&mut self, date: NaiveDate) -> (u64, broadcast::Receiver<Option<EmotionRecord>>) {
        self.next_request += 1;
        let (sender, receiver) = broadcast::channel(1);
        self.slots.insert(
            date,
            EmotionSlot::InFlight {
                request: self.next_request,
                sender,
            },
        );
        (self.next_request, receiver)
    }
}

pub struct CalendarAggregator {
    api: Arc<dyn WalkApi>,
    session: Arc<SessionStore>,
    month: Mutex<MonthState>,
    emotions: Mutex<EmotionCache>,
}

impl CalendarAggregator {
    pub fn new(api: Arc<dyn WalkApi>, session: Arc<SessionStore>) -> Self {
        Self {
            api,
            session,
            month: Mutex::new(MonthState::default()),
            emotions: Mutex::new(EmotionCache::default()),
        }
    }

    /// Loads the walk summary for a month, superseding any earlier load.
    ///
    /// Until the response is committed, [`summary`](Self::summary) reports no data.
    /// A month that is already committed is returned without refetching.
    pub async fn load_month(&self, year: i32, month: u32) -> Result<MonthLoad, ApiError> {
        let generation = {
            let mut state = self.month.lock().await;
            if state.requested == Some((year, month)) {
                if let Some(summary) = &state.summary {
                    return Ok(MonthLoad::Committed(Arc::clone(summary)));
                }
            }
            state.generation += 1;
            state.requested = Some((year, month));
            state.summary = None;
            state.generation
        };

        let result = match self.session.token().await {
            Ok(token) => self.api.monthly_report(&token, year, month).await,
            Err(err) => Err(err),
        };

        let mut state = self.month.lock().await;
        if state.generation != generation {
            debug!(
                year,
                month,
                generation,
                current = state.generation,
                "discarding superseded month load"
            );
            return Ok(MonthLoad::Superseded);
        }

        let response = result?;
        let summary = Arc::new(MonthlyWalkSummary::from_response(year, month, response));
        info!(
            year,
            month,
            walk_days = summary.daily_entries.len(),
            "month summary committed"
        );
        state.summary = Some(Arc::clone(&summary));
        Ok(MonthLoad::Committed(summary))
    }

    pub async fn summary(&self) -> Option<Arc<MonthlyWalkSummary>> {
        self.month.lock().await.summary.clone()
    }

    pub async fn is_walk_day(&self, date: NaiveDate) -> bool {
        self.summary()
            .await
            .is_some_and(|summary| summary.is_walk_day(date))
    }

    pub async fn session_ids_for(&self, date: NaiveDate) -> Vec<WalkId> {
        self.summary()
            .await
            .map(|summary| summary.session_ids_for(date).to_vec())
            .unwrap_or_default()
    }

    /// Returns the cached emotion for `date`, or starts a background fetch and
    /// reports [`EmotionLookup::Pending`].
    pub async fn emotion_for(self: &Arc<Self>, date: NaiveDate) -> EmotionLookup {
        let request = {
            let mut cache = self.emotions.lock().await;
            match cache.slots.get(&date) {
                Some(EmotionSlot::Resolved(Some(record))) => {
                    return EmotionLookup::Ready(record.clone());
                }
                Some(EmotionSlot::Resolved(None)) => return EmotionLookup::Absent,
                Some(EmotionSlot::InFlight { .. }) => return EmotionLookup::Pending,
                None => cache.start(date).0,
            }
        };

        self.spawn_fetch(date, request);
        EmotionLookup::Pending
    }

    /// Waits for the emotion of `date`, joining an in-flight fetch if there is one.
    ///
    /// The fetch itself always runs on its own task, so dropping this future
    /// never leaves the date stuck in flight.
    pub async fn resolve_emotion(self: &Arc<Self>, date: NaiveDate) -> Option<EmotionRecord> {
        let mut receiver = {
            let mut cache = self.emotions.lock().await;
            match cache.slots.get(&date) {
                Some(EmotionSlot::Resolved(record)) => return record.clone(),
                Some(EmotionSlot::InFlight { sender, .. }) => sender.subscribe(),
                None => {
                    let (request, receiver) = cache.start(date);
                    self.spawn_fetch(date, request);
                    receiver
                }
            }
        };
        receiver.recv().await.ok().flatten()
    }

    /// Walk-day markers for a committed summary, kicking off any missing lookups.
    pub async fn markers(
        self: &Arc<Self>,
        summary: &MonthlyWalkSummary,
    ) -> BTreeMap<NaiveDate, EmotionLookup> {
        let mut markers = BTreeMap::new();
        for date in summary.walk_days() {
            markers.insert(date, self.emotion_for(date).await);
        }
        markers
    }

    /// Drops everything tied to the current session.
    pub async fn reset(&self) {
        {
            let mut state = self.month.lock().await;
            state.generation += 1;
            state.requested = None;
            state.summary = None;
        }
        self.emotions.lock().await.slots.clear();
    }

    fn spawn_fetch(self: &Arc<Self>, date: NaiveDate, request: u64) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = this.fetch_emotion(date).await;
            this.complete_emotion(date, request, outcome).await;
        });
    }

    async fn fetch_emotion(&self, date: NaiveDate) -> Result<Option<EmotionRecord>, ApiError> {
        let token = self.session.token().await?;
        self.api.emotion_on(&token, date).await
    }

    async fn complete_emotion(
        &self,
        date: NaiveDate,
        request: u64,
        outcome: Result<Option<EmotionRecord>, ApiError>,
    ) {
        let record = match outcome {
            Ok(record) => record,
            Err(err) => {
                warn!(%date, "emotion lookup failed: {err}");
                None
            }
        };

        let mut cache = self.emotions.lock().await;
        let current = matches!(
            cache.slots.get(&date),
            Some(EmotionSlot::InFlight { request: pending, .. }) if *pending == request
        );
        if !current {
            debug!(%date, request, "dropping emotion result for a cleared cache");
            return;
        }
        if let Some(EmotionSlot::InFlight { sender, .. }) =
            cache.slots.insert(date, EmotionSlot::Resolved(record.clone()))
        {
            let _ = sender.send(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emotion::EmotionLabel;
    use crate::testing::{date, signed_in_session, FakeWalkApi};
    use chrono::Datelike;
    use std::time::Duration;
    use tokio::time::sleep;

    fn may_report() -> serde_json::Value {
        serde_json::json!({
            "nickname": "may-walker",
            "cactus_level": 2,
            "emotion_analysis": [
                { "date": "2024-05-03", "walkhistory_id": [12, 3] },
                { "date": "2024-05-10", "walkhistory_id": [40] }
            ]
        })
    }

    fn june_report() -> serde_json::Value {
        serde_json::json!({
            "nickname": "june-walker",
            "cactus_level": 4,
            "emotion_analysis": [ { "date": "2024-06-01", "walkhistory_id": [77] } ]
        })
    }

    fn aggregator(api: FakeWalkApi) -> (Arc<FakeWalkApi>, Arc<CalendarAggregator>) {
        let api = Arc::new(api);
        let calendar = Arc::new(CalendarAggregator::new(api.clone(), signed_in_session()));
        (api, calendar)
    }

    #[tokio::test]
    async fn month_without_walks_has_no_walk_days() {
        let (_, calendar) = aggregator(
            FakeWalkApi::new().with_month(2024, 2, serde_json::json!({ "nickname": "idle" }), 0),
        );
        calendar.load_month(2024, 2).await.unwrap();

        let mut day = date(2024, 2, 1);
        while day.month() == 2 {
            assert!(!calendar.is_walk_day(day).await, "{day} marked as walk day");
            assert!(calendar.session_ids_for(day).await.is_empty());
            day = day.succ_opt().unwrap();
        }
    }

    #[tokio::test]
    async fn session_ids_are_sorted_for_walk_days() {
        let (_, calendar) = aggregator(FakeWalkApi::new().with_month(2024, 5, may_report(), 0));
        calendar.load_month(2024, 5).await.unwrap();

        assert!(calendar.is_walk_day(date(2024, 5, 3)).await);
        assert_eq!(calendar.session_ids_for(date(2024, 5, 3)).await, vec![3, 12]);
        assert!(!calendar.is_walk_day(date(2024, 5, 4)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn later_month_wins_when_earlier_response_arrives_last() {
        let (_, calendar) = aggregator(
            FakeWalkApi::new()
                .with_month(2024, 5, may_report(), 50)
                .with_month(2024, 6, june_report(), 10),
        );

        let (may, june) = tokio::join!(calendar.load_month(2024, 5), calendar.load_month(2024, 6));
        assert!(matches!(may.unwrap(), MonthLoad::Superseded));
        assert!(matches!(june.unwrap(), MonthLoad::Committed(_)));

        let summary = calendar.summary().await.unwrap();
        assert_eq!((summary.year, summary.month), (2024, 6));
        assert_eq!(summary.nickname, "june-walker");
    }

    #[tokio::test(start_paused = true)]
    async fn later_month_wins_when_earlier_response_arrives_first() {
        let (_, calendar) = aggregator(
            FakeWalkApi::new()
                .with_month(2024, 5, may_report(), 10)
                .with_month(2024, 6, june_report(), 50),
        );

        let (may, _) = tokio::join!(calendar.load_month(2024, 5), calendar.load_month(2024, 6));
        assert!(matches!(may.unwrap(), MonthLoad::Superseded));
        assert_eq!(calendar.summary().await.unwrap().month, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn previous_month_is_hidden_while_next_loads() {
        let (_, calendar) = aggregator(
            FakeWalkApi::new()
                .with_month(2024, 5, may_report(), 0)
                .with_month(2024, 6, june_report(), 50),
        );
        calendar.load_month(2024, 5).await.unwrap();
        assert!(calendar.is_walk_day(date(2024, 5, 3)).await);

        let loader = {
            let calendar = Arc::clone(&calendar);
            tokio::spawn(async move { calendar.load_month(2024, 6).await })
        };
        sleep(Duration::from_millis(5)).await;
        assert!(calendar.summary().await.is_none());
        assert!(!calendar.is_walk_day(date(2024, 5, 3)).await);

        loader.await.unwrap().unwrap();
        assert!(calendar.is_walk_day(date(2024, 6, 1)).await);
    }

    #[tokio::test]
    async fn committed_month_is_not_refetched() {
        let (api, calendar) = aggregator(FakeWalkApi::new().with_month(2024, 5, may_report(), 0));
        calendar.load_month(2024, 5).await.unwrap();
        calendar.load_month(2024, 5).await.unwrap();
        assert_eq!(FakeWalkApi::calls(&api.month_calls), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_emotion_lookups_share_one_fetch() {
        let day = date(2024, 5, 3);
        let (api, calendar) = aggregator(
            FakeWalkApi::new()
                .with_emotion(day, EmotionLabel::Joy)
                .with_emotion_delay(20),
        );

        assert_eq!(calendar.emotion_for(day).await, EmotionLookup::Pending);
        assert_eq!(calendar.emotion_for(day).await, EmotionLookup::Pending);
        let (first, second) = tokio::join!(calendar.resolve_emotion(day), calendar.resolve_emotion(day));
        assert_eq!(first.unwrap().label, EmotionLabel::Joy);
        assert_eq!(second.unwrap().label, EmotionLabel::Joy);

        match calendar.emotion_for(day).await {
            EmotionLookup::Ready(record) => assert_eq!(record.label, EmotionLabel::Joy),
            other => panic!("expected ready lookup, got {other:?}"),
        }
        assert_eq!(FakeWalkApi::calls(&api.emotion_calls), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn day_without_emotion_resolves_to_absent_once() {
        let day = date(2024, 5, 10);
        let (api, calendar) = aggregator(FakeWalkApi::new().with_emotion_delay(5));

        assert_eq!(calendar.emotion_for(day).await, EmotionLookup::Pending);
        sleep(Duration::from_millis(20)).await;
        assert_eq!(calendar.emotion_for(day).await, EmotionLookup::Absent);
        assert_eq!(calendar.emotion_for(day).await, EmotionLookup::Absent);
        assert_eq!(FakeWalkApi::calls(&api.emotion_calls), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_waiter_does_not_strand_the_date() {
        let day = date(2024, 5, 3);
        let (api, calendar) = aggregator(
            FakeWalkApi::new()
                .with_emotion(day, EmotionLabel::Fear)
                .with_emotion_delay(50),
        );

        let waiter = {
            let calendar = Arc::clone(&calendar);
            tokio::spawn(async move { calendar.resolve_emotion(day).await })
        };
        sleep(Duration::from_millis(5)).await;
        waiter.abort();
        assert!(waiter.await.unwrap_err().is_cancelled());

        sleep(Duration::from_secs(60)).await;
        match calendar.emotion_for(day).await {
            EmotionLookup::Ready(record) => assert_eq!(record.label, EmotionLabel::Fear),
            other => panic!("expected ready lookup, got {other:?}"),
        }
        let record = tokio::time::timeout(Duration::from_secs(30), calendar.resolve_emotion(day))
            .await
            .expect("resolve_emotion waited on a cancelled fetch");
        assert_eq!(record.unwrap().label, EmotionLabel::Fear);
        assert_eq!(FakeWalkApi::calls(&api.emotion_calls), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn waiter_cancelled_before_fetch_starts_still_resolves_later_callers() {
        let day = date(2024, 5, 10);
        let (api, calendar) = aggregator(FakeWalkApi::new().with_emotion_delay(50));

        let waiter = {
            let calendar = Arc::clone(&calendar);
            tokio::spawn(async move { calendar.resolve_emotion(day).await })
        };
        tokio::task::yield_now().await;
        waiter.abort();

        let record = tokio::time::timeout(Duration::from_secs(30), calendar.resolve_emotion(day))
            .await
            .expect("resolve_emotion never completed");
        assert!(record.is_none());
        assert_eq!(calendar.emotion_for(day).await, EmotionLookup::Absent);
        assert_eq!(FakeWalkApi::calls(&api.emotion_calls), 1);
    }

    #[tokio::test]
    async fn failed_emotion_fetch_is_not_retried() {
        let day = date(2024, 5, 10);
        let (api, calendar) = aggregator(FakeWalkApi::new().failing_emotions());

        assert!(calendar.resolve_emotion(day).await.is_none());
        assert_eq!(calendar.emotion_for(day).await, EmotionLookup::Absent);
        assert_eq!(FakeWalkApi::calls(&api.emotion_calls), 1);
    }

    #[tokio::test]
    async fn reset_forgets_month_and_emotions() {
        let day = date(2024, 5, 3);
        let (api, calendar) = aggregator(
            FakeWalkApi::new()
                .with_month(2024, 5, may_report(), 0)
                .with_emotion(day, EmotionLabel::Sadness),
        );
        calendar.load_month(2024, 5).await.unwrap();
        calendar.resolve_emotion(day).await.unwrap();

        calendar.reset().await;
        assert!(calendar.summary().await.is_none());

        calendar.resolve_emotion(day).await.unwrap();
        assert_eq!(FakeWalkApi::calls(&api.emotion_calls), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn markers_cover_every_walk_day() {
        let (_, calendar) = aggregator(
            FakeWalkApi::new()
                .with_month(2024, 5, may_report(), 0)
                .with_emotion(date(2024, 5, 3), EmotionLabel::Anger),
        );
        let MonthLoad::Committed(summary) = calendar.load_month(2024, 5).await.unwrap() else {
            panic!("month was superseded");
        };

        let markers = calendar.markers(&summary).await;
        assert_eq!(markers.len(), 2);
        assert!(markers.values().all(EmotionLookup::is_pending));

        sleep(Duration::from_millis(10)).await;
        let markers = calendar.markers(&summary).await;
        assert_eq!(markers[&date(2024, 5, 3)].color(), "#EF281C");
        assert_eq!(markers[&date(2024, 5, 10)], EmotionLookup::Absent);
    }
}
