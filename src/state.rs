use crate::api::WalkApi;
use crate::calendar::CalendarAggregator;
use crate::navigator::WalkNavigator;
use crate::session::SessionStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub api: Arc<dyn WalkApi>,
    pub session: Arc<SessionStore>,
    pub calendar: Arc<CalendarAggregator>,
    pub navigator: Arc<WalkNavigator>,
}

impl AppState {
    pub fn new(api: Arc<dyn WalkApi>, session: SessionStore) -> Self {
        let session = Arc::new(session);
        let calendar = Arc::new(CalendarAggregator::new(Arc::clone(&api), Arc::clone(&session)));
        let navigator = Arc::new(WalkNavigator::new(
            Arc::clone(&api),
            Arc::clone(&session),
            Arc::clone(&calendar),
        ));
        Self {
            api,
            session,
            calendar,
            navigator,
        }
    }
}
