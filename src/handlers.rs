use crate::auth;
use crate::calendar::MonthLoad;
use crate::emotion::EmotionLookup;
use crate::errors::{ApiError, AppError};
use crate::models::{parse_iso_date, MonthlyWalkSummary, WalkId};
use crate::state::AppState;
use crate::stats::{build_chart, StabilityChart};
use crate::ui::{render_dashboard, render_login, render_walk_detail, DashboardPage};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Form, Json,
};
use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

const MONTH_LOAD_FAILED: &str = "산책 기록을 불러오지 못했습니다.";

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct MonthQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct MonthResponse {
    pub loaded: bool,
    pub summary: Option<MonthlyWalkSummary>,
    pub chart: Option<StabilityChart>,
}

#[derive(Debug, Serialize)]
pub struct EmotionStatusResponse {
    pub date: String,
    pub status: &'static str,
    pub color: &'static str,
    pub label: Option<String>,
    pub fine_label: Option<String>,
    pub sentence: Option<String>,
}

pub async fn index(State(state): State<AppState>) -> Response {
    if state.session.is_active().await {
        return Redirect::to("/dashboard").into_response();
    }
    Html(render_login(None)).into_response()
}

pub async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    match auth::login(&state, &form.username, &form.password).await {
        Ok(()) => Redirect::to("/dashboard").into_response(),
        Err(err) => {
            warn!("login failed: {err:?}");
            (StatusCode::UNAUTHORIZED, Html(render_login(Some(err.user_message())))).into_response()
        }
    }
}

pub async fn logout(State(state): State<AppState>) -> Result<Redirect, AppError> {
    auth::logout(&state).await?;
    Ok(Redirect::to("/"))
}

pub async fn dashboard(
    State(state): State<AppState>,
    Query(query): Query<MonthQuery>,
) -> Result<Response, AppError> {
    if !state.session.is_active().await {
        return Ok(Redirect::to("/").into_response());
    }

    let (year, month) = resolve_month(&query)?;
    let mut notice = None;
    match state.calendar.load_month(year, month).await {
        Ok(MonthLoad::Committed(_) | MonthLoad::Superseded) => {}
        Err(err) if err.requires_login() => return Ok(expire(&state).await),
        Err(err) => {
            warn!(year, month, "month load failed: {err}");
            notice = Some(MONTH_LOAD_FAILED);
        }
    }

    let summary = displayed_summary(&state, year, month).await;
    let markers = match &summary {
        Some(summary) => state.calendar.markers(summary).await,
        None => BTreeMap::new(),
    };
    let chart = summary.as_deref().map(build_chart);

    let html = render_dashboard(&DashboardPage {
        year,
        month,
        summary: summary.as_deref(),
        markers: &markers,
        chart: chart.as_ref(),
        notice,
    });
    Ok(Html(html).into_response())
}

pub async fn select_day(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Redirect, AppError> {
    let date = parse_date(&date)?;
    let ids = state.calendar.session_ids_for(date).await;
    if state.navigator.open(ids, 0, date).await {
        if let Some(context) = state.navigator.context().await {
            return Ok(Redirect::to(&format!("/walk-history/{}", context.current_id())));
        }
    }
    Ok(Redirect::to(&format!(
        "/dashboard?year={}&month={}",
        date.year(),
        date.month()
    )))
}

pub async fn walk_history(
    State(state): State<AppState>,
    Path(session_id): Path<WalkId>,
) -> Response {
    if !state.session.is_active().await {
        return Redirect::to("/").into_response();
    }

    if !state.navigator.select(session_id).await {
        if let Some(context) = state.navigator.context().await {
            return Redirect::to(&format!("/walk-history/{}", context.current_id())).into_response();
        }
    }
    if let Err(err) = state.navigator.load_current().await {
        if err.requires_login() {
            return expire(&state).await;
        }
    }

    let context = state.navigator.context().await;
    let view = state.navigator.current().await;
    Html(render_walk_detail(context.as_ref(), &view)).into_response()
}

pub async fn walk_next(State(state): State<AppState>) -> Redirect {
    state.navigator.next().await;
    redirect_to_current(&state).await
}

pub async fn walk_previous(State(state): State<AppState>) -> Redirect {
    state.navigator.previous().await;
    redirect_to_current(&state).await
}

pub async fn walk_close(State(state): State<AppState>) -> Redirect {
    state.navigator.close().await;
    Redirect::to("/dashboard")
}

pub async fn api_month(
    State(state): State<AppState>,
    Path((year, month)): Path<(i32, u32)>,
) -> Result<Json<MonthResponse>, AppError> {
    validate_month(year, month)?;
    match state.calendar.load_month(year, month).await {
        Ok(_) => {}
        Err(err) if err.requires_login() => {
            auth::expire(&state).await;
            return Err(err.into());
        }
        Err(err) => return Err(err.into()),
    }

    let summary = displayed_summary(&state, year, month).await;
    let chart = summary.as_deref().map(build_chart);
    Ok(Json(MonthResponse {
        loaded: summary.is_some(),
        summary: summary.as_deref().cloned(),
        chart,
    }))
}

pub async fn api_emotion(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<EmotionStatusResponse>, AppError> {
    let date = parse_date(&date)?;
    if !state.session.is_active().await {
        return Err(ApiError::NotAuthenticated.into());
    }

    let lookup = state.calendar.emotion_for(date).await;
    let mut response = EmotionStatusResponse {
        date: date.to_string(),
        status: lookup.status(),
        color: lookup.color(),
        label: None,
        fine_label: None,
        sentence: None,
    };
    if let EmotionLookup::Ready(record) = lookup {
        response.label = Some(record.label.as_str().to_string());
        response.fine_label = Some(record.fine_label);
        response.sentence = Some(record.sentence);
    }
    Ok(Json(response))
}

async fn displayed_summary(
    state: &AppState,
    year: i32,
    month: u32,
) -> Option<Arc<MonthlyWalkSummary>> {
    state
        .calendar
        .summary()
        .await
        .filter(|summary| summary.year == year && summary.month == month)
}

async fn redirect_to_current(state: &AppState) -> Redirect {
    match state.navigator.context().await {
        Some(context) => Redirect::to(&format!("/walk-history/{}", context.current_id())),
        None => Redirect::to("/dashboard"),
    }
}

async fn expire(state: &AppState) -> Response {
    auth::expire(state).await;
    Redirect::to("/").into_response()
}

fn resolve_month(query: &MonthQuery) -> Result<(i32, u32), AppError> {
    let today = Local::now().date_naive();
    let year = query.year.unwrap_or(today.year());
    let month = query.month.unwrap_or(today.month());
    validate_month(year, month)?;
    Ok((year, month))
}

fn validate_month(year: i32, month: u32) -> Result<(), AppError> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(|_| ())
        .ok_or_else(|| AppError::bad_request(format!("invalid month {year}-{month}")))
}

fn parse_date(raw: &str) -> Result<NaiveDate, AppError> {
    parse_iso_date(raw).ok_or_else(|| AppError::bad_request("date must be YYYY-MM-DD"))
}
