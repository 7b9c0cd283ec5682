//! Client for the remote walk service.
//!
//! Every authenticated call sends `Authorization: Token <t>`; 401/403 surface as
//! [`ApiError::Unauthorized`] so callers can send the user back to login.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::config::Config;
use crate::emotion::EmotionRecord;
use crate::errors::ApiError;
use crate::models::{
    iso_date, EmotionResponse, LoginRequest, LoginResponse, MonthlyReportResponse, WalkId,
    WalkOnceResponse,
};

#[async_trait]
pub trait WalkApi: Send + Sync {
    /// Exchanges credentials for a bearer token.
    async fn login(&self, username: &str, password: &str) -> Result<String, ApiError>;

    async fn logout(&self, token: &str) -> Result<(), ApiError>;

    /// Server-side calendar warm-up issued right after login; the body is ignored.
    async fn warm_calendar(&self, token: &str) -> Result<(), ApiError>;

    async fn monthly_report(
        &self,
        token: &str,
        year: i32,
        month: u32,
    ) -> Result<MonthlyReportResponse, ApiError>;

    async fn walk_report(&self, token: &str, id: WalkId) -> Result<WalkOnceResponse, ApiError>;

    /// `Ok(None)` when the service has no emotion recorded for the day.
    async fn emotion_on(
        &self,
        token: &str,
        date: NaiveDate,
    ) -> Result<Option<EmotionRecord>, ApiError>;
}

pub struct HttpWalkApi {
    base_url: String,
    http: reqwest::Client,
}

impl HttpWalkApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into(),
            http,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::new(config.api_base_url.clone(), config.request_timeout)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder, token: &str) -> RequestBuilder {
        request.header(reqwest::header::AUTHORIZATION, format!("Token {token}"))
    }
}

async fn check(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(ApiError::Unauthorized(status));
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(ApiError::Status { status, body })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let bytes = check(response).await?.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|err| ApiError::Decode(err.to_string()))
}

#[async_trait]
impl WalkApi for HttpWalkApi {
    async fn login(&self, username: &str, password: &str) -> Result<String, ApiError> {
        let response = self
            .http
            .post(self.url("/user-login/"))
            .json(&LoginRequest { username, password })
            .send()
            .await?;
        let body: LoginResponse = decode(response).await?;
        body.token
            .filter(|token| !token.is_empty())
            .ok_or(ApiError::MissingToken)
    }

    async fn logout(&self, token: &str) -> Result<(), ApiError> {
        let request = self.http.post(self.url("/user-logout/")).json(&serde_json::json!({}));
        check(self.authorized(request, token).send().await?).await?;
        Ok(())
    }

    async fn warm_calendar(&self, token: &str) -> Result<(), ApiError> {
        let request = self.http.post(self.url("/get-calendar/")).json(&serde_json::json!({}));
        check(self.authorized(request, token).send().await?).await?;
        Ok(())
    }

    async fn monthly_report(
        &self,
        token: &str,
        year: i32,
        month: u32,
    ) -> Result<MonthlyReportResponse, ApiError> {
        let path = format!("/walk-monthly-report/{year}/{month}/");
        debug!(%path, "fetching monthly report");
        let request = self.http.get(self.url(&path));
        decode(self.authorized(request, token).send().await?).await
    }

    async fn walk_report(&self, token: &str, id: WalkId) -> Result<WalkOnceResponse, ApiError> {
        let path = format!("/walk-once-report/{id}/");
        debug!(%path, "fetching walk report");
        let request = self.http.get(self.url(&path));
        decode(self.authorized(request, token).send().await?).await
    }

    async fn emotion_on(
        &self,
        token: &str,
        date: NaiveDate,
    ) -> Result<Option<EmotionRecord>, ApiError> {
        let request = self
            .http
            .get(self.url("/emotion-list-create/"))
            .query(&[("todayDate", iso_date(date))]);
        let body: EmotionResponse = decode(self.authorized(request, token).send().await?).await?;
        Ok(body.into_record(date))
    }
}
