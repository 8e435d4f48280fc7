use super::error::TargetError;
use super::types::{BulkImportRequest, BulkImportResponse, CountResponse, TargetUser};
use super::TargetApi;
use crate::config::TargetConfig;
use crate::error::{MigrationError, MigrationResult};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;

const USERS_PATH: [&str; 3] = ["api", "admin", "users"];
const APPLICATIONS_PATH: [&str; 3] = ["api", "admin", "applications"];

/// reqwest-backed client for the identity service's admin API.
#[derive(Clone)]
pub struct TargetClient {
    http: reqwest::Client,
    base_url: Url,
    application_id: String,
}

impl TargetClient {
    pub fn new(config: &TargetConfig) -> MigrationResult<Self> {
        let base_url = Url::parse(config.base_url.trim())
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| {
                MigrationError::config(format!("invalid target base URL '{}'", config.base_url))
            })?;

        let mut headers = HeaderMap::new();
        headers.insert("X-API-Key", header_value("X-API-Key", &config.api_key)?);
        headers.insert(
            "X-Application-ID",
            header_value("X-Application-ID", &config.application_id)?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent("user-migrator/0.1")
            .build()
            .map_err(TargetError::Http)?;

        Ok(Self {
            http,
            base_url,
            application_id: config.application_id.clone(),
        })
    }

    /// Append percent-encoded `segments` to the base URL's path.
    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn fetch_total(&self, url: Url) -> Result<u64, TargetError> {
        let response = self
            .http
            .get(url)
            .query(&[("per_page", "1")])
            .send()
            .await?;

        let parsed: CountResponse = decode(response).await?;
        Ok(parsed.total)
    }
}

fn header_value(name: &str, value: &str) -> MigrationResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| MigrationError::config(format!("invalid value for header {name}")))
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, TargetError> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(TargetError::status(status, body));
    }

    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

#[async_trait]
impl TargetApi for TargetClient {
    async fn bulk_import(
        &self,
        request: &BulkImportRequest,
    ) -> Result<BulkImportResponse, TargetError> {
        let url = self.endpoint(USERS_PATH.into_iter().chain(["import"]));
        log::trace!("posting {} users to {}", request.users.len(), url);

        let response = self
            .http
            .post(url)
            .json(request)
            .send()
            .await?;

        decode(response).await
    }

    async fn count_users(&self) -> Result<u64, TargetError> {
        self.fetch_total(self.endpoint(USERS_PATH)).await
    }

    async fn count_app_profiles(&self) -> Result<u64, TargetError> {
        let url = self.endpoint(
            APPLICATIONS_PATH
                .into_iter()
                .chain([self.application_id.as_str(), "users"]),
        );
        self.fetch_total(url).await
    }

    /// A blank id never names a user.
    async fn find_user(&self, id: &str) -> Result<Option<TargetUser>, TargetError> {
        if id.trim().is_empty() {
            return Ok(None);
        }

        let response = self
            .http
            .get(self.endpoint(USERS_PATH.into_iter().chain([id])))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        decode(response).await.map(Some)
    }
}
