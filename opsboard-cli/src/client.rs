//! HTTP client for communicating with opsboard-server

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::Serialize;

use opsboard_core::{CollectionKind, FieldMap, Item};

use crate::remote::{RemoteCollection, RemoteError, RemoteResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub const VERSION_HEADER: &str = "x-collection-version";

/// One collection on an opsboard server.
pub struct HttpCollection {
    http: reqwest::Client,
    base_url: String,
    kind: CollectionKind,
}

#[derive(Serialize)]
struct ReplaceRequest {
    version: u64,
    items: Vec<Item>,
}

impl HttpCollection {
    pub fn new(base_url: &str, kind: CollectionKind) -> RemoteResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(HttpCollection {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            kind,
        })
    }

    fn collection_url(&self) -> String {
        format!("{}/{}", self.base_url, self.kind.name())
    }

    fn item_url(&self, id: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.kind.name(), id)
    }
}

fn map_send_error(err: reqwest::Error) -> RemoteError {
    if err.is_timeout() {
        RemoteError::Timeout
    } else {
        RemoteError::Transport(err)
    }
}

async fn check_status(response: Response) -> RemoteResult<Response> {
    match response.status() {
        status if status.is_success() => Ok(response),
        StatusCode::NOT_FOUND => Err(RemoteError::NotFound),
        StatusCode::CONFLICT => Err(RemoteError::Conflict),
        status if status.is_client_error() => {
            // Our own request is malformed; retrying it cannot help
            let body = response.text().await.unwrap_or_default();
            Err(RemoteError::Rejected(format!("{status}: {body}")))
        }
        status => {
            let body = response.text().await.unwrap_or_default();
            Err(RemoteError::Server(format!("{status}: {body}")))
        }
    }
}

#[async_trait]
impl RemoteCollection for HttpCollection {
    async fn fetch_all(&self) -> RemoteResult<(u64, Vec<Item>)> {
        let response = self
            .http
            .get(self.collection_url())
            .send()
            .await
            .map_err(map_send_error)?;
        let response = check_status(response).await?;

        let version = response
            .headers()
            .get(VERSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let items = response.json().await.map_err(map_send_error)?;
        Ok((version, items))
    }

    async fn append(&self, fields: FieldMap) -> RemoteResult<Item> {
        let response = self
            .http
            .post(self.collection_url())
            .json(&fields)
            .send()
            .await
            .map_err(map_send_error)?;
        let response = check_status(response).await?;

        Ok(response.json().await.map_err(map_send_error)?)
    }

    async fn update_fields(&self, id: &str, fields: FieldMap) -> RemoteResult<Item> {
        let response = self
            .http
            .patch(self.item_url(id))
            .json(&fields)
            .send()
            .await
            .map_err(map_send_error)?;
        let response = check_status(response).await?;

        Ok(response.json().await.map_err(map_send_error)?)
    }

    async fn remove(&self, id: &str) -> RemoteResult<()> {
        let response = self
            .http
            .delete(self.item_url(id))
            .send()
            .await
            .map_err(map_send_error)?;
        check_status(response).await?;
        Ok(())
    }

    async fn replace_all(&self, version: u64, items: Vec<Item>) -> RemoteResult<u64> {
        let response = self
            .http
            .put(self.collection_url())
            .json(&ReplaceRequest { version, items })
            .send()
            .await
            .map_err(map_send_error)?;
        let response = check_status(response).await?;

        #[derive(serde::Deserialize)]
        struct ReplaceResponse {
            version: u64,
        }
        let body: ReplaceResponse = response.json().await.map_err(map_send_error)?;
        Ok(body.version)
    }
}
