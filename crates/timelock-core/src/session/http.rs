//! REST session store.
//!
//! ```text
//! POST  {base}/api/timer-sessions/        {"scheduled_duration": 1500}
//! PATCH {base}/api/timer-sessions/{id}/   {"elapsed_time": 25, "status": "paused"}
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::{SessionStatus, SessionStore};
use crate::error::{Result, SessionError};

pub struct HttpSessionStore {
    client: Client,
    endpoint: Url,
    access_token: Option<String>,
}

#[derive(Serialize)]
struct CreateSession {
    scheduled_duration: u32,
}

#[derive(Serialize)]
struct UpdateSession {
    #[serde(skip_serializing_if = "Option::is_none")]
    elapsed_time: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<SessionStatus>,
}

#[derive(Deserialize)]
struct CreatedSession {
    #[serde(default)]
    id: Option<serde_json::Value>,
}

impl HttpSessionStore {
    /// Build a store rooted at `base_url`; any path on it is kept.
    pub fn new(base_url: &str, access_token: Option<String>, timeout: Duration) -> Result<Self> {
        let endpoint = Self::endpoint(base_url)?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(SessionError::from)?;
        Ok(Self {
            client,
            endpoint,
            access_token,
        })
    }

    fn endpoint(base_url: &str) -> Result<Url, SessionError> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(base.join("api/timer-sessions/")?)
    }

    fn session_url(&self, id: &str) -> Result<Url, SessionError> {
        Ok(self.endpoint.join(&format!("{id}/"))?)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn patch(&self, id: &str, body: &UpdateSession) -> Result<(), SessionError> {
        let url = self.session_url(id)?;
        let response = self
            .authorize(self.client.patch(url))
            .json(body)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}

async fn check(response: Response) -> Result<Response, SessionError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SessionError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl SessionStore for HttpSessionStore {
    async fn open_session(&self, scheduled_secs: u32) -> Result<String, SessionError> {
        let response = self
            .authorize(self.client.post(self.endpoint.clone()))
            .json(&CreateSession {
                scheduled_duration: scheduled_secs,
            })
            .send()
            .await?;
        let created: CreatedSession = check(response).await?.json().await?;
        let id = match created.id {
            Some(serde_json::Value::String(id)) if !id.is_empty() => id,
            Some(serde_json::Value::Number(id)) => id.to_string(),
            _ => return Err(SessionError::MissingId),
        };
        debug!(session = %id, scheduled_secs, "remote session opened");
        Ok(id)
    }

    async fn sync_elapsed(&self, id: &str, elapsed_secs: u32) -> Result<(), SessionError> {
        self.patch(
            id,
            &UpdateSession {
                elapsed_time: Some(elapsed_secs),
                status: None,
            },
        )
        .await
    }

    async fn set_status(
        &self,
        id: &str,
        status: SessionStatus,
        elapsed_secs: Option<u32>,
    ) -> Result<(), SessionError> {
        self.patch(
            id,
            &UpdateSession {
                elapsed_time: elapsed_secs,
                status: Some(status),
            },
        )
        .await
    }
}
