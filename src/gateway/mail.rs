//! `reqwest`-backed implementation of `MailGateway` against a Gmail-API-shaped
//! REST surface: `send`/create-draft map to one POST each, `has_replies` maps
//! to a thread `get` and a message-count comparison.

use std::time::Duration;

use secrecy::ExposeSecret;
use secrecy::Secret;
use serde::Deserialize;
use serde::Serialize;

use super::MailGateway;
use super::Result;
use super::SendOutcome;
use crate::domain::Email;
use crate::domain::ThreadId;
use crate::error::EngineError;

pub struct HttpMailGateway {
    http_client: reqwest::Client,
    base_url: String,
    access_token: Secret<String>,
}

impl HttpMailGateway {
    pub fn new(
        base_url: String,
        access_token: Secret<String>,
        timeout: Duration,
    ) -> Self {
        let http_client = reqwest::Client::builder().timeout(timeout).build().expect("TLS backend must initialize");
        Self { http_client, base_url, access_token }
    }

    fn url(
        &self,
        path: &str,
    ) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[derive(Serialize)]
struct SendRequestBody<'a> {
    to: &'a str,
    subject: &'a str,
    body: &'a str,
    #[serde(rename = "threadId", skip_serializing_if = "Option::is_none")]
    thread_id: Option<&'a str>,
}

#[derive(Deserialize)]
struct SendResponseBody {
    #[serde(rename = "threadId")]
    thread_id: Option<String>,
}

#[derive(Deserialize)]
struct ThreadResponseBody {
    messages: Vec<serde_json::Value>,
}

fn to_gateway_error(e: reqwest::Error) -> EngineError {
    if e.is_timeout() {
        EngineError::Gateway(anyhow::anyhow!("timeout"))
    } else {
        EngineError::Gateway(anyhow::Error::new(e))
    }
}

impl HttpMailGateway {
    async fn post_message(
        &self,
        path: &str,
        email: &Email,
        thread_id: Option<&ThreadId>,
    ) -> Result<SendOutcome> {
        let body = SendRequestBody {
            to: email.recipient.as_ref(),
            subject: &email.subject,
            body: &email.body,
            thread_id: thread_id.map(|t| t.as_ref()),
        };

        let response = self
            .http_client
            .post(self.url(path))
            .bearer_auth(self.access_token.expose_secret())
            .json(&body)
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) if e.is_timeout() => return Ok(SendOutcome::failure("timeout")),
            Err(e) => return Ok(SendOutcome::failure(e.to_string())),
        };

        if !response.status().is_success() {
            let status = response.status();
            let message = response.text().await.unwrap_or_default();
            return Ok(SendOutcome::failure(format!("HTTP {status}: {message}")));
        }

        let parsed: SendResponseBody = response.json().await.map_err(to_gateway_error)?;
        Ok(SendOutcome::success(parsed.thread_id.map(ThreadId::new)))
    }
}

impl MailGateway for HttpMailGateway {
    #[tracing::instrument(skip(self, email), fields(recipient = %email.recipient))]
    async fn send(
        &self,
        email: &Email,
        thread_id: Option<&ThreadId>,
    ) -> Result<SendOutcome> {
        self.post_message("/messages/send", email, thread_id).await
    }

    #[tracing::instrument(skip(self, email), fields(recipient = %email.recipient))]
    async fn save_draft(
        &self,
        email: &Email,
        thread_id: Option<&ThreadId>,
    ) -> Result<SendOutcome> {
        self.post_message("/drafts", email, thread_id).await
    }

    #[tracing::instrument(skip(self))]
    async fn has_replies(
        &self,
        thread_id: &ThreadId,
        expected_message_count: u32,
    ) -> Result<bool> {
        let response = self
            .http_client
            .get(self.url(&format!("/threads/{}", thread_id.as_ref())))
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await;

        // Fail-closed: any gateway error (including timeout) is treated as "replied".
        let response = match response {
            Ok(r) => r,
            Err(_) => return Ok(true),
        };
        if !response.status().is_success() {
            return Ok(true);
        }
        let Ok(parsed) = response.json::<ThreadResponseBody>().await else {
            return Ok(true);
        };
        Ok(parsed.messages.len() as u32 > expected_message_count)
    }
}
