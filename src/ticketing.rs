//! Ticketing collaborator (spec §6): accepts escalation tickets.

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Serialize;

#[async_trait]
pub trait Ticketing: Send + Sync {
    async fn open_ticket(&self, summary: &str, body: &str) -> Result<String>;
}

pub struct HttpTicketing {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTicketing {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .map_err(|e| Error::internal(format!("building ticketing http client: {e}")))?;
        Ok(Self { http, base_url: base_url.into() })
    }
}

#[derive(Serialize)]
struct TicketRequest<'a> {
    summary: &'a str,
    body: &'a str,
}

#[async_trait]
impl Ticketing for HttpTicketing {
    async fn open_ticket(&self, summary: &str, body: &str) -> Result<String> {
        #[derive(serde::Deserialize)]
        struct Resp {
            ticket_id: String,
        }

        let resp = self
            .http
            .post(format!("{}/tickets", self.base_url))
            .json(&TicketRequest { summary, body })
            .send()
            .await
            .map_err(|e| Error::transient_backend("ticketing", e.to_string()))?;

        if !resp.status().is_success() {
            return if resp.status().is_server_error() {
                Err(Error::transient_backend("ticketing", resp.status().to_string()))
            } else {
                Err(Error::permanent_backend("ticketing", resp.status().to_string()))
            };
        }

        let parsed: Resp = resp
            .json()
            .await
            .map_err(|e| Error::permanent_backend("ticketing", format!("decoding response: {e}")))?;
        Ok(parsed.ticket_id)
    }
}

pub struct FakeTicketing {
    pub next_id: std::sync::atomic::AtomicU64,
}

impl FakeTicketing {
    pub fn new() -> Self {
        Self { next_id: std::sync::atomic::AtomicU64::new(1) }
    }
}

impl Default for FakeTicketing {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ticketing for FakeTicketing {
    async fn open_ticket(&self, _summary: &str, _body: &str) -> Result<String> {
        let id = self.next_id.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(format!("ticket-{id}"))
    }
}
