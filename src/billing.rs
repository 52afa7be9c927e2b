//! Quota/billing collaborator (spec §6): answers quota questions. Payment
//! completion arrives separately via the webhook handled in `handler.rs`.

use crate::case::Owner;
use crate::error::{Error, Result};
use async_trait::async_trait;

#[async_trait]
pub trait Billing: Send + Sync {
    async fn check_quota(&self, owner: &Owner, tier: u8) -> Result<bool>;
}

pub struct HttpBilling {
    http: reqwest::Client,
    base_url: String,
}

impl HttpBilling {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .map_err(|e| Error::internal(format!("building billing http client: {e}")))?;
        Ok(Self { http, base_url: base_url.into() })
    }
}

#[async_trait]
impl Billing for HttpBilling {
    async fn check_quota(&self, owner: &Owner, tier: u8) -> Result<bool> {
        #[derive(serde::Serialize)]
        struct Req<'a> {
            owner: &'a Owner,
            tier: u8,
        }
        #[derive(serde::Deserialize)]
        struct Resp {
            has_quota: bool,
        }

        let resp = self
            .http
            .post(format!("{}/quota/check", self.base_url))
            .json(&Req { owner, tier })
            .send()
            .await
            .map_err(|e| Error::transient_backend("billing", e.to_string()))?;

        if !resp.status().is_success() {
            return if resp.status().is_server_error() {
                Err(Error::transient_backend("billing", resp.status().to_string()))
            } else {
                Err(Error::permanent_backend("billing", resp.status().to_string()))
            };
        }

        let parsed: Resp = resp
            .json()
            .await
            .map_err(|e| Error::permanent_backend("billing", format!("decoding response: {e}")))?;
        Ok(parsed.has_quota)
    }
}

/// In-memory stand-in used by tests: quota for `(owner, tier)` pairs.
pub struct FakeBilling {
    pub quota: std::sync::Mutex<std::collections::HashSet<(String, u8)>>,
}

impl FakeBilling {
    pub fn new() -> Self {
        Self { quota: std::sync::Mutex::new(std::collections::HashSet::new()) }
    }

    pub fn grant(&self, owner_key: impl Into<String>, tier: u8) {
        self.quota.lock().unwrap().insert((owner_key.into(), tier));
    }
}

impl Default for FakeBilling {
    fn default() -> Self {
        Self::new()
    }
}

fn owner_key(owner: &Owner) -> String {
    match owner {
        Owner::Individual { user_id } => format!("user:{user_id}"),
        Owner::Organization { org_id } => format!("org:{org_id}"),
    }
}

#[async_trait]
impl Billing for FakeBilling {
    async fn check_quota(&self, owner: &Owner, tier: u8) -> Result<bool> {
        Ok(self.quota.lock().unwrap().contains(&(owner_key(owner), tier)))
    }
}
