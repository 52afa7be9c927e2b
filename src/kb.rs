//! Knowledge-base collaborator (spec §6): executes structured research
//! queries. Implemented as an HTTP client (SPEC_FULL.md §C.1), following
//! the LLM client's build-request/deserialize-response idiom.

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchSource {
    Legislation,
    Jurisprudence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchMode {
    Summaries,
    FullText,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchQueryDescriptor {
    pub source: ResearchSource,
    pub keywords: Vec<String>,
    pub mode: ResearchMode,
    pub doc_ids: Option<Vec<String>>,
    pub limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchResultRecord {
    pub doc_id: String,
    pub title: String,
    pub summary: String,
    pub full_text: Option<String>,
    pub relevance: f32,
}

#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    async fn query(&self, descriptor: &ResearchQueryDescriptor) -> Result<Vec<ResearchResultRecord>>;
}

pub struct HttpKnowledgeBase {
    http: reqwest::Client,
    base_url: String,
}

impl HttpKnowledgeBase {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| Error::internal(format!("building kb http client: {e}")))?;
        Ok(Self { http, base_url: base_url.into() })
    }
}

#[async_trait]
impl KnowledgeBase for HttpKnowledgeBase {
    async fn query(&self, descriptor: &ResearchQueryDescriptor) -> Result<Vec<ResearchResultRecord>> {
        let resp = self
            .http
            .post(format!("{}/research/query", self.base_url))
            .json(descriptor)
            .send()
            .await
            .map_err(|e| Error::transient_backend("knowledge_base", e.to_string()))?;

        if !resp.status().is_success() {
            return if resp.status().is_server_error() {
                Err(Error::transient_backend("knowledge_base", resp.status().to_string()))
            } else {
                Err(Error::permanent_backend("knowledge_base", resp.status().to_string()))
            };
        }

        resp.json()
            .await
            .map_err(|e| Error::permanent_backend("knowledge_base", format!("decoding response: {e}")))
    }
}

/// In-memory stand-in used by node/orchestrator tests.
pub struct FakeKnowledgeBase {
    pub records: Vec<ResearchResultRecord>,
}

#[async_trait]
impl KnowledgeBase for FakeKnowledgeBase {
    async fn query(&self, descriptor: &ResearchQueryDescriptor) -> Result<Vec<ResearchResultRecord>> {
        Ok(self.records.iter().take(descriptor.limit as usize).cloned().collect())
    }
}
