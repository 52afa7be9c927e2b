//! Orchestrator core for the lawyer agent case workflow (spec §2): the
//! Tool Registry, Case Context Store Adapter, LLM Client pair,
//! Orchestrator, Node Library, and Request Handler that together drive
//! one case from intake through drafting to closure.

pub mod billing;
pub mod case;
pub mod complexity;
pub mod config;
pub mod error;
pub mod handler;
pub mod kb;
pub mod llm;
pub mod lock;
pub mod objectstore;
pub mod orchestrator;
pub mod party;
pub mod store;
pub mod ticketing;
pub mod tools;

pub use config::OrchestratorConfig;
pub use error::{Error, Result};
pub use handler::{Authorizer, HandlerResponse, RequestHandler, ResponseMetadata};
pub use orchestrator::{Node, NodeContext, NodeResult, Orchestrator, Outcome, RequestEvent};
