//! The eight tools named in spec §4.1.

use super::schema::{FieldSpec, FieldType};
use super::{Tool, ToolContext, ToolDescriptor, ToolError, ToolErrorKind, ToolOutcome, ToolRegistry};
use async_trait::async_trait;
use regex::Regex;
use serde_json::json;
use std::sync::LazyLock;

pub fn register_all(registry: &mut ToolRegistry) {
    registry.register(std::sync::Arc::new(CheckQuotaTool));
    registry.register(std::sync::Arc::new(GetCaseContextTool));
    registry.register(std::sync::Arc::new(UpdateCaseContextTool));
    registry.register(std::sync::Arc::new(GetPartyIdByReferenceTool));
    registry.register(std::sync::Arc::new(ResearchQueryTool));
    registry.register(std::sync::Arc::new(GenerateDraftTool));
    registry.register(std::sync::Arc::new(ConsultReasonerTool));
    registry.register(std::sync::Arc::new(OpenSupportTicketTool));
}

pub(crate) async fn attached_party_field_values(ctx: &ToolContext) -> Result<Vec<String>, ToolError> {
    let snapshot = ctx.case_store.load(&ctx.case_id).map_err(ToolError::from)?;
    let mut values = Vec::new();
    for party in &snapshot.case.attached_parties {
        let party = ctx.party_store.get(&party.party_id).map_err(ToolError::from)?;
        values.extend(party.pii_values().into_iter().map(|s| s.to_string()));
    }
    Ok(values)
}

// --- check_quota ------------------------------------------------------------

pub struct CheckQuotaTool;

#[async_trait]
impl Tool for CheckQuotaTool {
    fn descriptor(&self) -> &ToolDescriptor {
        static DESC: LazyLock<ToolDescriptor> = LazyLock::new(|| ToolDescriptor {
            name: "check_quota",
            parameter_schema: vec![
                FieldSpec::new("case_id", FieldType::String),
                FieldSpec::new("tier", FieldType::Integer),
            ],
            result_schema: vec![FieldSpec::new("has_quota", FieldType::Boolean)],
            error_taxonomy: vec![ToolErrorKind::NotFound, ToolErrorKind::TransientBackend],
            pii_capable: false,
            idempotent: true,
        });
        &DESC
    }

    async fn execute(&self, params: serde_json::Value, ctx: &ToolContext) -> ToolOutcome {
        let tier = params["tier"].as_u64().unwrap_or(0) as u8;
        let snapshot = match ctx.case_store.load(&ctx.case_id) {
            Ok(s) => s,
            Err(e) => return ToolOutcome::err(e.into()),
        };
        match ctx.billing.check_quota(&snapshot.case.owner, tier).await {
            Ok(has_quota) => ToolOutcome::ok(json!({"has_quota": has_quota})),
            Err(e) => ToolOutcome::err(e.into()),
        }
    }
}

// --- get_case_context --------------------------------------------------------

pub struct GetCaseContextTool;

#[async_trait]
impl Tool for GetCaseContextTool {
    fn descriptor(&self) -> &ToolDescriptor {
        static DESC: LazyLock<ToolDescriptor> = LazyLock::new(|| ToolDescriptor {
            name: "get_case_context",
            parameter_schema: vec![FieldSpec::new("case_id", FieldType::String)],
            result_schema: vec![],
            error_taxonomy: vec![ToolErrorKind::NotFound],
            pii_capable: false,
            idempotent: true,
        });
        &DESC
    }

    async fn execute(&self, _params: serde_json::Value, ctx: &ToolContext) -> ToolOutcome {
        match ctx.case_store.load(&ctx.case_id) {
            Ok(snapshot) => match serde_json::to_value(&snapshot.context) {
                Ok(v) => ToolOutcome::ok(v),
                Err(e) => ToolOutcome::err(ToolError::new(ToolErrorKind::PermanentBackend, e.to_string())),
            },
            Err(e) => ToolOutcome::err(e.into()),
        }
    }
}

// --- update_case_context ------------------------------------------------------

pub struct UpdateCaseContextTool;

#[async_trait]
impl Tool for UpdateCaseContextTool {
    fn descriptor(&self) -> &ToolDescriptor {
        static DESC: LazyLock<ToolDescriptor> = LazyLock::new(|| ToolDescriptor {
            name: "update_case_context",
            parameter_schema: vec![
                FieldSpec::new("case_id", FieldType::String),
                FieldSpec::new("updates", FieldType::Object(vec![])),
            ],
            result_schema: vec![FieldSpec::new("ok", FieldType::Boolean)],
            error_taxonomy: vec![ToolErrorKind::InvalidInput, ToolErrorKind::NotFound],
            pii_capable: false,
            idempotent: false,
        });
        &DESC
    }

    async fn execute(&self, params: serde_json::Value, ctx: &ToolContext) -> ToolOutcome {
        let Some(updates_obj) = params.get("updates").and_then(|v| v.as_object()) else {
            return ToolOutcome::err(ToolError::new(ToolErrorKind::InvalidInput, "updates must be an object"));
        };
        let mut updates = Vec::new();
        for (path, entry) in updates_obj {
            let replace = entry.get("replace").and_then(|v| v.as_bool()).unwrap_or(false);
            let value = entry.get("value").cloned().unwrap_or(entry.clone());
            updates.push(if replace {
                crate::store::Update::replace(path.clone(), value)
            } else {
                crate::store::Update::append(path.clone(), value)
            });
        }
        match ctx.case_store.apply_updates(&ctx.case_id, &updates) {
            Ok(()) => ToolOutcome::ok(json!({"ok": true})),
            Err(e) => ToolOutcome::err(e.into()),
        }
    }
}

// --- get_party_id_by_reference -------------------------------------------------

pub struct GetPartyIdByReferenceTool;

#[async_trait]
impl Tool for GetPartyIdByReferenceTool {
    fn descriptor(&self) -> &ToolDescriptor {
        static DESC: LazyLock<ToolDescriptor> = LazyLock::new(|| ToolDescriptor {
            name: "get_party_id_by_reference",
            parameter_schema: vec![
                FieldSpec::new("case_id", FieldType::String),
                FieldSpec::new("reference", FieldType::String),
            ],
            result_schema: vec![FieldSpec::new("party_id", FieldType::String).optional()],
            error_taxonomy: vec![ToolErrorKind::NotFound],
            pii_capable: false,
            idempotent: true,
        });
        &DESC
    }

    async fn execute(&self, params: serde_json::Value, ctx: &ToolContext) -> ToolOutcome {
        let reference = params["reference"].as_str().unwrap_or("");
        let snapshot = match ctx.case_store.load(&ctx.case_id) {
            Ok(s) => s,
            Err(e) => return ToolOutcome::err(e.into()),
        };
        // Resolves only against attached_parties (spec §4.1): match by role
        // or by a positional "partyN" reference, never a free party lookup.
        let found = snapshot
            .case
            .attached_parties
            .iter()
            .enumerate()
            .find(|(i, p)| p.role.eq_ignore_ascii_case(reference) || format!("party{i}") == reference);

        match found {
            Some((_, p)) => ToolOutcome::ok(json!({"party_id": p.party_id})),
            None => ToolOutcome::ok(json!({"not_found": true})),
        }
    }
}

// --- research_query -----------------------------------------------------------

pub struct ResearchQueryTool;

#[async_trait]
impl Tool for ResearchQueryTool {
    fn descriptor(&self) -> &ToolDescriptor {
        static DESC: LazyLock<ToolDescriptor> = LazyLock::new(|| ToolDescriptor {
            name: "research_query",
            parameter_schema: vec![
                FieldSpec::new("source", FieldType::enum_of(["legislation", "jurisprudence"])),
                FieldSpec::new("keywords", FieldType::list(FieldType::String)),
                FieldSpec::new("mode", FieldType::enum_of(["summaries", "full_text"])),
                FieldSpec::new("doc_ids", FieldType::list(FieldType::String)).optional(),
            ],
            result_schema: vec![],
            error_taxonomy: vec![ToolErrorKind::InvalidInput, ToolErrorKind::TransientBackend],
            pii_capable: false,
            idempotent: true,
        });
        &DESC
    }

    async fn execute(&self, params: serde_json::Value, ctx: &ToolContext) -> ToolOutcome {
        if ctx.config.research_summary_limit == 0 {
            return ToolOutcome::err(ToolError::new(
                ToolErrorKind::InvalidInput,
                "research_summary_limit is 0; research_query is disabled",
            ));
        }
        let source = match params["source"].as_str() {
            Some("legislation") => crate::kb::ResearchSource::Legislation,
            Some("jurisprudence") => crate::kb::ResearchSource::Jurisprudence,
            _ => return ToolOutcome::err(ToolError::new(ToolErrorKind::InvalidInput, "invalid source")),
        };
        let mode = match params["mode"].as_str() {
            Some("summaries") => crate::kb::ResearchMode::Summaries,
            Some("full_text") => crate::kb::ResearchMode::FullText,
            _ => return ToolOutcome::err(ToolError::new(ToolErrorKind::InvalidInput, "invalid mode")),
        };
        let keywords = params["keywords"]
            .as_array()
            .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default();
        let doc_ids = params
            .get("doc_ids")
            .and_then(|v| v.as_array())
            .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect());

        let descriptor = crate::kb::ResearchQueryDescriptor {
            source,
            keywords,
            mode,
            doc_ids,
            limit: ctx.config.research_summary_limit,
        };

        match ctx.kb.query(&descriptor).await {
            Ok(records) => ToolOutcome::ok(json!(records)),
            Err(e) => ToolOutcome::err(e.into()),
        }
    }
}

// --- generate_draft ------------------------------------------------------------

static PLACEHOLDER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{party(\d+)\.(\w+)\}\}").unwrap());

pub struct GenerateDraftTool;

#[async_trait]
impl Tool for GenerateDraftTool {
    fn descriptor(&self) -> &ToolDescriptor {
        static DESC: LazyLock<ToolDescriptor> = LazyLock::new(|| ToolDescriptor {
            name: "generate_draft",
            parameter_schema: vec![
                FieldSpec::new("case_id", FieldType::String),
                FieldSpec::new("markdown", FieldType::String),
                FieldSpec::new("draft_name", FieldType::String),
            ],
            result_schema: vec![
                FieldSpec::new("object_path", FieldType::String),
                FieldSpec::new("draft_id", FieldType::String),
            ],
            error_taxonomy: vec![ToolErrorKind::InvalidInput, ToolErrorKind::Unauthorized, ToolErrorKind::TransientBackend],
            pii_capable: true,
            idempotent: false,
        });
        &DESC
    }

    async fn execute(&self, params: serde_json::Value, ctx: &ToolContext) -> ToolOutcome {
        let markdown = params["markdown"].as_str().unwrap_or("");
        let draft_name = params["draft_name"].as_str().unwrap_or("draft");

        if let Some(kind) = crate::llm::redaction::scan_for_pii_formats(markdown) {
            return ToolOutcome::err(ToolError::new(
                ToolErrorKind::InvalidInput,
                format!("draft markdown contains a raw {kind} value instead of a placeholder"),
            ));
        }

        let snapshot = match ctx.case_store.load(&ctx.case_id) {
            Ok(s) => s,
            Err(e) => return ToolOutcome::err(e.into()),
        };

        let mut resolved = markdown.to_string();
        for caps in PLACEHOLDER_PATTERN.captures_iter(markdown) {
            let index: usize = caps[1].parse().unwrap_or(usize::MAX);
            let field = &caps[2];
            let Some(attached) = snapshot.case.attached_parties.get(index) else {
                return ToolOutcome::err(ToolError::new(
                    ToolErrorKind::Unauthorized,
                    format!("placeholder party{index} is not attached to this case"),
                ));
            };
            let party = match ctx.party_store.get(&attached.party_id) {
                Ok(p) => p,
                Err(e) => return ToolOutcome::err(e.into()),
            };
            let Some(value) = party.field(field) else {
                return ToolOutcome::err(ToolError::new(ToolErrorKind::InvalidInput, format!("unknown party field {field}")));
            };
            resolved = resolved.replace(&caps[0], value);
        }

        let revision = snapshot.context.next_draft_revision(draft_name);
        let draft_id = uuid::Uuid::new_v4().to_string();
        let path = format!("drafts/{}/{}-v{}.md", ctx.case_id, draft_name, revision);

        if let Err(e) = ctx.objectstore.put(&path, resolved.as_bytes(), "text/markdown").await {
            return ToolOutcome::err(e.into());
        }

        let draft_entry = json!({
            "draft_id": draft_id,
            "name": draft_name,
            "revision": revision,
            "object_store_path": path,
            "generated_at": chrono::Utc::now(),
            "status": "generated",
            "feedback": [],
        });

        if let Err(e) = ctx.case_store.apply_updates(&ctx.case_id, &[crate::store::Update::append("drafts", draft_entry)]) {
            return ToolOutcome::err(e.into());
        }

        ToolOutcome::ok(json!({"object_path": path, "draft_id": draft_id}))
    }
}

// --- consult_reasoner -----------------------------------------------------------

pub struct ConsultReasonerTool;

#[async_trait]
impl Tool for ConsultReasonerTool {
    fn descriptor(&self) -> &ToolDescriptor {
        static DESC: LazyLock<ToolDescriptor> = LazyLock::new(|| ToolDescriptor {
            name: "consult_reasoner",
            parameter_schema: vec![
                FieldSpec::new("case_id", FieldType::String),
                FieldSpec::new("synthesized_context", FieldType::String),
                FieldSpec::new("question", FieldType::String),
            ],
            result_schema: vec![FieldSpec::new("response", FieldType::String)],
            error_taxonomy: vec![ToolErrorKind::TransientBackend, ToolErrorKind::PermanentBackend],
            pii_capable: false,
            idempotent: false,
        });
        &DESC
    }

    async fn execute(&self, params: serde_json::Value, ctx: &ToolContext) -> ToolOutcome {
        let context_digest = params["synthesized_context"].as_str().unwrap_or("");
        let question = params["question"].as_str().unwrap_or("");

        let party_values = match attached_party_field_values(ctx).await {
            Ok(v) => v,
            Err(e) => return ToolOutcome::err(e),
        };
        let refs: Vec<&str> = party_values.iter().map(String::as_str).collect();

        let request = crate::llm::CompletionRequest::new(
            "Esti un consultant juridic. Raspunde strict in limba romana.",
            vec![crate::llm::ChatMessage::user(format!("{context_digest}\n\nIntrebare: {question}"))],
        );

        match ctx.reasoner.generate(request, &refs, &ctx.config).await {
            Ok(resp) => match resp.output {
                crate::llm::CompletionOutput::Text { text } => ToolOutcome::ok(json!({"response": text})),
                crate::llm::CompletionOutput::ToolCalls { .. } => {
                    ToolOutcome::err(ToolError::new(ToolErrorKind::PermanentBackend, "reasoner unexpectedly returned tool calls"))
                }
            },
            Err(e) => ToolOutcome::err(e.into()),
        }
    }
}

// --- open_support_ticket ---------------------------------------------------------

pub struct OpenSupportTicketTool;

#[async_trait]
impl Tool for OpenSupportTicketTool {
    fn descriptor(&self) -> &ToolDescriptor {
        static DESC: LazyLock<ToolDescriptor> = LazyLock::new(|| ToolDescriptor {
            name: "open_support_ticket",
            parameter_schema: vec![
                FieldSpec::new("case_id", FieldType::String),
                FieldSpec::new("description", FieldType::String),
                FieldSpec::new("state_snapshot", FieldType::Object(vec![])).optional(),
            ],
            result_schema: vec![FieldSpec::new("ticket_id", FieldType::String)],
            error_taxonomy: vec![ToolErrorKind::TransientBackend, ToolErrorKind::PermanentBackend],
            pii_capable: false,
            idempotent: false,
        });
        &DESC
    }

    async fn execute(&self, params: serde_json::Value, ctx: &ToolContext) -> ToolOutcome {
        let description = params["description"].as_str().unwrap_or("");
        let body = serde_json::to_string_pretty(&params.get("state_snapshot").cloned().unwrap_or(json!({}))).unwrap_or_default();

        let ticket_id = match ctx.ticketing.open_ticket(description, &body).await {
            Ok(id) => id,
            Err(e) => return ToolOutcome::err(e.into()),
        };

        if let Err(e) = ctx.case_store.set_status(&ctx.case_id, crate::case::CaseStatus::PausedSupport) {
            return ToolOutcome::err(e.into());
        }

        ToolOutcome::ok(json!({"ticket_id": ticket_id}))
    }
}
