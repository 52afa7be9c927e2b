//! Typed parameter/result schemas for the Tool Registry (spec §4.1).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Specification for a single field of a tool's parameter or result schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
    pub description: String,
    pub required: bool,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self { name: name.into(), field_type, description: String::new(), required: true }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn to_prompt_line(&self) -> String {
        let hint = self.field_type.to_prompt_hint();
        let marker = if self.required { "" } else { " (optional)" };
        if self.description.is_empty() {
            format!("{} ({hint}){marker}", self.name)
        } else {
            format!("{} ({hint}){marker}: {}", self.name, self.description)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldType {
    String,
    Integer,
    Float,
    Boolean,
    List(Box<FieldType>),
    Object(Vec<FieldSpec>),
    Enum(Vec<String>),
}

impl FieldType {
    pub fn list(inner: FieldType) -> Self {
        Self::List(Box::new(inner))
    }

    pub fn object(fields: Vec<FieldSpec>) -> Self {
        Self::Object(fields)
    }

    pub fn enum_of(values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::Enum(values.into_iter().map(Into::into).collect())
    }

    pub fn to_prompt_hint(&self) -> String {
        match self {
            Self::String => "string".into(),
            Self::Integer => "integer".into(),
            Self::Float => "number".into(),
            Self::Boolean => "boolean".into(),
            Self::List(inner) => format!("list[{}]", inner.to_prompt_hint()),
            Self::Object(_) => "object".into(),
            Self::Enum(values) => {
                if values.len() <= 5 {
                    values.join("|")
                } else {
                    format!("one of {} values", values.len())
                }
            }
        }
    }

    pub fn is_compatible(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::String, Value::String(_)) => true,
            (Self::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (Self::Float, Value::Number(_)) => true,
            (Self::Boolean, Value::Bool(_)) => true,
            (Self::List(inner), Value::Array(arr)) => arr.iter().all(|v| inner.is_compatible(v)),
            (Self::Object(fields), Value::Object(obj)) => fields.iter().all(|f| {
                if f.required {
                    obj.get(&f.name).map(|v| f.field_type.is_compatible(v)).unwrap_or(false)
                } else {
                    obj.get(&f.name).map(|v| f.field_type.is_compatible(v)).unwrap_or(true)
                }
            }),
            (Self::Enum(values), Value::String(s)) => values.contains(s),
            _ => false,
        }
    }

    pub fn to_json_schema(&self) -> Value {
        match self {
            Self::String => serde_json::json!({"type": "string"}),
            Self::Integer => serde_json::json!({"type": "integer"}),
            Self::Float => serde_json::json!({"type": "number"}),
            Self::Boolean => serde_json::json!({"type": "boolean"}),
            Self::List(inner) => serde_json::json!({"type": "array", "items": inner.to_json_schema()}),
            Self::Object(fields) => {
                let properties: serde_json::Map<String, Value> =
                    fields.iter().map(|f| (f.name.clone(), f.field_type.to_json_schema())).collect();
                let required: Vec<&str> = fields.iter().filter(|f| f.required).map(|f| f.name.as_str()).collect();
                serde_json::json!({"type": "object", "properties": properties, "required": required})
            }
            Self::Enum(values) => serde_json::json!({"type": "string", "enum": values}),
        }
    }
}

/// Validate a JSON argument map against an object-shaped parameter schema.
pub fn validate_params(schema: &[FieldSpec], params: &Value) -> Result<(), String> {
    let obj = params.as_object().ok_or("parameters must be a JSON object")?;
    for field in schema {
        match obj.get(&field.name) {
            Some(v) if !field.field_type.is_compatible(v) => {
                return Err(format!("field {} has wrong type", field.name));
            }
            None if field.required => {
                return Err(format!("missing required field {}", field.name));
            }
            _ => {}
        }
    }
    Ok(())
}
