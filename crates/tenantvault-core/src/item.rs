//! Item records and caller input normalization.
//!
//! An item carries a handful of server-managed fields (identity, audit,
//! sharing) and one free-form payload. At rest the payload is either plain
//! (`payload`) or sealed (`encPayload`), never both.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, Result};
use crate::Record;

/// Fields the engine manages itself. They are stripped from caller input
/// before the remainder becomes the payload.
pub const MANAGED_FIELDS: &[&str] = &[
    "id",
    "tenantId",
    "groupId",
    "shareWith",
    "createdBy",
    "createdAt",
    "updatedBy",
    "updatedAt",
    "deletedBy",
    "deletedAt",
    "tags",
];

/// A stored item.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,

    /// Owning principal. Never changes after creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_by: Option<String>,

    /// Sharing scope matched against `group:action` claims.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,

    /// Comma-joined tag set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,

    /// Passed through untouched; not used for access decisions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_with: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enc_payload: Option<String>,
}

impl Item {
    /// Decode from a stored record.
    pub fn from_record(record: Record) -> Result<Self> {
        let item: Item = serde_json::from_value(Value::Object(record))
            .map_err(|e| CoreError::MalformedRecord(e.to_string()))?;
        if item.id.is_empty() {
            return Err(CoreError::MissingField("id"));
        }
        Ok(item)
    }

    /// Encode into a record for storage.
    pub fn to_record(&self) -> Result<Record> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(CoreError::MalformedRecord(
                "item did not encode to an object".into(),
            )),
            Err(e) => Err(CoreError::MalformedRecord(e.to_string())),
        }
    }

    /// Whether `user_id` owns this item.
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.created_by.as_deref() == Some(user_id)
    }

    /// Whether the payload is currently sealed.
    pub fn is_sealed(&self) -> bool {
        self.enc_payload.is_some()
    }
}

/// Caller input split into managed fields and the free-form payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ItemDraft {
    pub id: Option<String>,
    pub group_id: Option<String>,
    /// Tags as supplied, already joined into one comma-separated string.
    pub tags: Option<String>,
    pub share_with: Option<Value>,
    /// Input with every managed field removed.
    pub payload: Record,
}

impl ItemDraft {
    /// Split caller input. The input must be a JSON object.
    pub fn from_input(input: Value) -> Result<Self> {
        let Value::Object(mut fields) = input else {
            return Err(CoreError::InvalidField {
                field: "item",
                reason: "expected a JSON object".into(),
            });
        };

        let id = optional_string(fields.get("id"), "id")?;
        if matches!(id.as_deref(), Some("")) {
            return Err(CoreError::InvalidField {
                field: "id",
                reason: "must not be empty".into(),
            });
        }
        let group_id = optional_string(fields.get("groupId"), "groupId")?;
        let tags = tags_from_value(fields.get("tags"))?;
        let share_with = fields.get("shareWith").filter(|v| !v.is_null()).cloned();

        for name in MANAGED_FIELDS {
            fields.remove(*name);
        }

        Ok(Self {
            id,
            group_id: group_id.filter(|g| !g.is_empty()),
            tags,
            share_with,
            payload: fields,
        })
    }
}

fn optional_string(value: Option<&Value>, field: &'static str) -> Result<Option<String>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(CoreError::InvalidField {
            field,
            reason: format!("expected a string, got {}", other),
        }),
    }
}

fn tags_from_value(value: Option<&Value>) -> Result<Option<String>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Array(values)) => {
            let mut parts = Vec::with_capacity(values.len());
            for v in values {
                match v {
                    Value::String(s) => parts.push(s.as_str()),
                    other => {
                        return Err(CoreError::InvalidField {
                            field: "tags",
                            reason: format!("expected string tags, got {}", other),
                        })
                    }
                }
            }
            Ok(Some(parts.join(",")))
        }
        Some(other) => Err(CoreError::InvalidField {
            field: "tags",
            reason: format!("expected a string or array, got {}", other),
        }),
    }
}

/// Normalize a comma-joined tag string: trim, drop empties, drop repeats
/// (first occurrence wins). Returns `None` when nothing is left.
///
/// Comparison is exact, so `Work` and `work` are kept as distinct tags.
pub fn clean_tags(tags: Option<&str>) -> Option<String> {
    let mut seen: Vec<&str> = Vec::new();
    for tag in tags?.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if !seen.contains(&tag) {
            seen.push(tag);
        }
    }
    if seen.is_empty() {
        None
    } else {
        Some(seen.join(","))
    }
}
