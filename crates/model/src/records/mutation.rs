use crate::core::value::Value;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

/// Column name to new value. Ordered so generated statements are stable.
pub type Fields = BTreeMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Create => "CREATE",
            OperationKind::Update => "UPDATE",
            OperationKind::Delete => "DELETE",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single row-level change produced by a local write.
///
/// `fields` is present for `CREATE` and `UPDATE`; for `DELETE` it is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mutation {
    pub table: String,
    pub row_id: String,
    #[serde(rename = "op")]
    pub kind: OperationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Fields>,
}

impl Mutation {
    pub fn create(table: &str, row_id: &str, fields: Fields) -> Self {
        Mutation {
            table: table.to_string(),
            row_id: row_id.to_string(),
            kind: OperationKind::Create,
            fields: Some(fields),
        }
    }

    pub fn update(table: &str, row_id: &str, fields: Fields) -> Self {
        Mutation {
            table: table.to_string(),
            row_id: row_id.to_string(),
            kind: OperationKind::Update,
            fields: Some(fields),
        }
    }

    pub fn delete(table: &str, row_id: &str) -> Self {
        Mutation {
            table: table.to_string(),
            row_id: row_id.to_string(),
            kind: OperationKind::Delete,
            fields: None,
        }
    }

    /// The changed columns, empty when the mutation carries none.
    pub fn field_set(&self) -> Fields {
        self.fields.clone().unwrap_or_default()
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}#{}", self.kind, self.table, self.row_id)
    }
}
