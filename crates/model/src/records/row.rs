use crate::{
    core::value::Value,
    records::mutation::{Fields, Mutation},
};
use serde::{Deserialize, Serialize};

/// Primary key column of every synced table.
pub const ID_COLUMN: &str = "id";

/// A full row sent to the remote store in a bulk upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowData {
    pub entity: String,
    pub fields: Fields,
}

impl RowData {
    pub fn new(entity: &str, fields: Fields) -> Self {
        RowData {
            entity: entity.to_string(),
            fields,
        }
    }

    /// Builds the upsert payload for a mutation: its field set with the row id
    /// merged in. The mutation's row id wins over an `id` key in the fields.
    pub fn from_mutation(mutation: &Mutation) -> Self {
        let mut fields = mutation.field_set();
        fields.insert(
            ID_COLUMN.to_string(),
            Value::String(mutation.row_id.clone()),
        );
        RowData::new(&mutation.table, fields)
    }

    pub fn to_json(&self) -> serde_json::Value {
        fields_to_json(&self.fields)
    }
}

/// Renders a field set as a plain JSON object.
pub fn fields_to_json(fields: &Fields) -> serde_json::Value {
    serde_json::Value::Object(
        fields
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect(),
    )
}
