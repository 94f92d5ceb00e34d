use crate::error::CliError;
use model::{
    core::value::Value,
    records::mutation::{Fields, Mutation, OperationKind},
};
use serde::Deserialize;
use std::path::Path;

/// One mutation as the local write path records it: plain JSON field values.
#[derive(Debug, Deserialize)]
struct MutationInput {
    table: String,
    row_id: RowIdInput,
    op: OperationKind,
    #[serde(default)]
    fields: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RowIdInput {
    Text(String),
    Number(i64),
}

impl RowIdInput {
    fn into_string(self) -> String {
        match self {
            RowIdInput::Text(s) => s,
            RowIdInput::Number(n) => n.to_string(),
        }
    }
}

pub async fn read_transaction(path: &Path) -> Result<Vec<Mutation>, CliError> {
    let content = tokio::fs::read_to_string(path).await?;
    parse_transaction(&content)
}

/// Parses a JSON array of mutations forming one local transaction.
pub fn parse_transaction(content: &str) -> Result<Vec<Mutation>, CliError> {
    let inputs: Vec<MutationInput> = serde_json::from_str(content)?;
    if inputs.is_empty() {
        return Err(CliError::InvalidInput(
            "a transaction needs at least one mutation".into(),
        ));
    }

    inputs
        .into_iter()
        .enumerate()
        .map(|(index, input)| to_mutation(index, input))
        .collect()
}

fn to_mutation(index: usize, input: MutationInput) -> Result<Mutation, CliError> {
    let row_id = input.row_id.into_string();
    if input.table.trim().is_empty() {
        return Err(CliError::InvalidInput(format!(
            "mutation {index} has an empty table name"
        )));
    }
    if row_id.trim().is_empty() {
        return Err(CliError::InvalidInput(format!(
            "mutation {index} has an empty row_id"
        )));
    }

    let fields = input.fields.map(|map| {
        map.into_iter()
            .map(|(column, value)| (column, Value::from_json(value)))
            .collect::<Fields>()
    });

    Ok(match input.op {
        OperationKind::Delete => Mutation::delete(&input.table, &row_id),
        OperationKind::Create => {
            Mutation::create(&input.table, &row_id, fields.unwrap_or_default())
        }
        OperationKind::Update => {
            Mutation::update(&input.table, &row_id, fields.unwrap_or_default())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json_mutations() {
        let mutations = parse_transaction(
            r#"[
                {"table": "equipment", "row_id": "7", "op": "CREATE",
                 "fields": {"name": "Drill", "count": 2, "active": true, "notes": null}},
                {"table": "equipment", "row_id": 7, "op": "UPDATE",
                 "fields": {"assigned_to": "X"}},
                {"table": "container", "row_id": "c-1", "op": "DELETE"}
            ]"#,
        )
        .unwrap();

        assert_eq!(mutations.len(), 3);

        let create = &mutations[0];
        assert_eq!(create.kind, OperationKind::Create);
        let fields = create.field_set();
        assert_eq!(fields["name"], Value::from("Drill"));
        assert_eq!(fields["count"], Value::Int(2));
        assert_eq!(fields["active"], Value::Boolean(true));
        assert_eq!(fields["notes"], Value::Null);

        assert_eq!(mutations[1].row_id, "7");
        assert_eq!(mutations[2], Mutation::delete("container", "c-1"));
    }

    #[test]
    fn delete_ignores_fields() {
        let mutations = parse_transaction(
            r#"[{"table": "container", "row_id": "1", "op": "DELETE", "fields": {"name": "x"}}]"#,
        )
        .unwrap();
        assert_eq!(mutations[0].fields, None);
    }

    #[test]
    fn empty_transaction_is_rejected() {
        assert!(matches!(
            parse_transaction("[]"),
            Err(CliError::InvalidInput(_))
        ));
    }

    #[test]
    fn unknown_operation_is_rejected() {
        let err = parse_transaction(r#"[{"table": "t", "row_id": "1", "op": "UPSERT"}]"#)
            .unwrap_err();
        assert!(matches!(err, CliError::InputParse(_)));
    }

    #[test]
    fn blank_identifiers_are_rejected() {
        let err = parse_transaction(r#"[{"table": " ", "row_id": "1", "op": "DELETE"}]"#)
            .unwrap_err();
        assert!(matches!(err, CliError::InvalidInput(_)));
    }
}
