use model::records::{
    mutation::{Fields, OperationKind},
    row::RowData,
    transaction::PendingTransaction,
};
use std::{collections::BTreeMap, fmt};

/// One write against the remote sink.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    BulkUpsert {
        table: String,
        rows: Vec<RowData>,
    },
    BulkDelete {
        table: String,
        row_ids: Vec<String>,
    },
    UpdateRow {
        table: String,
        row_id: String,
        fields: Fields,
    },
}

impl RemoteCall {
    pub fn table(&self) -> &str {
        match self {
            RemoteCall::BulkUpsert { table, .. }
            | RemoteCall::BulkDelete { table, .. }
            | RemoteCall::UpdateRow { table, .. } => table,
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            RemoteCall::BulkUpsert { .. } => OperationKind::Create,
            RemoteCall::BulkDelete { .. } => OperationKind::Delete,
            RemoteCall::UpdateRow { .. } => OperationKind::Update,
        }
    }
}

impl fmt::Display for RemoteCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteCall::BulkUpsert { table, rows } => {
                write!(f, "bulk upsert {table} ({} rows)", rows.len())
            }
            RemoteCall::BulkDelete { table, row_ids } => {
                write!(f, "bulk delete {table} ({} ids)", row_ids.len())
            }
            RemoteCall::UpdateRow {
                table,
                row_id,
                fields,
            } => write!(f, "update {table}#{row_id} ({} fields)", fields.len()),
        }
    }
}

/// The remote calls for one transaction, in the order they are issued:
/// one upsert per table with creates, one delete per table with deletes,
/// then every update on its own in original order.
///
/// Tables are visited in name order. Callers must not depend on that.
///
/// Grouping by kind means a delete always runs before an update of the same
/// transaction, even when the update came first locally.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadPlan {
    calls: Vec<RemoteCall>,
}

impl UploadPlan {
    pub fn build(tx: &PendingTransaction) -> Self {
        let mut creates: BTreeMap<String, Vec<RowData>> = BTreeMap::new();
        let mut deletes: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut updates = Vec::new();

        for mutation in &tx.mutations {
            match mutation.kind {
                OperationKind::Create => creates
                    .entry(mutation.table.clone())
                    .or_default()
                    .push(RowData::from_mutation(mutation)),
                OperationKind::Delete => deletes
                    .entry(mutation.table.clone())
                    .or_default()
                    .push(mutation.row_id.clone()),
                OperationKind::Update => updates.push(RemoteCall::UpdateRow {
                    table: mutation.table.clone(),
                    row_id: mutation.row_id.clone(),
                    fields: mutation.field_set(),
                }),
            }
        }

        let mut calls = Vec::with_capacity(creates.len() + deletes.len() + updates.len());
        calls.extend(
            creates
                .into_iter()
                .map(|(table, rows)| RemoteCall::BulkUpsert { table, rows }),
        );
        calls.extend(
            deletes
                .into_iter()
                .map(|(table, row_ids)| RemoteCall::BulkDelete { table, row_ids }),
        );
        calls.extend(updates);

        UploadPlan { calls }
    }

    pub fn calls(&self) -> &[RemoteCall] {
        &self.calls
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}
