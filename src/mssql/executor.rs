use std::sync::Arc;

use futures_util::TryStreamExt;
use tiberius::QueryItem;
use tracing::debug;

use super::client::MssqlClient;
use super::query::{Batch, column_value};
use crate::error::{Result, SqlServerError, handle_exception};
use crate::results::ResultSet;

/// Run a batch and buffer every result set it produces, empty ones included.
///
/// # Errors
/// Returns the translated server error if execution fails.
pub async fn query_batch(client: &mut MssqlClient, batch: &Batch) -> Result<Vec<ResultSet>> {
    debug!(
        bound = batch.values().len(),
        outputs = batch.outputs().len(),
        "executing query batch"
    );

    let mut stream = batch
        .to_query()
        .query(client)
        .await
        .map_err(handle_exception)?;

    let mut sets: Vec<ResultSet> = Vec::new();
    while let Some(item) = stream.try_next().await.map_err(handle_exception)? {
        match item {
            QueryItem::Metadata(meta) => {
                let column_names: Vec<String> = meta
                    .columns()
                    .iter()
                    .map(|col| col.name().to_string())
                    .collect();
                let mut result_set = ResultSet::with_capacity(10);
                result_set.set_column_names(Arc::new(column_names));
                sets.push(result_set);
            }
            QueryItem::Row(row) => {
                let values = row
                    .into_iter()
                    .map(column_value)
                    .collect::<Result<Vec<_>>>()?;
                if let Some(result_set) = sets.last_mut() {
                    result_set.add_row_values(values);
                }
            }
        }
    }

    Ok(sets)
}

/// Run a batch without reading rows; returns the summed row counts.
///
/// # Errors
/// Returns the translated server error if execution fails.
pub async fn execute_batch(client: &mut MssqlClient, batch: &Batch) -> Result<usize> {
    debug!(bound = batch.values().len(), "executing non-query batch");

    let exec_result = batch
        .to_query()
        .execute(client)
        .await
        .map_err(handle_exception)?;

    let rows_affected: u64 = exec_result.rows_affected().iter().sum();
    convert_affected_rows(rows_affected)
}

/// Run a statement outside `sp_executesql`, so transaction control applies to
/// the session.
///
/// # Errors
/// Returns the translated server error if execution fails.
pub async fn execute_simple(client: &mut MssqlClient, sql: &str) -> Result<()> {
    client
        .simple_query(sql)
        .await
        .map_err(handle_exception)?
        .into_results()
        .await
        .map_err(handle_exception)?;
    Ok(())
}

pub(crate) fn convert_affected_rows(rows_affected: u64) -> Result<usize> {
    usize::try_from(rows_affected).map_err(|e| {
        SqlServerError::CommandError(format!("Invalid rows affected count: {e}"))
    })
}
