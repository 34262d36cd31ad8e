//! Row source: full-table scan through a [`RowStore`].

use tracing::debug;

use crate::provider::RowStore;
use crate::spec::{ExportError, SpecRow};

/// Load every row of `table_id`.
///
/// Zero rows is a valid result; only a store failure is an error.
pub fn fetch_all(row_store: &dyn RowStore, table_id: &str) -> Result<Vec<SpecRow>, ExportError> {
    let l_rows = row_store
        .select_all(table_id)
        .map_err(|message| ExportError::StorageUnavailable {
            table: table_id.to_string(),
            message,
        })?;
    debug!(table = table_id, n_rows = l_rows.len(), "rows fetched");
    Ok(l_rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedStore(Result<Vec<SpecRow>, String>);

    impl RowStore for FixedStore {
        fn select_all(&self, _table_id: &str) -> Result<Vec<SpecRow>, String> {
            self.0.clone()
        }
    }

    #[test]
    fn fetch_all_empty_table_is_success() {
        let l_rows = fetch_all(&FixedStore(Ok(vec![])), "rex_news").expect("rows");
        assert!(l_rows.is_empty());
    }

    #[test]
    fn fetch_all_store_failure_is_storage_unavailable() {
        let err = fetch_all(&FixedStore(Err("connection refused".to_string())), "rex_news")
            .expect_err("failure");
        match err {
            ExportError::StorageUnavailable { table, message } => {
                assert_eq!(table, "rex_news");
                assert_eq!(message, "connection refused");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
