//! Polars-backed [`RowStore`] over Arrow IPC frames.

use std::collections::BTreeMap;
use std::fs;
use std::io::Cursor;
use std::path::Path;

use polars::prelude::{AnyValue, DataFrame, IpcReader, SerReader};
use tracing::debug;

use crate::provider::RowStore;
use crate::spec::SpecRow;

/// File extensions read by [`FrameRowStore::from_ipc_dir`].
const L_EXT_IPC: [&str; 2] = ["ipc", "arrow"];

/// Row store holding one [`DataFrame`] per table.
#[derive(Debug, Clone, Default)]
pub struct FrameRowStore {
    dict_frames: BTreeMap<String, DataFrame>,
}

impl FrameRowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `df` as the rows of `table_id`.
    pub fn insert(&mut self, table_id: impl Into<String>, df: DataFrame) {
        self.dict_frames.insert(table_id.into(), df);
    }

    /// Register an IPC-encoded frame.
    pub fn insert_ipc_bytes(
        &mut self,
        table_id: impl Into<String>,
        v_ipc_df: &[u8],
    ) -> Result<(), String> {
        let df = derive_dataframe_from_ipc_bytes(v_ipc_df)?;
        self.insert(table_id, df);
        Ok(())
    }

    /// Load every `{table}.ipc` / `{table}.arrow` file of `dir`.
    pub fn from_ipc_dir(dir: &Path) -> Result<Self, String> {
        let mut store = Self::new();
        let entries = fs::read_dir(dir)
            .map_err(|err| format!("Failed to read frame directory {}: {err}", dir.display()))?;

        for entry in entries {
            let path = entry
                .map_err(|err| format!("Failed to read frame directory entry: {err}"))?
                .path();
            let if_is_ipc = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| L_EXT_IPC.contains(&ext));
            let Some(c_table) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            if !path.is_file() || !if_is_ipc {
                continue;
            }

            let v_bytes = fs::read(&path)
                .map_err(|err| format!("Failed to read frame file {}: {err}", path.display()))?;
            store.insert_ipc_bytes(c_table, &v_bytes)?;
            debug!(table = c_table, path = %path.display(), "frame loaded");
        }
        Ok(store)
    }

    /// Column names of the frame registered for `table_id`.
    pub fn columns(&self, table_id: &str) -> Option<Vec<String>> {
        self.dict_frames.get(table_id).map(|df| {
            df.get_columns()
                .iter()
                .map(|col| col.name().to_string())
                .collect()
        })
    }

    /// Registered table identifiers.
    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.dict_frames.keys().map(String::as_str)
    }
}

impl RowStore for FrameRowStore {
    fn select_all(&self, table_id: &str) -> Result<Vec<SpecRow>, String> {
        let df = self
            .dict_frames
            .get(table_id)
            .ok_or_else(|| format!("No frame registered for table: {table_id}"))?;
        derive_rows_from_dataframe(df)
    }
}

fn derive_dataframe_from_ipc_bytes(v_ipc_df: &[u8]) -> Result<DataFrame, String> {
    IpcReader::new(Cursor::new(v_ipc_df))
        .finish()
        .map_err(|err| format!("Failed to read IPC DataFrame bytes: {err}"))
}

fn derive_rows_from_dataframe(df: &DataFrame) -> Result<Vec<SpecRow>, String> {
    let l_cols = df.get_columns();
    let mut l_rows = Vec::with_capacity(df.height());
    for n_idx_row in 0..df.height() {
        let mut row = SpecRow::with_capacity(l_cols.len());
        for col in l_cols {
            let value = col
                .get(n_idx_row)
                .map_err(|err| format!("Failed to read cell value: {err}"))?;
            row.insert(col.name().to_string(), derive_raw_text_from_any_value(value));
        }
        l_rows.push(row);
    }
    Ok(l_rows)
}

/// Stored-text form of a frame value; nulls become `""`.
fn derive_raw_text_from_any_value(value: AnyValue<'_>) -> String {
    match value {
        AnyValue::Null => String::new(),
        AnyValue::String(val) => val.to_string(),
        AnyValue::StringOwned(val) => val.to_string(),
        AnyValue::Boolean(val) => if val { "1" } else { "0" }.to_string(),
        AnyValue::Float32(val) => (val as f64).to_string(),
        AnyValue::Float64(val) => val.to_string(),
        _ => value.to_string(),
    }
}
