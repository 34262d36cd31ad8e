//! Serde-loadable in-memory catalog implementing every collaborator trait.
//!
//! Used by the CLI and by tests; a host application normally implements the
//! traits in [`crate::provider`] against its own database instead.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::provider::{
    ChoiceResolver, EntityLookup, RelationResolver, RowStore, SchemaProvider, SpecChoiceContext,
};
use crate::spec::{SpecEntity, SpecFieldDefinition, SpecRow};

/// Column holding the primary key in related tables.
const C_COLUMN_ID: &str = "id";

/// One table of a [`SpecCatalog`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecCatalogTable {
    /// Storage columns in storage order.
    pub columns: Vec<String>,
    /// Value-field definitions.
    pub fields: Vec<SpecFieldDefinition>,
    /// Stored rows.
    pub rows: Vec<SpecRow>,
    /// When set, row access fails with this message.
    pub storage_error: Option<String>,
}

/// Whole catalog: tables plus content items for link columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecCatalog {
    pub tables: BTreeMap<String, SpecCatalogTable>,
    pub entities: BTreeMap<String, SpecEntity>,
}

impl SpecCatalog {
    /// Parse a catalog from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, String> {
        serde_json::from_str(text).map_err(|e| format!("Invalid catalog: {e}"))
    }

    /// Table by identifier.
    pub fn table(&self, table_id: &str) -> Option<&SpecCatalogTable> {
        self.tables.get(table_id)
    }
}

impl SchemaProvider for SpecCatalog {
    fn get_columns(&self, table_id: &str) -> Option<Vec<String>> {
        self.table(table_id).map(|table| table.columns.clone())
    }

    fn get_fields(&self, table_id: &str) -> Vec<SpecFieldDefinition> {
        self.table(table_id)
            .map(|table| table.fields.clone())
            .unwrap_or_default()
    }
}

impl ChoiceResolver for SpecCatalog {
    fn resolve(
        &self,
        _column_name: &str,
        choices: &str,
        _context: SpecChoiceContext<'_>,
    ) -> BTreeMap<String, String> {
        parse_choice_list(choices)
    }
}

impl RelationResolver for SpecCatalog {
    fn resolve(&self, related_table: &str, related_field: &str) -> BTreeMap<String, String> {
        let Some(table) = self.table(related_table) else {
            return BTreeMap::new();
        };
        let l_fields: Vec<&str> = related_field
            .split(',')
            .map(str::trim)
            .filter(|c_field| !c_field.is_empty())
            .collect();

        table
            .rows
            .iter()
            .filter_map(|row| {
                let c_id = row.get(C_COLUMN_ID)?;
                let c_label = l_fields
                    .iter()
                    .filter_map(|c_field| row.get(*c_field))
                    .filter(|c_value| !c_value.is_empty())
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(" ");
                Some((c_id.clone(), c_label))
            })
            .collect()
    }
}

impl RowStore for SpecCatalog {
    fn select_all(&self, table_id: &str) -> Result<Vec<SpecRow>, String> {
        let table = self
            .table(table_id)
            .ok_or_else(|| format!("Unknown table: {table_id}"))?;
        match &table.storage_error {
            Some(message) => Err(message.clone()),
            None => Ok(table.rows.clone()),
        }
    }
}

impl EntityLookup for SpecCatalog {
    fn get(&self, id: &str) -> Option<SpecEntity> {
        self.entities.get(id).cloned()
    }
}

/// Parse a choice list into `code -> label`.
///
/// Accepts a JSON object `{"Label": "code"}` or comma-separated
/// `Label=code` items; an item without `=` is its own code.
pub fn parse_choice_list(choices: &str) -> BTreeMap<String, String> {
    let c_choices = choices.trim();
    if c_choices.starts_with('{')
        && let Ok(dict_by_label) = serde_json::from_str::<IndexMap<String, String>>(c_choices)
    {
        return dict_by_label
            .into_iter()
            .map(|(c_label, c_code)| (c_code, c_label))
            .collect();
    }

    c_choices
        .split(',')
        .map(str::trim)
        .filter(|c_item| !c_item.is_empty())
        .map(|c_item| match c_item.split_once('=') {
            Some((c_label, c_code)) => (c_code.trim().to_string(), c_label.trim().to_string()),
            None => (c_item.to_string(), c_item.to_string()),
        })
        .collect()
}
