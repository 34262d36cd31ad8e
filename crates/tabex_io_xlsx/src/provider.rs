//! Collaborator capabilities consumed by the export pipeline.
//!
//! The host application implements these traits on top of its own storage
//! and field catalog. [`crate::memory`] and [`crate::frame`] ship ready-made
//! implementations.

use std::collections::BTreeMap;

use crate::spec::{SpecEntity, SpecFieldDefinition, SpecRow};

/// Table and field metadata.
pub trait SchemaProvider: Send + Sync {
    /// Storage column names in storage order; `None` when the table is unknown.
    fn get_columns(&self, table_id: &str) -> Option<Vec<String>>;

    /// All value-field definitions of the table.
    fn get_fields(&self, table_id: &str) -> Vec<SpecFieldDefinition>;

    /// Value-field definitions with the given type name.
    fn get_fields_of_type(&self, table_id: &str, type_name: &str) -> Vec<SpecFieldDefinition> {
        self.get_fields(table_id)
            .into_iter()
            .filter(|field| field.type_name == type_name)
            .collect()
    }

    /// Value-field definition of one column, if any.
    fn get_field_metadata(&self, table_id: &str, column_name: &str) -> Option<SpecFieldDefinition> {
        self.get_fields(table_id)
            .into_iter()
            .find(|field| field.name == column_name)
    }
}

/// Field/table context handed to a [`ChoiceResolver`].
#[derive(Debug, Clone, Copy)]
pub struct SpecChoiceContext<'a> {
    /// Table identifier.
    pub table_id: &'a str,
    /// Field being resolved.
    pub field: &'a SpecFieldDefinition,
    /// All fields of the table.
    pub fields: &'a [SpecFieldDefinition],
}

/// Resolves a choice field's configured source into `code -> label`.
pub trait ChoiceResolver: Send + Sync {
    fn resolve(
        &self,
        column_name: &str,
        choices: &str,
        context: SpecChoiceContext<'_>,
    ) -> BTreeMap<String, String>;
}

/// Resolves a related table's display field into `id -> label`.
pub trait RelationResolver: Send + Sync {
    fn resolve(&self, related_table: &str, related_field: &str) -> BTreeMap<String, String>;
}

/// Full-table row access.
pub trait RowStore: Send + Sync {
    /// All rows of the table, or the store's error text on query failure.
    fn select_all(&self, table_id: &str) -> Result<Vec<SpecRow>, String>;
}

/// Builds absolute media URLs from stored file names.
pub trait MediaUrlResolver: Send + Sync {
    fn url_for(&self, filename: &str) -> String;
}

/// Looks up content items referenced by link columns.
pub trait EntityLookup: Send + Sync {
    fn get(&self, id: &str) -> Option<SpecEntity>;
}

/// [`MediaUrlResolver`] joining a base URL and the file name with one `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixMediaUrlResolver {
    media_base_url: String,
}

impl PrefixMediaUrlResolver {
    pub fn new(media_base_url: impl Into<String>) -> Self {
        Self {
            media_base_url: media_base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl MediaUrlResolver for PrefixMediaUrlResolver {
    fn url_for(&self, filename: &str) -> String {
        format!(
            "{}/{}",
            self.media_base_url,
            filename.trim().trim_start_matches('/')
        )
    }
}

/// [`EntityLookup`] that never finds anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEntityLookup;

impl EntityLookup for NoEntityLookup {
    fn get(&self, _id: &str) -> Option<SpecEntity> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FieldsOnly(Vec<SpecFieldDefinition>);

    impl SchemaProvider for FieldsOnly {
        fn get_columns(&self, _table_id: &str) -> Option<Vec<String>> {
            Some(self.0.iter().map(|field| field.name.clone()).collect())
        }

        fn get_fields(&self, _table_id: &str) -> Vec<SpecFieldDefinition> {
            self.0.clone()
        }
    }

    #[test]
    fn schema_provider_default_methods_filter_fields() {
        let provider = FieldsOnly(vec![
            SpecFieldDefinition::new("a", "choice", "A"),
            SpecFieldDefinition::new("b", "date", "B"),
            SpecFieldDefinition::new("c", "choice", "C"),
        ]);

        let l_names: Vec<String> = provider
            .get_fields_of_type("t", "choice")
            .into_iter()
            .map(|field| field.name)
            .collect();
        assert_eq!(l_names, vec!["a", "c"]);
        assert_eq!(
            provider.get_field_metadata("t", "b").map(|field| field.label),
            Some("B".to_string())
        );
        assert!(provider.get_field_metadata("t", "z").is_none());
    }

    #[test]
    fn prefix_media_url_resolver_joins_with_single_slash() {
        let resolver = PrefixMediaUrlResolver::new("https://example.org/media/");
        assert_eq!(
            resolver.url_for("a.jpg"),
            "https://example.org/media/a.jpg"
        );
        assert_eq!(
            resolver.url_for(" /b.jpg"),
            "https://example.org/media/b.jpg"
        );
    }
}
