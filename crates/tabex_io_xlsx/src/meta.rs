//! Metadata resolution: storage columns and field catalog into a [`SpecTableSchema`].

use std::collections::BTreeMap;

use tracing::debug;

use crate::conf::{
    C_ELEMENT_CHOICES, C_ELEMENT_OUTPUT_VALUES, C_ELEMENT_RELATION_FIELD,
    C_ELEMENT_RELATION_TABLE, C_FIELD_TYPE_CHECKBOX, C_FIELD_TYPE_CHOICE, C_FIELD_TYPE_DATE,
    C_FIELD_TYPE_DATESTAMP, C_FIELD_TYPE_DATETIME, C_FIELD_TYPE_IMAGELIST, C_FIELD_TYPE_LINK,
    C_FIELD_TYPE_MEDIA, C_FIELD_TYPE_RELATION, C_FIELD_TYPE_TIME,
};
use crate::provider::{ChoiceResolver, RelationResolver, SchemaProvider, SpecChoiceContext};
use crate::spec::{
    EnumColumnKind, ExportError, SpecColumn, SpecFieldDefinition, SpecTableSchema,
};

/// Resolve the ordered, typed schema of `table_id`.
///
/// Relations are resolved first and win over any other classification of the
/// same column. Choice maps are resolved once per column. Columns without a
/// field definition are `Plain` and labelled by their storage name.
pub fn resolve_table_schema(
    schema_provider: &dyn SchemaProvider,
    choice_resolver: &dyn ChoiceResolver,
    relation_resolver: &dyn RelationResolver,
    table_id: &str,
) -> Result<SpecTableSchema, ExportError> {
    let l_colnames = schema_provider
        .get_columns(table_id)
        .ok_or_else(|| ExportError::SchemaNotFound(table_id.to_string()))?;

    let dict_relations = resolve_relation_maps(schema_provider, relation_resolver, table_id);
    let l_fields = schema_provider.get_fields(table_id);

    let mut l_columns = Vec::with_capacity(l_colnames.len());
    for c_colname in l_colnames {
        let Some(field) = schema_provider.get_field_metadata(table_id, &c_colname) else {
            debug!(table = table_id, column = %c_colname, "no field definition, plain column");
            l_columns.push(SpecColumn::plain(c_colname));
            continue;
        };

        let kind = match dict_relations.get(&c_colname) {
            Some(dict_labels) => EnumColumnKind::Relation(dict_labels.clone()),
            None => derive_column_kind(&field, choice_resolver, table_id, &l_fields),
        };
        debug!(table = table_id, column = %c_colname, kind = kind.tag(), "column resolved");

        l_columns.push(SpecColumn {
            label: if field.label.is_empty() {
                c_colname.clone()
            } else {
                field.label.clone()
            },
            name: c_colname,
            kind,
        });
    }

    Ok(SpecTableSchema {
        table_id: table_id.to_string(),
        columns: l_columns,
    })
}

fn resolve_relation_maps(
    schema_provider: &dyn SchemaProvider,
    relation_resolver: &dyn RelationResolver,
    table_id: &str,
) -> BTreeMap<String, BTreeMap<String, String>> {
    let mut dict_relations = BTreeMap::new();
    for field in schema_provider.get_fields_of_type(table_id, C_FIELD_TYPE_RELATION) {
        let c_table = field.element(C_ELEMENT_RELATION_TABLE).unwrap_or_default();
        let c_field = field.element(C_ELEMENT_RELATION_FIELD).unwrap_or_default();
        let dict_labels = relation_resolver.resolve(c_table, c_field);
        debug!(
            table = table_id,
            column = %field.name,
            related_table = c_table,
            n_labels = dict_labels.len(),
            "relation resolved"
        );
        dict_relations.insert(field.name, dict_labels);
    }
    dict_relations
}

fn derive_column_kind(
    field: &SpecFieldDefinition,
    choice_resolver: &dyn ChoiceResolver,
    table_id: &str,
    fields: &[SpecFieldDefinition],
) -> EnumColumnKind {
    match field.type_name.as_str() {
        C_FIELD_TYPE_DATE => EnumColumnKind::Date,
        C_FIELD_TYPE_DATETIME | C_FIELD_TYPE_DATESTAMP => EnumColumnKind::DateTime,
        C_FIELD_TYPE_CHOICE => EnumColumnKind::Choice(choice_resolver.resolve(
            &field.name,
            field.element(C_ELEMENT_CHOICES).unwrap_or_default(),
            SpecChoiceContext {
                table_id,
                field,
                fields,
            },
        )),
        C_FIELD_TYPE_CHECKBOX => {
            EnumColumnKind::Checkbox(derive_checkbox_labels(field.element(C_ELEMENT_OUTPUT_VALUES)))
        }
        C_FIELD_TYPE_MEDIA => EnumColumnKind::FileRef,
        C_FIELD_TYPE_IMAGELIST => EnumColumnKind::FileRefList,
        C_FIELD_TYPE_LINK => EnumColumnKind::EntityLink,
        C_FIELD_TYPE_TIME => EnumColumnKind::Plain,
        // unknown types are written unchanged
        _ => EnumColumnKind::Plain,
    }
}

/// Checkbox labels by stored position code (`"0"`, `"1"`, ...).
///
/// Without configured output values the codes label themselves.
pub fn derive_checkbox_labels(output_values: Option<&str>) -> BTreeMap<String, String> {
    match output_values {
        Some(c_values) => c_values
            .split(',')
            .enumerate()
            .map(|(n_idx, c_label)| (n_idx.to_string(), c_label.to_string()))
            .collect(),
        None => ["0", "1"]
            .into_iter()
            .map(|c_code| (c_code.to_string(), c_code.to_string()))
            .collect(),
    }
}
