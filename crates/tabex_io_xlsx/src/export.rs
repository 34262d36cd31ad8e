//! Export pipeline: metadata, rows, sheet, workbook.

use tracing::info;

use crate::cell::CellTransformer;
use crate::meta::resolve_table_schema;
use crate::provider::{
    ChoiceResolver, EntityLookup, MediaUrlResolver, RelationResolver, RowStore, SchemaProvider,
};
use crate::rows::fetch_all;
use crate::sheet::build_sheet_document;
use crate::spec::{ExportError, SpecExportOptions, SpecExportReport};
use crate::writer::{ExportResponse, XlsxEmitter};

/// Collaborators consumed by one export.
#[derive(Clone, Copy)]
pub struct SpecExportContext<'a> {
    pub schema_provider: &'a dyn SchemaProvider,
    pub choice_resolver: &'a dyn ChoiceResolver,
    pub relation_resolver: &'a dyn RelationResolver,
    pub row_store: &'a dyn RowStore,
    pub media_url_resolver: &'a dyn MediaUrlResolver,
    pub entity_lookup: &'a dyn EntityLookup,
}

/// Export result.
#[derive(Debug, Clone)]
pub struct ExportOutcome {
    /// Finished attachment; `None` when the table was empty and
    /// `if_emit_empty_dataset` is off.
    pub response: Option<ExportResponse>,
    /// The table had no rows; hosts show their "no data" notice.
    pub if_dataset_empty: bool,
    /// Counters and soft misses.
    pub report: SpecExportReport,
}

/// Export `table_id` stamped with the current unix time.
pub fn export_table(
    ctx: &SpecExportContext<'_>,
    table_id: &str,
    options: &SpecExportOptions,
) -> Result<ExportOutcome, ExportError> {
    export_table_at(ctx, table_id, options, chrono::Utc::now().timestamp())
}

/// Export `table_id` with an explicit filename timestamp.
///
/// Any fatal error aborts before bytes are produced.
pub fn export_table_at(
    ctx: &SpecExportContext<'_>,
    table_id: &str,
    options: &SpecExportOptions,
    timestamp: i64,
) -> Result<ExportOutcome, ExportError> {
    let schema = resolve_table_schema(
        ctx.schema_provider,
        ctx.choice_resolver,
        ctx.relation_resolver,
        table_id,
    )?;
    let dataset = fetch_all(ctx.row_store, table_id)?;
    info!(
        table = table_id,
        n_rows = dataset.len(),
        n_cols = schema.width(),
        "export started"
    );

    let transformer =
        CellTransformer::new(&schema, ctx.media_url_resolver, ctx.entity_lookup, options);
    let built = build_sheet_document(&transformer, &dataset, &options.policy_autofit)?;

    if built.if_dataset_empty && !options.if_emit_empty_dataset {
        info!(table = table_id, "table empty, no workbook emitted");
        return Ok(ExportOutcome {
            response: None,
            if_dataset_empty: true,
            report: built.report,
        });
    }

    let response =
        XlsxEmitter::new(options).emit_response(&built.document, table_id, timestamp)?;
    info!(
        table = table_id,
        filename = %response.filename,
        n_bytes = response.bytes.len(),
        "{}",
        built.report
    );

    Ok(ExportOutcome {
        response: Some(response),
        if_dataset_empty: built.if_dataset_empty,
        report: built.report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::SpecCatalog;
    use crate::provider::{NoEntityLookup, PrefixMediaUrlResolver};

    const C_CATALOG: &str = r#"{
        "tables": {
            "rex_news": {
                "columns": ["id", "title", "status", "image"],
                "fields": [
                    {"name": "title", "type_name": "text", "label": "Title"},
                    {"name": "status", "type_name": "choice", "label": "Status",
                     "elements": {"choices": "Draft=d,Online=o"}},
                    {"name": "image", "type_name": "be_media", "label": "Image"}
                ],
                "rows": [
                    {"id": "1", "title": "Hello", "status": "o", "image": "a.jpg"},
                    {"id": "2", "title": "World", "status": "z", "image": ""}
                ]
            },
            "rex_empty": {
                "columns": ["id"],
                "rows": []
            },
            "rex_broken": {
                "columns": ["id"],
                "storage_error": "connection refused"
            }
        }
    }"#;

    fn catalog() -> SpecCatalog {
        serde_json::from_str(C_CATALOG).expect("catalog")
    }

    fn run(table_id: &str, options: &SpecExportOptions) -> Result<ExportOutcome, ExportError> {
        run_with(&catalog(), table_id, options)
    }

    fn run_with(
        catalog: &SpecCatalog,
        table_id: &str,
        options: &SpecExportOptions,
    ) -> Result<ExportOutcome, ExportError> {
        let media = PrefixMediaUrlResolver::new(&options.media_base_url);
        let ctx = SpecExportContext {
            schema_provider: catalog,
            choice_resolver: catalog,
            relation_resolver: catalog,
            row_store: catalog,
            media_url_resolver: &media,
            entity_lookup: &NoEntityLookup,
        };
        export_table_at(&ctx, table_id, options, 1_700_000_000)
    }

    #[test]
    fn export_table_produces_named_workbook_and_report() {
        let outcome = run("rex_news", &SpecExportOptions::default()).expect("export");
        assert!(!outcome.if_dataset_empty);

        let response = outcome.response.expect("response");
        assert_eq!(response.filename, "1700000000_rex_news.xlsx");
        assert!(response.bytes.starts_with(b"PK"));

        assert_eq!(outcome.report.cnt_rows, 2);
        assert_eq!(outcome.report.cnt_hyperlinks, 1);
        assert_eq!(outcome.report.unresolved.len(), 1);
        assert_eq!(outcome.report.unresolved[0].raw_value, "z");
    }

    #[test]
    fn export_overlong_text_is_truncated_not_fatal() {
        let mut catalog = catalog();
        catalog.tables.get_mut("rex_news").expect("table").rows[0]
            .insert("title".to_string(), "a".repeat(40_000));

        let outcome =
            run_with(&catalog, "rex_news", &SpecExportOptions::default()).expect("export");
        assert!(outcome.response.is_some());
        assert_eq!(outcome.report.warnings.len(), 1);
    }

    #[test]
    fn export_relative_media_base_writes_plain_text() {
        let options = SpecExportOptions {
            media_base_url: "/media".to_string(),
            ..Default::default()
        };
        let outcome = run("rex_news", &options).expect("export");
        assert!(outcome.response.is_some());
        assert_eq!(outcome.report.cnt_hyperlinks, 0);
        assert_eq!(outcome.report.warnings.len(), 1);
    }

    #[test]
    fn export_empty_table_signals_without_document() {
        let outcome = run("rex_empty", &SpecExportOptions::default()).expect("export");
        assert!(outcome.if_dataset_empty);
        assert!(outcome.response.is_none());
        assert_eq!(outcome.report.cnt_rows, 0);
    }

    #[test]
    fn export_empty_table_can_emit_title_only_workbook() {
        let options = SpecExportOptions {
            if_emit_empty_dataset: true,
            ..Default::default()
        };
        let outcome = run("rex_empty", &options).expect("export");
        assert!(outcome.if_dataset_empty);
        assert!(outcome.response.is_some());
    }

    #[test]
    fn export_storage_failure_aborts() {
        let err = run("rex_broken", &SpecExportOptions::default()).expect_err("failure");
        assert!(matches!(err, ExportError::StorageUnavailable { .. }));
    }

    #[test]
    fn export_unknown_table_is_schema_not_found() {
        let err = run("rex_missing", &SpecExportOptions::default()).expect_err("missing");
        assert!(matches!(err, ExportError::SchemaNotFound(_)));
    }

    #[test]
    fn export_is_idempotent_for_unchanged_inputs() {
        let options = SpecExportOptions::default();
        let first = run("rex_news", &options).expect("first");
        let second = run("rex_news", &options).expect("second");
        assert_eq!(first.report, second.report);
        assert_eq!(
            first.response.map(|r| r.filename),
            second.response.map(|r| r.filename)
        );
    }
}
