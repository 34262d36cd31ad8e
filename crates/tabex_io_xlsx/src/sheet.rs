//! Sheet builder: schema + dataset into an in-memory [`SheetDocument`].

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::cell::CellTransformer;
use crate::conf::{N_LEN_EXCEL_CELL_TEXT_MAX, N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX};
use crate::spec::{
    EnumAutofitColumnsRule, EnumCellValue, ExportError, SpecAutofitCellsPolicy,
    SpecExportReport, SpecRow, SpecSheetCell, SpecUnresolvedReference,
};
use crate::util::{estimate_cell_width, sanitize_sheet_name};

/// In-memory worksheet owned by one export run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SheetDocument {
    /// Worksheet name.
    pub title: String,
    /// Row-major cell grid; row 0 is the header when `n_rows_header == 1`.
    pub rows: Vec<Vec<SpecSheetCell>>,
    /// Number of header rows at the top of `rows`.
    pub n_rows_header: usize,
    /// Rows kept visible on scroll.
    pub row_freeze: Option<usize>,
    /// Final column widths from content-driven autofit; empty when disabled.
    pub widths_by_col: Vec<f64>,
}

impl SheetDocument {
    /// Title-only document.
    pub fn empty(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Cell at zero-based grid position.
    pub fn cell(&self, row_idx: usize, col_idx: usize) -> Option<&SpecSheetCell> {
        self.rows.get(row_idx).and_then(|row| row.get(col_idx))
    }

    /// Header labels.
    pub fn header(&self) -> Vec<String> {
        if self.n_rows_header == 0 {
            return vec![];
        }
        self.rows
            .first()
            .map(|row| {
                row.iter()
                    .map(|cell| match &cell.value {
                        Some(EnumCellValue::String(s)) => s.clone(),
                        _ => String::new(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of body rows.
    pub fn height_body(&self) -> usize {
        self.rows.len().saturating_sub(self.n_rows_header)
    }

    /// Widest row length.
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}

/// Sheet builder output.
#[derive(Debug, Clone)]
pub struct SheetBuildResult {
    /// Built document.
    pub document: SheetDocument,
    /// Raised when the dataset had no rows; the document then only has a title.
    pub if_dataset_empty: bool,
    /// Counters and soft misses.
    pub report: SpecExportReport,
}

/// Build the worksheet for `dataset` rendered through `transformer`.
///
/// Header labels follow the first row's key order; keys without a schema
/// column keep their raw name. Body cells are rendered by column position.
pub fn build_sheet_document(
    transformer: &CellTransformer<'_>,
    dataset: &[SpecRow],
    policy_autofit: &SpecAutofitCellsPolicy,
) -> Result<SheetBuildResult, ExportError> {
    validate_policy_autofit(policy_autofit)?;

    let schema = transformer.schema();
    let c_title = sanitize_sheet_name(&schema.table_id);
    let mut report = SpecExportReport::default();

    let Some(row_first) = dataset.first() else {
        debug!(table = %schema.table_id, "dataset empty, title-only document");
        return Ok(SheetBuildResult {
            document: SheetDocument::empty(c_title),
            if_dataset_empty: true,
            report,
        });
    };

    let n_width = dataset.iter().map(|row| row.len()).max().unwrap_or(0);
    validate_sheet_limits(dataset.len(), n_width)?;

    let l_header: Vec<SpecSheetCell> = row_first
        .keys()
        .enumerate()
        .map(|(n_idx_col, c_key)| {
            let c_label = schema
                .column_by_name(c_key)
                .map_or(c_key.as_str(), |col| col.label.as_str());
            let mut cell = SpecSheetCell::text(c_label);
            truncate_cell_text(&mut cell, 0, n_idx_col, &mut report);
            cell
        })
        .collect();

    let mut l_width_by_col_header = vec![0usize; n_width];
    let mut l_width_by_col_body = vec![0usize; n_width];
    for (n_idx_col, cell) in l_header.iter().enumerate() {
        l_width_by_col_header[n_idx_col] = estimate_cell_width(cell);
    }

    let n_rows_inferred_max = policy_autofit.height_body_inferred_max.unwrap_or(usize::MAX);
    let mut set_cols_mismatch_warned = BTreeSet::new();
    let mut l_rows = Vec::with_capacity(dataset.len() + 1);
    l_rows.push(l_header);

    for (n_idx_row, row) in dataset.iter().enumerate() {
        let mut l_cells = Vec::with_capacity(row.len());
        for (n_idx_col, (c_key, c_value)) in row.iter().enumerate() {
            if let Some(column) = schema.column(n_idx_col)
                && column.name != *c_key
                && set_cols_mismatch_warned.insert(n_idx_col)
            {
                warn!(
                    column = n_idx_col,
                    expected = %column.name,
                    found = %c_key,
                    "row key order differs from schema order"
                );
                report.warn(format!(
                    "Column {n_idx_col}: row key {c_key:?} differs from schema column {:?}.",
                    column.name
                ));
            }

            let render = transformer.render(n_idx_col, c_key, c_value);
            if let Some(kind) = render.unresolved {
                report.unresolved.push(SpecUnresolvedReference {
                    row_idx: n_idx_row,
                    col_idx: n_idx_col,
                    column_name: c_key.clone(),
                    raw_value: c_value.clone(),
                    kind,
                });
            }

            if let Some(c_warning) = render.warning {
                report.warn(format!("Row {n_idx_row}, column {c_key:?}: {c_warning}"));
            }

            let mut cell = SpecSheetCell::from(render.write);
            truncate_cell_text(&mut cell, n_idx_row + 1, n_idx_col, &mut report);
            if cell.hyperlink.is_some() {
                report.cnt_hyperlinks += 1;
            }
            if n_idx_row < n_rows_inferred_max {
                l_width_by_col_body[n_idx_col] =
                    usize::max(l_width_by_col_body[n_idx_col], estimate_cell_width(&cell));
            }
            l_cells.push(cell);
        }
        report.cnt_cells += l_cells.len() as u64;
        report.cnt_rows += 1;
        l_rows.push(l_cells);
    }

    let widths_by_col =
        derive_column_widths(&l_width_by_col_header, &l_width_by_col_body, policy_autofit);

    Ok(SheetBuildResult {
        document: SheetDocument {
            title: c_title,
            rows: l_rows,
            n_rows_header: 1,
            row_freeze: Some(1),
            widths_by_col,
        },
        if_dataset_empty: false,
        report,
    })
}

/// Apply the autofit rule, padding and bounds to recorded widths.
pub fn derive_column_widths(
    widths_header: &[usize],
    widths_body: &[usize],
    policy_autofit: &SpecAutofitCellsPolicy,
) -> Vec<f64> {
    if matches!(policy_autofit.rule_columns, EnumAutofitColumnsRule::None) {
        return vec![];
    }

    let n_min = usize::max(1, policy_autofit.width_cell_min);
    let n_max = usize::min(255, usize::max(n_min, policy_autofit.width_cell_max));
    let n_pad = policy_autofit.width_cell_padding;

    widths_header
        .iter()
        .zip(widths_body)
        .map(|(n_header, n_body)| {
            let n_width_recorded = match policy_autofit.rule_columns {
                EnumAutofitColumnsRule::Header => *n_header,
                EnumAutofitColumnsRule::Body => *n_body,
                EnumAutofitColumnsRule::All | EnumAutofitColumnsRule::None => {
                    usize::max(*n_header, *n_body)
                }
            };
            usize::min(n_max, usize::max(n_min, n_width_recorded + n_pad)) as f64
        })
        .collect()
}

/// Cut string values to the worksheet cell text limit.
fn truncate_cell_text(
    cell: &mut SpecSheetCell,
    row_idx: usize,
    col_idx: usize,
    report: &mut SpecExportReport,
) {
    let Some(EnumCellValue::String(val)) = &mut cell.value else {
        return;
    };
    let n_len = val.chars().count();
    if n_len <= N_LEN_EXCEL_CELL_TEXT_MAX {
        return;
    }

    *val = val.chars().take(N_LEN_EXCEL_CELL_TEXT_MAX).collect();
    warn!(
        row = row_idx,
        column = col_idx,
        n_len,
        "cell text too long, truncated"
    );
    report.warn(format!(
        "Cell ({row_idx}, {col_idx}): text of {n_len} chars truncated to {N_LEN_EXCEL_CELL_TEXT_MAX}."
    ));
}

fn validate_policy_autofit(policy_autofit: &SpecAutofitCellsPolicy) -> Result<(), ExportError> {
    if policy_autofit.width_cell_min == 0 {
        return Err(ExportError::InvalidOptions(
            "policy_autofit.width_cell_min must be >= 1.".to_string(),
        ));
    }
    if policy_autofit.width_cell_max < policy_autofit.width_cell_min {
        return Err(ExportError::InvalidOptions(
            "policy_autofit.width_cell_max must be >= policy_autofit.width_cell_min.".to_string(),
        ));
    }
    Ok(())
}

fn validate_sheet_limits(height_body: usize, width: usize) -> Result<(), ExportError> {
    if height_body + 1 > N_NROWS_EXCEL_MAX {
        return Err(ExportError::SheetLimitExceeded(format!(
            "{height_body} rows plus header exceed the worksheet limit of {N_NROWS_EXCEL_MAX}."
        )));
    }
    if width > N_NCOLS_EXCEL_MAX {
        return Err(ExportError::SheetLimitExceeded(format!(
            "{width} columns exceed the worksheet limit of {N_NCOLS_EXCEL_MAX}."
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::provider::{NoEntityLookup, PrefixMediaUrlResolver};
    use crate::spec::{
        EnumColumnKind, EnumUnresolvedKind, SpecColumn, SpecExportOptions, SpecTableSchema,
    };

    fn schema() -> SpecTableSchema {
        SpecTableSchema {
            table_id: "rex_yf_news".to_string(),
            columns: vec![
                SpecColumn::plain("id"),
                SpecColumn {
                    name: "status".to_string(),
                    label: "Status".to_string(),
                    kind: EnumColumnKind::Choice(BTreeMap::from([(
                        "o".to_string(),
                        "Online".to_string(),
                    )])),
                },
                SpecColumn {
                    name: "image".to_string(),
                    label: "Image".to_string(),
                    kind: EnumColumnKind::FileRef,
                },
            ],
        }
    }

    fn row(l_pairs: &[(&str, &str)]) -> SpecRow {
        l_pairs
            .iter()
            .map(|(c_key, c_value)| (c_key.to_string(), c_value.to_string()))
            .collect()
    }

    fn build(dataset: &[SpecRow]) -> SheetBuildResult {
        let schema = schema();
        let media = PrefixMediaUrlResolver::new("https://example.org/media");
        let options = SpecExportOptions::default();
        let transformer = CellTransformer::new(&schema, &media, &NoEntityLookup, &options);
        build_sheet_document(&transformer, dataset, &options.policy_autofit).expect("build")
    }

    #[test]
    fn build_writes_header_labels_body_and_freeze() {
        let result = build(&[
            row(&[("id", "1"), ("status", "o"), ("image", "a.jpg")]),
            row(&[("id", "2"), ("status", "x"), ("image", "")]),
        ]);
        let doc = &result.document;

        assert!(!result.if_dataset_empty);
        assert_eq!(doc.title, "rexyfnews");
        assert_eq!(doc.header(), vec!["id", "Status", "Image"]);
        assert_eq!(doc.height_body(), 2);
        assert_eq!(doc.width(), 3);
        assert_eq!(doc.row_freeze, Some(1));

        assert_eq!(
            doc.cell(1, 1).and_then(|cell| cell.value.clone()),
            Some(EnumCellValue::String("Online".to_string()))
        );
        assert_eq!(
            doc.cell(1, 2).and_then(|cell| cell.hyperlink.clone()),
            Some("https://example.org/media/a.jpg".to_string())
        );
        assert_eq!(
            doc.cell(2, 1).and_then(|cell| cell.value.clone()),
            Some(EnumCellValue::String("x".to_string()))
        );
        assert!(doc.cell(2, 2).is_some_and(SpecSheetCell::is_blank));

        assert_eq!(result.report.cnt_rows, 2);
        assert_eq!(result.report.cnt_cells, 6);
        assert_eq!(result.report.cnt_hyperlinks, 1);
        assert_eq!(result.report.unresolved.len(), 1);
        assert_eq!(result.report.unresolved[0].kind, EnumUnresolvedKind::Choice);
        assert_eq!(result.report.unresolved[0].row_idx, 1);
    }

    #[test]
    fn build_empty_dataset_is_title_only_and_signalled() {
        let result = build(&[]);
        assert!(result.if_dataset_empty);
        assert_eq!(result.document.title, "rexyfnews");
        assert!(result.document.rows.is_empty());
        assert!(result.document.header().is_empty());
        assert_eq!(result.document.row_freeze, None);
    }

    #[test]
    fn build_header_falls_back_to_raw_key_and_extra_columns_pass_through() {
        let result = build(&[row(&[
            ("id", "1"),
            ("status", "o"),
            ("image", ""),
            ("updatedate", "2024-01-01"),
        ])]);
        assert_eq!(
            result.document.header(),
            vec!["id", "Status", "Image", "updatedate"]
        );
        assert_eq!(
            result.document.cell(1, 3).and_then(|cell| cell.value.clone()),
            Some(EnumCellValue::String("2024-01-01".to_string()))
        );
    }

    #[test]
    fn build_warns_once_per_mismatched_column() {
        let result = build(&[
            row(&[("id", "1"), ("image", "a.jpg"), ("status", "o")]),
            row(&[("id", "2"), ("image", "b.jpg"), ("status", "o")]),
        ]);
        assert_eq!(result.report.warnings.len(), 2);
    }

    #[test]
    fn build_truncates_overlong_text_and_warns() {
        let c_body = "a".repeat(40_000);
        let result = build(&[row(&[("id", c_body.as_str()), ("status", "o"), ("image", "")])]);

        let Some(EnumCellValue::String(val)) =
            result.document.cell(1, 0).and_then(|cell| cell.value.clone())
        else {
            panic!("expected text cell");
        };
        assert_eq!(val.chars().count(), N_LEN_EXCEL_CELL_TEXT_MAX);
        assert_eq!(result.report.warnings.len(), 1);
        assert!(result.report.warnings[0].contains("40000"));
    }

    #[test]
    fn build_records_degraded_link_warnings() {
        let schema = schema();
        let media = PrefixMediaUrlResolver::new("/media");
        let options = SpecExportOptions::default();
        let transformer = CellTransformer::new(&schema, &media, &NoEntityLookup, &options);
        let result = build_sheet_document(
            &transformer,
            &[row(&[("id", "1"), ("status", "o"), ("image", "a.jpg")])],
            &options.policy_autofit,
        )
        .expect("build");

        assert_eq!(result.report.cnt_hyperlinks, 0);
        assert_eq!(result.report.warnings.len(), 1);
        assert_eq!(
            result.document.cell(1, 2).and_then(|cell| cell.value.clone()),
            Some(EnumCellValue::String("a.jpg".to_string()))
        );
    }

    #[test]
    fn derive_column_widths_applies_rule_padding_and_bounds() {
        let policy = SpecAutofitCellsPolicy::default();
        assert_eq!(
            derive_column_widths(&[2, 10], &[100, 3], &policy),
            vec![60.0, 12.0]
        );

        let policy_header = SpecAutofitCellsPolicy {
            rule_columns: EnumAutofitColumnsRule::Header,
            ..Default::default()
        };
        assert_eq!(
            derive_column_widths(&[2, 10], &[100, 3], &policy_header),
            vec![8.0, 12.0]
        );

        let policy_none = SpecAutofitCellsPolicy {
            rule_columns: EnumAutofitColumnsRule::None,
            ..Default::default()
        };
        assert!(derive_column_widths(&[2], &[3], &policy_none).is_empty());
    }

    #[test]
    fn build_rejects_invalid_autofit_policy() {
        let schema = schema();
        let media = PrefixMediaUrlResolver::new("https://example.org/media");
        let options = SpecExportOptions::default();
        let transformer = CellTransformer::new(&schema, &media, &NoEntityLookup, &options);
        let policy = SpecAutofitCellsPolicy {
            width_cell_min: 0,
            ..Default::default()
        };
        let err = build_sheet_document(&transformer, &[], &policy).expect_err("invalid");
        assert!(matches!(err, ExportError::InvalidOptions(_)));
    }
}
