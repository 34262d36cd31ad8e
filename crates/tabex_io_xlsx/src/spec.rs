//! Shared export specification models, options, report and errors.

use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::conf::{
    C_NUM_FORMAT_DATE, C_NUM_FORMAT_DATETIME, EnumFmtKey, derive_default_xlsx_formats,
};

////////////////////////////////////////////////////////////////////////////////
// #region CellFormatSpecification

/// Cell format specification applied by the document emitter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecCellFormat {
    /// Font family name.
    pub font_name: Option<String>,
    /// Font size in points.
    pub font_size: Option<i64>,
    /// Bold style.
    pub bold: Option<bool>,
    /// Italic style.
    pub italic: Option<bool>,

    /// Horizontal alignment.
    pub align: Option<String>,
    /// Vertical alignment.
    pub valign: Option<String>,
    /// Text wrap.
    pub text_wrap: Option<bool>,

    /// Number format code.
    pub num_format: Option<String>,
    /// Background fill color.
    pub bg_color: Option<String>,
    /// Font color.
    pub font_color: Option<String>,
}

impl SpecCellFormat {
    /// Return a new format by overlaying `patch` onto `self`.
    pub fn with_(&self, patch: SpecCellFormat) -> SpecCellFormat {
        self.merge(&patch)
    }

    /// Merge two formats with right-side non-`None` overwrite semantics.
    pub fn merge(&self, other: &SpecCellFormat) -> SpecCellFormat {
        SpecCellFormat {
            font_name: other.font_name.clone().or_else(|| self.font_name.clone()),
            font_size: other.font_size.or(self.font_size),
            bold: other.bold.or(self.bold),
            italic: other.italic.or(self.italic),
            align: other.align.clone().or_else(|| self.align.clone()),
            valign: other.valign.clone().or_else(|| self.valign.clone()),
            text_wrap: other.text_wrap.or(self.text_wrap),
            num_format: other.num_format.clone().or_else(|| self.num_format.clone()),
            bg_color: other.bg_color.clone().or_else(|| self.bg_color.clone()),
            font_color: other.font_color.clone().or_else(|| self.font_color.clone()),
        }
    }
}

/// Normalized scalar cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumCellValue {
    /// Missing/blank value.
    None,
    /// Text value.
    String(String),
    /// Numeric value.
    Number(f64),
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SchemaSpecification

/// Value-field definition as exposed by the upstream field catalog.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecFieldDefinition {
    /// Storage column name.
    pub name: String,
    /// Field type name (`choice`, `date`, `be_manager_relation`, ...).
    pub type_name: String,
    /// Display label.
    pub label: String,
    /// Type-specific configuration elements.
    pub elements: BTreeMap<String, String>,
}

impl SpecFieldDefinition {
    /// Create a definition without elements.
    pub fn new(
        name: impl Into<String>,
        type_name: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            label: label.into(),
            elements: BTreeMap::new(),
        }
    }

    /// Builder-style element insert.
    pub fn with_element(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.elements.insert(key.into(), value.into());
        self
    }

    /// Non-empty element value.
    pub fn element(&self, key: &str) -> Option<&str> {
        self.elements
            .get(key)
            .map(String::as_str)
            .filter(|val| !val.trim().is_empty())
    }
}

/// Content item returned by an [`crate::provider::EntityLookup`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecEntity {
    /// Display name.
    pub name: String,
    /// Server-relative URL.
    pub url: String,
}

/// Semantic column type resolved once per export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumColumnKind {
    /// Written as a passthrough scalar.
    Plain,
    /// Calendar date, written as day-serial with a date format.
    Date,
    /// Date and time, written as day-serial with a date-time format.
    DateTime,
    /// Choice code to label.
    Choice(BTreeMap<String, String>),
    /// Checkbox code to label.
    Checkbox(BTreeMap<String, String>),
    /// Foreign id to label.
    Relation(BTreeMap<String, String>),
    /// Single media file, written as hyperlink.
    FileRef,
    /// Comma-separated media files, written as wrapped URL list.
    FileRefList,
    /// Content item id, written as hyperlink to the item.
    EntityLink,
}

impl EnumColumnKind {
    /// Short tag used in logs and reports.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::Choice(_) => "choice",
            Self::Checkbox(_) => "checkbox",
            Self::Relation(_) => "relation",
            Self::FileRef => "file_ref",
            Self::FileRefList => "file_ref_list",
            Self::EntityLink => "entity_link",
        }
    }
}

/// One column of a [`SpecTableSchema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecColumn {
    /// Storage column name.
    pub name: String,
    /// Header label.
    pub label: String,
    /// Semantic type with resolution payload.
    pub kind: EnumColumnKind,
}

impl SpecColumn {
    /// Plain column labelled by its own name.
    pub fn plain(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            kind: EnumColumnKind::Plain,
        }
    }
}

/// Immutable per-export table schema; column position is the per-column key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecTableSchema {
    /// Table identifier.
    pub table_id: String,
    /// Columns in storage order.
    pub columns: Vec<SpecColumn>,
}

impl SpecTableSchema {
    /// Column at zero-based position.
    pub fn column(&self, col_idx: usize) -> Option<&SpecColumn> {
        self.columns.get(col_idx)
    }

    /// First column carrying `name`.
    pub fn column_by_name(&self, name: &str) -> Option<&SpecColumn> {
        self.columns.iter().find(|col| col.name == name)
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.columns.len()
    }
}

/// One stored row: ordered column name to raw value, `""` meaning no value.
pub type SpecRow = IndexMap<String, String>;

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CellWriteSpecification

/// Typed write instruction produced by the cell transformer.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumCellWrite {
    /// Empty cell.
    Blank,
    /// Passthrough or resolved text.
    Text(String),
    /// Passthrough number.
    Number(f64),
    /// Day-serial with display format.
    DateSerial {
        /// Excel 1900-system serial.
        serial: f64,
        /// Number format code.
        num_format: String,
    },
    /// Hyperlinked text.
    Hyperlink {
        /// Absolute target URL.
        url: String,
        /// Display text.
        text: String,
    },
    /// Multi-line text with wrapping enabled.
    WrappedText(String),
}

/// One cell of a [`crate::sheet::SheetDocument`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecSheetCell {
    /// Scalar value.
    pub value: Option<EnumCellValue>,
    /// Number format code.
    pub num_format: Option<String>,
    /// Hyperlink target.
    pub hyperlink: Option<String>,
    /// Text wrap flag.
    pub if_text_wrap: bool,
}

impl SpecSheetCell {
    /// Plain text cell.
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            value: Some(EnumCellValue::String(value.into())),
            ..Default::default()
        }
    }

    /// Whether the cell carries no value.
    pub fn is_blank(&self) -> bool {
        matches!(self.value, None | Some(EnumCellValue::None))
    }
}

impl From<EnumCellWrite> for SpecSheetCell {
    fn from(write: EnumCellWrite) -> Self {
        match write {
            EnumCellWrite::Blank => Self::default(),
            EnumCellWrite::Text(val) => Self::text(val),
            EnumCellWrite::Number(val) => Self {
                value: Some(EnumCellValue::Number(val)),
                ..Default::default()
            },
            EnumCellWrite::DateSerial { serial, num_format } => Self {
                value: Some(EnumCellValue::Number(serial)),
                num_format: Some(num_format),
                ..Default::default()
            },
            EnumCellWrite::Hyperlink { url, text } => Self {
                value: Some(EnumCellValue::String(text)),
                hyperlink: Some(url),
                ..Default::default()
            },
            EnumCellWrite::WrappedText(val) => Self {
                value: Some(EnumCellValue::String(val)),
                if_text_wrap: true,
                ..Default::default()
            },
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ExportOptions

/// Autofit rule for column width inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumAutofitColumnsRule {
    /// Disable autofit.
    None,
    /// Infer width from header cells only.
    Header,
    /// Infer width from body cells only.
    Body,
    /// Infer width from both header and body cells (default).
    #[default]
    All,
}

/// Autofit policy for column widths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecAutofitCellsPolicy {
    /// Autofit width inference rule.
    pub rule_columns: EnumAutofitColumnsRule,
    /// Max body rows inspected when body-based inference is active.
    pub height_body_inferred_max: Option<usize>,
    /// Minimum final width.
    pub width_cell_min: usize,
    /// Maximum final width.
    pub width_cell_max: usize,
    /// Width padding added after inference.
    pub width_cell_padding: usize,
}

impl Default for SpecAutofitCellsPolicy {
    fn default() -> Self {
        Self {
            rule_columns: EnumAutofitColumnsRule::All,
            height_body_inferred_max: Some(20_000),
            width_cell_min: 8,
            width_cell_max: 60,
            width_cell_padding: 2,
        }
    }
}

/// Export-wide options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecExportOptions {
    /// Absolute server URL prefixed to content item URLs.
    pub url_server: String,
    /// Base URL of the media folder; file names are appended after `/`.
    pub media_base_url: String,
    /// Header row format.
    pub fmt_header: SpecCellFormat,
    /// Body cell base format.
    pub fmt_text: SpecCellFormat,
    /// Number format for `Date` columns.
    pub num_format_date: String,
    /// Number format for `DateTime` columns.
    pub num_format_datetime: String,
    /// Line separator between URLs in file list cells.
    pub list_separator: String,
    /// Column autofit policy.
    pub policy_autofit: SpecAutofitCellsPolicy,
    /// Emit a (title-only) workbook when the table has no rows.
    pub if_emit_empty_dataset: bool,
}

impl Default for SpecExportOptions {
    fn default() -> Self {
        let dict_fmt = derive_default_xlsx_formats();
        Self {
            url_server: "http://localhost/".to_string(),
            media_base_url: "http://localhost/media".to_string(),
            fmt_header: dict_fmt
                .get(EnumFmtKey::Header.as_str())
                .cloned()
                .unwrap_or_default(),
            fmt_text: dict_fmt
                .get(EnumFmtKey::Text.as_str())
                .cloned()
                .unwrap_or_default(),
            num_format_date: C_NUM_FORMAT_DATE.to_string(),
            num_format_datetime: C_NUM_FORMAT_DATETIME.to_string(),
            list_separator: "\n".to_string(),
            policy_autofit: SpecAutofitCellsPolicy::default(),
            if_emit_empty_dataset: false,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ReportSpecification

/// Kind of soft resolution miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumUnresolvedKind {
    /// Choice code without label.
    Choice,
    /// Checkbox code without label.
    Checkbox,
    /// Relation id without label.
    Relation,
    /// Content item id not found.
    Entity,
    /// Date value that could not be parsed.
    Date,
}

impl fmt::Display for EnumUnresolvedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c_kind = match self {
            Self::Choice => "choice",
            Self::Checkbox => "checkbox",
            Self::Relation => "relation",
            Self::Entity => "entity",
            Self::Date => "date",
        };
        write!(f, "{c_kind}")
    }
}

/// One recovered per-cell miss; the raw value was written instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpecUnresolvedReference {
    /// Zero-based body row index.
    pub row_idx: usize,
    /// Zero-based column index.
    pub col_idx: usize,
    /// Column name.
    pub column_name: String,
    /// Raw stored value written to the cell.
    pub raw_value: String,
    /// Miss kind.
    pub kind: EnumUnresolvedKind,
}

/// Per-export counters and non-fatal diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SpecExportReport {
    /// Body rows written.
    pub cnt_rows: u64,
    /// Body cells written (blank cells included).
    pub cnt_cells: u64,
    /// Hyperlink cells written.
    pub cnt_hyperlinks: u64,
    /// Values written raw because no label/target was found.
    pub unresolved: Vec<SpecUnresolvedReference>,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
}

impl SpecExportReport {
    /// Add a warning message.
    pub fn warn(&mut self, msg: impl AsRef<str>) {
        self.warnings.push(msg.as_ref().to_string());
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        format!(
            "{prefix} rows={} cells={} hyperlinks={} unresolved={} warnings={}",
            self.cnt_rows,
            self.cnt_cells,
            self.cnt_hyperlinks,
            self.unresolved.len(),
            self.warnings.len()
        )
    }
}

impl fmt::Display for SpecExportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[EXPORT]"))
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Fatal export failures; per-cell misses are never reported here.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Requested table has no metadata.
    #[error("Table not found: {0}")]
    SchemaNotFound(String),
    /// Row fetch failed at the data layer.
    #[error("Storage unavailable for table {table}: {message}")]
    StorageUnavailable {
        /// Table identifier.
        table: String,
        /// Underlying store error text.
        message: String,
    },
    /// Workbook serialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),
    /// Dataset does not fit into one worksheet.
    #[error("Sheet limit exceeded: {0}")]
    SheetLimitExceeded(String),
    /// Options failed validation.
    #[error("Invalid options: {0}")]
    InvalidOptions(String),
    /// Writing the finished document to its sink failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
