//! Export constants and default preset factories.

use std::collections::BTreeMap;

use crate::spec::SpecCellFormat;

/// Excel worksheet maximum row count.
pub const N_NROWS_EXCEL_MAX: usize = 1_048_576;
/// Excel worksheet maximum column count.
pub const N_NCOLS_EXCEL_MAX: usize = 16_384;
/// Excel sheet name maximum length.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Excel cell text maximum length in chars.
pub const N_LEN_EXCEL_CELL_TEXT_MAX: usize = 32_767;
/// Excel hyperlink target maximum length.
pub const N_LEN_EXCEL_URL_MAX: usize = 2_080;
/// Largest integer digit count Excel keeps without precision loss.
pub const N_DIGITS_EXCEL_PRECISION_MAX: usize = 15;

/// Sheet name used when the sanitized table identifier is empty.
pub const C_SHEET_NAME_FALLBACK: &str = "Sheet";
/// MIME type of the emitted workbook.
pub const C_XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
/// File extension of the emitted workbook.
pub const C_XLSX_EXTENSION: &str = "xlsx";

/// Font color of hyperlink cells (Excel's default hyperlink theme color).
pub const C_COLOR_HYPERLINK: &str = "#0563C1";
/// Link target prefixes a worksheet hyperlink accepts.
pub const C_URL_SCHEMES: &[&str] = &["http://", "https://", "ftp://", "ftps://", "mailto:"];

/// Number format for date-only columns.
pub const C_NUM_FORMAT_DATE: &str = "dd/mm/yyyy";
/// Number format for date-time columns.
pub const C_NUM_FORMAT_DATETIME: &str = "dd/mm/yyyy hh:mm:ss";

/// Field type names recognised by the metadata resolver.
pub const C_FIELD_TYPE_DATE: &str = "date";
pub const C_FIELD_TYPE_DATETIME: &str = "datetime";
pub const C_FIELD_TYPE_DATESTAMP: &str = "datestamp";
pub const C_FIELD_TYPE_TIME: &str = "time";
pub const C_FIELD_TYPE_CHOICE: &str = "choice";
pub const C_FIELD_TYPE_CHECKBOX: &str = "checkbox";
pub const C_FIELD_TYPE_RELATION: &str = "be_manager_relation";
pub const C_FIELD_TYPE_MEDIA: &str = "be_media";
pub const C_FIELD_TYPE_IMAGELIST: &str = "imagelist";
pub const C_FIELD_TYPE_LINK: &str = "be_link";

/// Field element keys read by the metadata resolver.
pub const C_ELEMENT_CHOICES: &str = "choices";
pub const C_ELEMENT_OUTPUT_VALUES: &str = "output_values";
pub const C_ELEMENT_RELATION_TABLE: &str = "table";
pub const C_ELEMENT_RELATION_FIELD: &str = "field";

/// Canonical format preset keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumFmtKey {
    /// Generic body cell format.
    Text,
    /// Header cell format.
    Header,
}

impl EnumFmtKey {
    /// Preset map key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Header => "header",
        }
    }
}

/// Build default named format presets used by the document emitter.
pub fn derive_default_xlsx_formats() -> BTreeMap<String, SpecCellFormat> {
    let cfg_base_fmt_spec = SpecCellFormat {
        valign: Some("top".to_string()),
        ..Default::default()
    };

    let mut dict_fmt = BTreeMap::new();
    dict_fmt.insert(EnumFmtKey::Text.as_str().to_string(), cfg_base_fmt_spec.clone());
    dict_fmt.insert(
        EnumFmtKey::Header.as_str().to_string(),
        cfg_base_fmt_spec.with_(SpecCellFormat {
            bold: Some(true),
            ..Default::default()
        }),
    );

    dict_fmt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_formats_contain_text_and_bold_header() {
        let dict_fmt = derive_default_xlsx_formats();
        assert_eq!(dict_fmt.len(), 2);
        assert_eq!(dict_fmt["header"].bold, Some(true));
        assert_eq!(dict_fmt["text"].bold, None);
        assert_eq!(dict_fmt["header"].valign.as_deref(), Some("top"));
    }
}
