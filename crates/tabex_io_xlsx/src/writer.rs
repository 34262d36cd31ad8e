//! XLSX document emitter that serializes a [`SheetDocument`] into workbook bytes.

use std::collections::BTreeMap;
use std::io::Write;

use rust_xlsxwriter::{
    Format, FormatAlign, FormatUnderline, Url, Workbook, Worksheet, XlsxError,
};
use tracing::debug;

use crate::conf::{C_COLOR_HYPERLINK, C_XLSX_CONTENT_TYPE};
use crate::sheet::SheetDocument;
use crate::spec::{EnumCellValue, ExportError, SpecCellFormat, SpecExportOptions, SpecSheetCell};
use crate::util::derive_export_filename;

/// Finished attachment: bytes plus the metadata a host needs to deliver them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportResponse {
    /// URL-escaped `{timestamp}_{table}.xlsx`.
    pub filename: String,
    /// Workbook MIME type.
    pub content_type: &'static str,
    /// Complete workbook.
    pub bytes: Vec<u8>,
}

impl ExportResponse {
    /// `Content-Disposition` header value.
    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.filename)
    }

    /// Write the complete workbook to `sink` and flush it.
    pub fn write_to<W: Write>(&self, sink: &mut W) -> Result<(), ExportError> {
        sink.write_all(&self.bytes)?;
        sink.flush()?;
        Ok(())
    }
}

/// Stateless workbook emitter bound to header/body format presets.
#[derive(Debug, Clone)]
pub struct XlsxEmitter {
    fmt_header: SpecCellFormat,
    fmt_text: SpecCellFormat,
}

impl XlsxEmitter {
    /// Create emitter from export options.
    pub fn new(options: &SpecExportOptions) -> Self {
        Self {
            fmt_header: options.fmt_header.clone(),
            fmt_text: options.fmt_text.clone(),
        }
    }

    /// Serialize `document` into XLSX bytes.
    ///
    /// The workbook is fully built in memory; nothing is returned on failure.
    pub fn emit(&self, document: &SheetDocument) -> Result<Vec<u8>, ExportError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet
            .set_name(&document.title)
            .map_err(derive_xlsx_error)?;

        let fmt_header = derive_rust_xlsx_format(&self.fmt_header);
        let mut dict_fmt_body: BTreeMap<(Option<String>, bool, bool), Format> = BTreeMap::new();

        for (n_idx_row, l_cells) in document.rows.iter().enumerate() {
            let if_is_header = n_idx_row < document.n_rows_header;
            for (n_idx_col, cell) in l_cells.iter().enumerate() {
                if cell.is_blank() {
                    continue;
                }
                let format = if if_is_header {
                    &fmt_header
                } else {
                    let if_link = cell.hyperlink.is_some();
                    &*dict_fmt_body
                        .entry((cell.num_format.clone(), cell.if_text_wrap, if_link))
                        .or_insert_with(|| self.derive_body_format(cell, if_link))
                };
                write_cell_with_format(worksheet, n_idx_row, n_idx_col, cell, format)?;
            }
        }

        if let Some(n_row_freeze) = document.row_freeze {
            worksheet
                .set_freeze_panes(cast_row_num(n_row_freeze)?, 0)
                .map_err(derive_xlsx_error)?;
        }

        for (n_idx_col, n_width) in document.widths_by_col.iter().enumerate() {
            worksheet
                .set_column_width(cast_col_num(n_idx_col)?, *n_width)
                .map_err(derive_xlsx_error)?;
        }

        let v_bytes = workbook.save_to_buffer().map_err(derive_xlsx_error)?;
        debug!(
            sheet = %document.title,
            n_rows = document.rows.len(),
            n_bytes = v_bytes.len(),
            "workbook serialized"
        );
        Ok(v_bytes)
    }

    /// Body format for one cell shape: text preset plus number format, wrap
    /// and hyperlink styling.
    fn derive_body_format(&self, cell: &SpecSheetCell, if_link: bool) -> Format {
        let format = derive_rust_xlsx_format(&self.fmt_text.merge(&SpecCellFormat {
            num_format: cell.num_format.clone(),
            text_wrap: cell.if_text_wrap.then_some(true),
            font_color: if_link.then(|| C_COLOR_HYPERLINK.to_string()),
            ..Default::default()
        }));
        if if_link {
            return format.set_underline(FormatUnderline::Single);
        }
        format
    }

    /// Serialize `document` and wrap it as a named attachment.
    pub fn emit_response(
        &self,
        document: &SheetDocument,
        table_id: &str,
        timestamp: i64,
    ) -> Result<ExportResponse, ExportError> {
        Ok(ExportResponse {
            filename: derive_export_filename(timestamp, table_id),
            content_type: C_XLSX_CONTENT_TYPE,
            bytes: self.emit(document)?,
        })
    }
}

/// Serialize `document` with the formats of `options`.
pub fn emit_document(
    document: &SheetDocument,
    options: &SpecExportOptions,
) -> Result<Vec<u8>, ExportError> {
    XlsxEmitter::new(options).emit(document)
}

fn write_cell_with_format(
    worksheet: &mut Worksheet,
    row_idx: usize,
    col_idx: usize,
    cell: &SpecSheetCell,
    format: &Format,
) -> Result<(), ExportError> {
    let n_row = cast_row_num(row_idx)?;
    let n_col = cast_col_num(col_idx)?;

    match (&cell.value, &cell.hyperlink) {
        (None | Some(EnumCellValue::None), _) => {}
        (Some(EnumCellValue::String(val)), Some(c_url)) => {
            worksheet
                .write_url_with_format(
                    n_row,
                    n_col,
                    Url::new(c_url.as_str()).set_text(val.as_str()),
                    format,
                )
                .map_err(derive_xlsx_error)?;
        }
        (Some(EnumCellValue::String(val)), None) => {
            worksheet
                .write_string_with_format(n_row, n_col, val, format)
                .map_err(derive_xlsx_error)?;
        }
        (Some(EnumCellValue::Number(val)), _) => {
            worksheet
                .write_number_with_format(n_row, n_col, *val, format)
                .map_err(derive_xlsx_error)?;
        }
    }
    Ok(())
}

fn derive_rust_xlsx_format(spec: &SpecCellFormat) -> Format {
    let mut format = Format::new();

    if let Some(val) = &spec.font_name {
        format = format.set_font_name(val.clone());
    }
    if let Some(val) = spec.font_size {
        format = format.set_font_size(val as f64);
    }
    if spec.bold.unwrap_or(false) {
        format = format.set_bold();
    }
    if spec.italic.unwrap_or(false) {
        format = format.set_italic();
    }

    if let Some(val) = &spec.align
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }
    if let Some(val) = &spec.valign
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }

    if let Some(val) = &spec.num_format {
        format = format.set_num_format(val.clone());
    }
    if let Some(val) = &spec.bg_color {
        format = format.set_background_color(val.as_str());
    }
    if let Some(val) = &spec.font_color {
        format = format.set_font_color(val.as_str());
    }

    if spec.text_wrap.unwrap_or(false) {
        format = format.set_text_wrap();
    }

    format
}

fn derive_format_align(align: &str) -> Option<FormatAlign> {
    let value = align.trim().to_ascii_lowercase();
    match value.as_str() {
        "general" => Some(FormatAlign::General),
        "left" => Some(FormatAlign::Left),
        "center" => Some(FormatAlign::Center),
        "right" => Some(FormatAlign::Right),
        "fill" => Some(FormatAlign::Fill),
        "justify" => Some(FormatAlign::Justify),
        "center_across" => Some(FormatAlign::CenterAcross),
        "distributed" => Some(FormatAlign::Distributed),
        "top" => Some(FormatAlign::Top),
        "bottom" => Some(FormatAlign::Bottom),
        "vcenter" | "vertical_center" => Some(FormatAlign::VerticalCenter),
        "vjustify" | "vertical_justify" => Some(FormatAlign::VerticalJustify),
        "vdistributed" | "vertical_distributed" => Some(FormatAlign::VerticalDistributed),
        _ => None,
    }
}

fn cast_row_num(value: usize) -> Result<u32, ExportError> {
    u32::try_from(value)
        .map_err(|_| ExportError::SheetLimitExceeded(format!("row index overflow: {value}")))
}

fn cast_col_num(value: usize) -> Result<u16, ExportError> {
    u16::try_from(value)
        .map_err(|_| ExportError::SheetLimitExceeded(format!("column index overflow: {value}")))
}

fn derive_xlsx_error(err: XlsxError) -> ExportError {
    ExportError::SerializationError(format!("xlsx write error: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::EnumCellWrite;

    fn document() -> SheetDocument {
        SheetDocument {
            title: "rexnews".to_string(),
            rows: vec![
                vec![SpecSheetCell::text("Title"), SpecSheetCell::text("Image")],
                vec![
                    SpecSheetCell::text("Hello"),
                    SpecSheetCell::from(EnumCellWrite::Hyperlink {
                        url: "https://example.org/media/a.jpg".to_string(),
                        text: "a.jpg".to_string(),
                    }),
                ],
            ],
            n_rows_header: 1,
            row_freeze: Some(1),
            widths_by_col: vec![10.0, 12.0],
        }
    }

    #[test]
    fn emit_produces_zip_container() {
        let emitter = XlsxEmitter::new(&SpecExportOptions::default());
        let v_bytes = emitter.emit(&document()).expect("emit");
        assert!(v_bytes.starts_with(b"PK"));
    }

    #[test]
    fn emit_response_names_attachment() {
        let emitter = XlsxEmitter::new(&SpecExportOptions::default());
        let response = emitter
            .emit_response(&document(), "rex_news", 1_700_000_000)
            .expect("emit");

        assert_eq!(response.filename, "1700000000_rex_news.xlsx");
        assert_eq!(
            response.content_type,
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        );
        assert_eq!(
            response.content_disposition(),
            "attachment; filename=\"1700000000_rex_news.xlsx\""
        );

        let mut v_sink = Vec::new();
        response.write_to(&mut v_sink).expect("write");
        assert_eq!(v_sink, response.bytes);
    }

    fn read_part(v_bytes: &[u8], name: &str) -> String {
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(v_bytes)).expect("zip");
        let mut part = archive.by_name(name).expect("part");
        let mut c_xml = String::new();
        std::io::Read::read_to_string(&mut part, &mut c_xml).expect("utf8");
        c_xml
    }

    #[test]
    fn emit_document_writes_links_freeze_widths_and_wrap() {
        let mut doc = document();
        doc.rows[1].push(SpecSheetCell::from(EnumCellWrite::WrappedText(
            "a.jpg\nb.jpg".to_string(),
        )));
        let v_bytes = emit_document(&doc, &SpecExportOptions::default()).expect("emit");

        let c_sheet = read_part(&v_bytes, "xl/worksheets/sheet1.xml");
        assert!(c_sheet.contains("<hyperlink ref=\"B2\""));
        assert!(c_sheet.contains("<pane ySplit=\"1\""));
        assert!(c_sheet.contains("state=\"frozen\""));
        assert_eq!(c_sheet.matches("customWidth=\"1\"").count(), 2);

        let c_styles = read_part(&v_bytes, "xl/styles.xml");
        assert!(c_styles.contains("wrapText=\"1\""));
        assert!(c_styles.contains("vertical=\"top\""));
        assert!(c_styles.contains("<u/>"));
        assert!(c_styles.contains("FF0563C1"));
    }

    #[test]
    fn emit_title_only_document() {
        let emitter = XlsxEmitter::new(&SpecExportOptions::default());
        let v_bytes = emitter
            .emit(&SheetDocument::empty("rexnews"))
            .expect("emit");
        assert!(!v_bytes.is_empty());
    }

    #[test]
    fn emit_invalid_sheet_name_is_serialization_error() {
        let emitter = XlsxEmitter::new(&SpecExportOptions::default());
        let err = emitter
            .emit(&SheetDocument::empty("bad[name]"))
            .expect_err("invalid name");
        assert!(matches!(err, ExportError::SerializationError(_)));
    }

    #[test]
    fn derive_format_align_accepts_vertical_aliases() {
        assert_eq!(derive_format_align(" Top "), Some(FormatAlign::Top));
        assert_eq!(
            derive_format_align("vertical_center"),
            Some(FormatAlign::VerticalCenter)
        );
        assert_eq!(derive_format_align("sideways"), None);
    }
}
