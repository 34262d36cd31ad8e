//! Cell transformer: one raw value plus its column kind into a typed write.

use std::collections::BTreeMap;

use tracing::warn;

use crate::conf::{C_URL_SCHEMES, N_LEN_EXCEL_URL_MAX};
use crate::provider::{EntityLookup, MediaUrlResolver};
use crate::spec::{
    EnumCellWrite, EnumColumnKind, EnumUnresolvedKind, SpecExportOptions, SpecTableSchema,
};
use crate::util::{
    convert_datetime_to_excel_serial, convert_scalar_cell, parse_stored_datetime,
    split_file_list,
};

/// Result of rendering one cell.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecCellRender {
    /// Write instruction.
    pub write: EnumCellWrite,
    /// Set when a label/target lookup missed and the raw value was written.
    pub unresolved: Option<EnumUnresolvedKind>,
    /// Set when the write was degraded to stay within worksheet rules.
    pub warning: Option<String>,
}

impl SpecCellRender {
    fn resolved(write: EnumCellWrite) -> Self {
        Self {
            write,
            unresolved: None,
            warning: None,
        }
    }

    fn fallback(raw_value: &str, kind: EnumUnresolvedKind) -> Self {
        Self {
            write: EnumCellWrite::Text(raw_value.to_string()),
            unresolved: Some(kind),
            warning: None,
        }
    }
}

/// Renders cells against an immutable schema.
///
/// Apart from URL string construction this is a pure function of the column
/// metadata and the raw value.
pub struct CellTransformer<'a> {
    schema: &'a SpecTableSchema,
    media_url_resolver: &'a dyn MediaUrlResolver,
    entity_lookup: &'a dyn EntityLookup,
    options: &'a SpecExportOptions,
}

impl<'a> CellTransformer<'a> {
    pub fn new(
        schema: &'a SpecTableSchema,
        media_url_resolver: &'a dyn MediaUrlResolver,
        entity_lookup: &'a dyn EntityLookup,
        options: &'a SpecExportOptions,
    ) -> Self {
        Self {
            schema,
            media_url_resolver,
            entity_lookup,
            options,
        }
    }

    /// Schema the transformer renders against.
    pub fn schema(&self) -> &SpecTableSchema {
        self.schema
    }

    /// Render `raw_value` of the column at zero-based `col_idx`.
    ///
    /// Positions without a schema column are passed through unchanged.
    pub fn render(&self, col_idx: usize, column_name: &str, raw_value: &str) -> SpecCellRender {
        let Some(column) = self.schema.column(col_idx) else {
            return SpecCellRender::resolved(convert_scalar_cell(raw_value));
        };

        if raw_value.is_empty() {
            return SpecCellRender::resolved(match column.kind {
                EnumColumnKind::Plain => convert_scalar_cell(raw_value),
                _ => EnumCellWrite::Blank,
            });
        }

        let render = match &column.kind {
            EnumColumnKind::Plain => SpecCellRender::resolved(convert_scalar_cell(raw_value)),
            EnumColumnKind::Date => self.render_date(raw_value, &self.options.num_format_date),
            EnumColumnKind::DateTime => {
                self.render_date(raw_value, &self.options.num_format_datetime)
            }
            EnumColumnKind::Choice(dict_labels) => {
                render_label(dict_labels, raw_value, EnumUnresolvedKind::Choice)
            }
            EnumColumnKind::Checkbox(dict_labels) => {
                render_label(dict_labels, raw_value, EnumUnresolvedKind::Checkbox)
            }
            EnumColumnKind::Relation(dict_labels) => {
                render_label(dict_labels, raw_value, EnumUnresolvedKind::Relation)
            }
            EnumColumnKind::FileRef => derive_link_render(
                self.media_url_resolver.url_for(raw_value),
                raw_value.to_string(),
            ),
            EnumColumnKind::FileRefList => self.render_file_list(raw_value),
            EnumColumnKind::EntityLink => self.render_entity_link(raw_value),
        };

        if let Some(kind) = render.unresolved {
            warn!(
                column = column_name,
                value = raw_value,
                kind = %kind,
                "unresolved reference, writing raw value"
            );
        }
        render
    }

    fn render_date(&self, raw_value: &str, num_format: &str) -> SpecCellRender {
        let dt = match parse_stored_datetime(raw_value) {
            Ok(Some(dt)) => dt,
            Ok(None) => return SpecCellRender::resolved(EnumCellWrite::Blank),
            Err(_) => return SpecCellRender::fallback(raw_value, EnumUnresolvedKind::Date),
        };
        match convert_datetime_to_excel_serial(&dt) {
            Ok(serial) => SpecCellRender::resolved(EnumCellWrite::DateSerial {
                serial,
                num_format: num_format.to_string(),
            }),
            Err(_) => SpecCellRender::fallback(raw_value, EnumUnresolvedKind::Date),
        }
    }

    fn render_file_list(&self, raw_value: &str) -> SpecCellRender {
        let l_urls: Vec<String> = split_file_list(raw_value)
            .into_iter()
            .map(|c_file| self.media_url_resolver.url_for(c_file))
            .collect();
        if l_urls.is_empty() {
            return SpecCellRender::resolved(EnumCellWrite::Blank);
        }
        SpecCellRender::resolved(EnumCellWrite::WrappedText(
            l_urls.join(&self.options.list_separator),
        ))
    }

    fn render_entity_link(&self, raw_value: &str) -> SpecCellRender {
        match self.entity_lookup.get(raw_value) {
            Some(entity) => derive_link_render(
                join_server_url(&self.options.url_server, &entity.url),
                entity.name,
            ),
            None => SpecCellRender::fallback(raw_value, EnumUnresolvedKind::Entity),
        }
    }
}

fn render_label(
    dict_labels: &BTreeMap<String, String>,
    raw_value: &str,
    kind: EnumUnresolvedKind,
) -> SpecCellRender {
    match dict_labels.get(raw_value) {
        Some(c_label) => SpecCellRender::resolved(EnumCellWrite::Text(c_label.clone())),
        None => SpecCellRender::fallback(raw_value, kind),
    }
}

/// Hyperlink write; targets a worksheet link cannot hold are written as text.
fn derive_link_render(url: String, text: String) -> SpecCellRender {
    let c_reason = if url.chars().count() > N_LEN_EXCEL_URL_MAX {
        "exceeds the worksheet link length limit"
    } else if !C_URL_SCHEMES.iter().any(|c_scheme| url.starts_with(c_scheme)) {
        "has no supported URL scheme"
    } else {
        return SpecCellRender::resolved(EnumCellWrite::Hyperlink { url, text });
    };

    warn!(url = %url, reason = c_reason, "link target rejected, writing text only");
    let c_warning = format!("Link target {url:?} {c_reason}; wrote {text:?} as text.");
    SpecCellRender {
        write: EnumCellWrite::Text(text),
        unresolved: None,
        warning: Some(c_warning),
    }
}

fn join_server_url(url_server: &str, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        return url.to_string();
    }
    format!(
        "{}/{}",
        url_server.trim_end_matches('/'),
        url.trim_start_matches('/')
    )
}
