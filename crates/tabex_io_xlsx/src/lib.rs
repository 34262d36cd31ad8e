//! `tabex_io_xlsx` v1:
//! Relational table to XLSX export with semantic column reinterpretation.
//!
//! Modules, leaves first:
//! - `conf`     : constants and default presets
//! - `spec`     : specs/models/options/errors
//! - `util`     : pure helper functions
//! - `provider` : collaborator capability traits
//! - `meta`     : metadata resolver
//! - `rows`     : row source
//! - `cell`     : cell transformer
//! - `sheet`    : sheet builder
//! - `writer`   : workbook emitter
//! - `export`   : end-to-end pipeline
//! - `memory`   : serde-loadable in-memory catalog
//! - `frame`    : polars-backed row store
pub mod cell;
pub mod conf;
pub mod export;
pub mod frame;
pub mod memory;
pub mod meta;
pub mod provider;
pub mod rows;
pub mod sheet;
pub mod spec;
pub mod util;
pub mod writer;

pub use cell::{CellTransformer, SpecCellRender};
pub use conf::{
    C_XLSX_CONTENT_TYPE, N_LEN_EXCEL_SHEET_NAME_MAX, N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX,
};
pub use export::{ExportOutcome, SpecExportContext, export_table, export_table_at};
pub use frame::FrameRowStore;
pub use memory::{SpecCatalog, SpecCatalogTable, parse_choice_list};
pub use meta::resolve_table_schema;
pub use provider::{
    ChoiceResolver, EntityLookup, MediaUrlResolver, NoEntityLookup, PrefixMediaUrlResolver,
    RelationResolver, RowStore, SchemaProvider, SpecChoiceContext,
};
pub use rows::fetch_all;
pub use sheet::{SheetBuildResult, SheetDocument, build_sheet_document};
pub use spec::{
    EnumAutofitColumnsRule, EnumCellValue, EnumCellWrite, EnumColumnKind, EnumUnresolvedKind,
    ExportError, SpecAutofitCellsPolicy, SpecCellFormat, SpecColumn, SpecEntity,
    SpecExportOptions, SpecExportReport, SpecFieldDefinition, SpecRow, SpecSheetCell,
    SpecTableSchema, SpecUnresolvedReference,
};
pub use writer::{ExportResponse, XlsxEmitter, emit_document};
