//! tabex-export - Export one catalog table to an XLSX workbook

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use tabex_io_xlsx::{
    ExportOutcome, FrameRowStore, PrefixMediaUrlResolver, RowStore, SchemaProvider, SpecCatalog,
    SpecExportContext, SpecExportOptions, SpecFieldDefinition, SpecRow, export_table,
};

/// Export a relational table to XLSX with labels, dates and links resolved
#[derive(Parser, Debug)]
#[command(name = "tabex-export")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON catalog with tables, field definitions, rows and content items
    #[arg(short, long)]
    catalog: PathBuf,

    /// Table to export
    #[arg(short, long)]
    table: String,

    /// TOML file with export options
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory of `{table}.ipc` / `{table}.arrow` files used as row source
    #[arg(long)]
    frames_dir: Option<PathBuf>,

    /// Directory the workbook is written to
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,

    /// Server URL prefixed to content item links
    #[arg(long)]
    url_server: Option<String>,

    /// Base URL of the media folder
    #[arg(long)]
    media_base_url: Option<String>,

    /// Write a title-only workbook when the table has no rows
    #[arg(long)]
    emit_empty: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Catalog metadata with rows optionally served from IPC frames.
struct CliSources {
    catalog: SpecCatalog,
    frames: Option<FrameRowStore>,
}

impl SchemaProvider for CliSources {
    fn get_columns(&self, table_id: &str) -> Option<Vec<String>> {
        self.catalog
            .get_columns(table_id)
            .or_else(|| self.frames.as_ref()?.columns(table_id))
    }

    fn get_fields(&self, table_id: &str) -> Vec<SpecFieldDefinition> {
        self.catalog.get_fields(table_id)
    }
}

impl RowStore for CliSources {
    fn select_all(&self, table_id: &str) -> Result<Vec<SpecRow>, String> {
        match &self.frames {
            Some(frames) if frames.columns(table_id).is_some() => frames.select_all(table_id),
            _ => self.catalog.select_all(table_id),
        }
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("tabex=debug")
            .init();
    }

    let options = load_options(&cli)?;
    let sources = load_sources(&cli.catalog, cli.frames_dir.as_deref())?;
    let outcome = run_export(&sources, &cli.table, &options)?;

    match &outcome.response {
        Some(response) => {
            let path = write_response(&cli.out_dir, &outcome)?;
            println!("{} -> {} ({} bytes)", cli.table, path.display(), response.bytes.len());
        }
        None => println!("No data to export for table {}.", cli.table),
    }
    println!("{}", outcome.report);
    for miss in &outcome.report.unresolved {
        println!(
            "  unresolved {} at row {} column {}: {:?}",
            miss.kind, miss.row_idx, miss.column_name, miss.raw_value
        );
    }
    Ok(())
}

fn load_options(cli: &Cli) -> Result<SpecExportOptions> {
    let mut options = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            toml::from_str::<SpecExportOptions>(&text)
                .with_context(|| format!("Failed to parse config: {}", path.display()))?
        }
        None => SpecExportOptions::default(),
    };

    if let Some(url_server) = &cli.url_server {
        options.url_server = url_server.clone();
    }
    if let Some(media_base_url) = &cli.media_base_url {
        options.media_base_url = media_base_url.clone();
    }
    if cli.emit_empty {
        options.if_emit_empty_dataset = true;
    }
    Ok(options)
}

fn load_sources(catalog_path: &Path, frames_dir: Option<&Path>) -> Result<CliSources> {
    let text = fs::read_to_string(catalog_path)
        .with_context(|| format!("Failed to read catalog: {}", catalog_path.display()))?;
    let catalog = SpecCatalog::from_json_str(&text).map_err(anyhow::Error::msg)?;

    let frames = match frames_dir {
        Some(dir) => Some(
            FrameRowStore::from_ipc_dir(dir)
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("Failed to load frames: {}", dir.display()))?,
        ),
        None => None,
    };
    Ok(CliSources { catalog, frames })
}

fn run_export(
    sources: &CliSources,
    table_id: &str,
    options: &SpecExportOptions,
) -> Result<ExportOutcome> {
    let media = PrefixMediaUrlResolver::new(&options.media_base_url);
    let ctx = SpecExportContext {
        schema_provider: sources,
        choice_resolver: &sources.catalog,
        relation_resolver: &sources.catalog,
        row_store: sources,
        media_url_resolver: &media,
        entity_lookup: &sources.catalog,
    };
    export_table(&ctx, table_id, options)
        .with_context(|| format!("Failed to export table: {table_id}"))
}

fn write_response(out_dir: &Path, outcome: &ExportOutcome) -> Result<PathBuf> {
    let response = outcome
        .response
        .as_ref()
        .context("No workbook to write")?;
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create output dir: {}", out_dir.display()))?;

    let path = out_dir.join(&response.filename);
    let file =
        File::create(&path).with_context(|| format!("Failed to create: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    response
        .write_to(&mut writer)
        .with_context(|| format!("Failed to write: {}", path.display()))?;
    info!(path = %path.display(), "workbook written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    const C_CATALOG: &str = r#"{
        "tables": {
            "rex_news": {
                "columns": ["id", "status"],
                "fields": [
                    {"name": "status", "type_name": "choice", "label": "Status",
                     "elements": {"choices": "Online=o"}}
                ],
                "rows": [{"id": "1", "status": "o"}]
            },
            "rex_empty": {"columns": ["id"]}
        }
    }"#;

    fn cli(dir: &Path, l_args: &[&str]) -> Cli {
        let catalog = dir.join("catalog.json");
        fs::write(&catalog, C_CATALOG).expect("catalog");
        let mut l_argv = vec![
            "tabex-export".to_string(),
            "--catalog".to_string(),
            catalog.display().to_string(),
        ];
        l_argv.extend(l_args.iter().map(|c_arg| c_arg.to_string()));
        Cli::parse_from(l_argv)
    }

    #[test]
    fn load_options_merges_toml_and_flags() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = dir.path().join("export.toml");
        fs::write(
            &config,
            "url_server = \"https://cms.example.org/\"\nlist_separator = \"\\r\"\n\n[policy_autofit]\nwidth_cell_max = 40\n",
        )
        .expect("config");

        let cli = cli(
            dir.path(),
            &[
                "--table",
                "rex_news",
                "--config",
                config.to_str().expect("utf8"),
                "--media-base-url",
                "https://cdn.example.org/media",
                "--emit-empty",
            ],
        );
        let options = load_options(&cli).expect("options");

        assert_eq!(options.url_server, "https://cms.example.org/");
        assert_eq!(options.media_base_url, "https://cdn.example.org/media");
        assert_eq!(options.list_separator, "\r");
        assert_eq!(options.policy_autofit.width_cell_max, 40);
        assert_eq!(options.policy_autofit.width_cell_min, 8);
        assert!(options.if_emit_empty_dataset);
    }

    #[test]
    fn run_export_writes_workbook_to_out_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cli = cli(dir.path(), &["--table", "rex_news"]);
        let sources = load_sources(&cli.catalog, None).expect("sources");

        let outcome = run_export(&sources, "rex_news", &SpecExportOptions::default())
            .expect("export");
        let path = write_response(&dir.path().join("out"), &outcome).expect("write");

        assert!(path.ends_with(&outcome.response.as_ref().expect("response").filename));
        assert!(fs::read(&path).expect("read").starts_with(b"PK"));
    }

    #[test]
    fn run_export_empty_table_has_nothing_to_write() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cli = cli(dir.path(), &["--table", "rex_empty"]);
        let sources = load_sources(&cli.catalog, None).expect("sources");

        let outcome = run_export(&sources, "rex_empty", &SpecExportOptions::default())
            .expect("export");
        assert!(outcome.if_dataset_empty);
        assert!(write_response(dir.path(), &outcome).is_err());
    }

    #[test]
    fn run_export_unknown_table_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cli = cli(dir.path(), &["--table", "rex_missing"]);
        let sources = load_sources(&cli.catalog, None).expect("sources");
        assert!(run_export(&sources, "rex_missing", &SpecExportOptions::default()).is_err());
    }
}
