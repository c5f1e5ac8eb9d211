use anyhow::{bail, Result};
use meter_client::query::Selection;
use report_service::{config::WorkbookConfig, observability, render};
use std::{env, path::Path};

/// Export the validated readings of a workbook to a flat CSV file.
///
/// Usage:
///   export_readings <workbook_path> <out_csv> [year|all] [month|all]
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        bail!("usage: export_readings <workbook_path> <out_csv> [year|all] [month|all]");
    }
    let cfg = WorkbookConfig::for_path(&args[1]);
    let out = Path::new(&args[2]);

    let selection = Selection::parse(
        args.get(3).map(String::as_str),
        args.get(4).map(String::as_str),
        None,
        None,
    )?;

    let written = render::export_readings(&cfg, selection, out).await?;
    tracing::info!(records = written, out = %out.display(), "export finished");

    Ok(())
}
