use anyhow::{bail, Result};
use meter_client::query::Selection;
use report_service::{config::WorkbookConfig, observability, render};
use std::env;

/// Print the consumption report for a workbook as JSON.
///
/// Usage:
///   consumption_report <workbook_path> [year|all] [month|all]
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        bail!("usage: consumption_report <workbook_path> [year|all] [month|all]");
    }
    let cfg = WorkbookConfig::for_path(&args[1]);

    let selection = Selection::parse(
        args.get(2).map(String::as_str),
        args.get(3).map(String::as_str),
        None,
        None,
    )?;

    let report = render::build_report(&cfg, selection, render::current_year()).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
