pub mod events;
pub mod tasks;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use owo_colors::OwoColorize;
use serde_json::json;

use opsboard_core::FieldMap;

use crate::coordinator::{FlushReport, SyncCoordinator};
use crate::remote::RemoteCollection;

/// Push queued mutations and surface anything that could not be synced.
pub(crate) async fn finish<R: RemoteCollection>(
    coordinator: &mut SyncCoordinator<R>,
) -> Result<FlushReport> {
    let report = coordinator.flush().await;
    if report.unsynced > 0 {
        for mutation in coordinator.unsynced() {
            eprintln!("{} {}", "unsynced:".red().bold(), mutation.describe());
        }
        bail!(
            "{} change(s) could not be synced; rerun the command once the server is reachable",
            report.unsynced
        );
    }
    Ok(report)
}

pub(crate) fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{s}', expected YYYY-MM-DD"))
}

/// Parse repeated `--set KEY=VALUE` arguments into a field map.
pub(crate) fn parse_set_args(args: &[String]) -> Result<FieldMap> {
    let mut fields = FieldMap::new();
    for arg in args {
        let Some((key, value)) = arg.split_once('=') else {
            bail!("invalid --set '{arg}', expected KEY=VALUE");
        };
        let value = match value.parse::<i64>() {
            Ok(n) => json!(n),
            Err(_) => json!(value),
        };
        fields.insert(key.to_string(), value);
    }
    if fields.is_empty() {
        bail!("nothing to change; pass at least one --set KEY=VALUE");
    }
    Ok(fields)
}
