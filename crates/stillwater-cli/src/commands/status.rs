use serde::Serialize;
use stillwater_core::models::{DataUsage, PerDomain, SyncStatus};
use stillwater_core::sync::NetworkState;

use crate::commands::common::{
    build_engine, format_bytes, format_sync_timestamp, open_database, CliRemote, Context,
};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub user_id: String,
    pub last_sync_at: Option<i64>,
    pub last_sync_at_iso: Option<String>,
    pub pending: PerDomain<usize>,
    pub pending_total: usize,
    pub failed: PerDomain<Vec<String>>,
    pub conflicts: usize,
    pub data_usage: DataUsage,
    pub network: String,
    pub remote_configured: bool,
}

pub fn build_status_report(
    status: SyncStatus,
    pending: PerDomain<usize>,
    conflicts: usize,
    network: &NetworkState,
    remote_configured: bool,
) -> StatusReport {
    StatusReport {
        last_sync_at_iso: status.last_sync_at.map(format_sync_timestamp),
        last_sync_at: status.last_sync_at,
        pending_total: pending.total(),
        pending,
        failed: status.failed_sync,
        conflicts,
        data_usage: status.data_usage,
        network: if network.connected {
            network.class.to_string()
        } else {
            "offline".to_string()
        },
        remote_configured,
        user_id: status.user_id,
    }
}

pub fn format_status_lines(report: &StatusReport) -> Vec<String> {
    let failed =
        report.failed.sessions.len() + report.failed.moods.len() + report.failed.journals.len();
    vec![
        format!("User        {}", report.user_id),
        format!(
            "Last sync   {}",
            report.last_sync_at_iso.as_deref().unwrap_or("never")
        ),
        format!(
            "Pending     {} (sessions {}, moods {}, journals {})",
            report.pending_total, report.pending.sessions, report.pending.moods, report.pending.journals
        ),
        format!("Failed      {failed} in the last pass"),
        format!("Conflicts   {}", report.conflicts),
        format!(
            "Data today  {} up, {} down",
            format_bytes(report.data_usage.uploaded_bytes),
            format_bytes(report.data_usage.downloaded_bytes)
        ),
        format!(
            "Network     {}{}",
            report.network,
            if report.remote_configured {
                ""
            } else {
                " (remote not configured)"
            }
        ),
    ]
}

pub async fn run_status(context: &Context, as_json: bool) -> Result<(), CliError> {
    let remote = CliRemote::from_env(&context.engine_config)?;
    let remote_configured = remote.is_configured();
    let db = open_database(&context.db_path).await?;
    let engine = build_engine(&db, context, remote);

    let status = engine.get_sync_status(&context.user_id).await?;
    let pending = engine.get_pending_sync_count(&context.user_id).await?;
    let conflicts = engine
        .get_conflicts()
        .await?
        .iter()
        .filter(|conflict| conflict.local_data.user_id() == context.user_id)
        .count();
    let report = build_status_report(
        status,
        pending,
        conflicts,
        &context.network,
        remote_configured,
    );

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for line in format_status_lines(&report) {
            println!("{line}");
        }
    }
    Ok(())
}
