use stillwater_core::models::{ConflictResolution, ResolutionKind, SyncConflict};
use stillwater_core::sync::SyncOptions;
use tokio::sync::mpsc;

use crate::cli::ResolutionArg;
use crate::commands::common::{
    build_engine, conflict_to_item, format_conflict_lines, format_sync_result_lines,
    open_database, sync_outcome, CliRemote, ConflictItem, Context,
};
use crate::error::CliError;

/// Conflict policy for `sync`: `None` queues conflicts
pub fn sync_resolution(resolve: Option<ResolutionArg>, manual: bool) -> Option<ConflictResolution> {
    if manual {
        return None;
    }
    Some(resolve.map_or_else(ConflictResolution::background_default, |kind| {
        ConflictResolution::user_choice(kind.into())
    }))
}

pub async fn run_sync(
    context: &Context,
    force: bool,
    resolve: Option<ResolutionArg>,
    manual: bool,
    as_json: bool,
) -> Result<(), CliError> {
    let remote = CliRemote::from_env(&context.engine_config)?.require_configured()?;
    let db = open_database(&context.db_path).await?;
    let engine = build_engine(&db, context, remote);

    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
    let options = SyncOptions {
        force,
        resolution: sync_resolution(resolve, manual),
        progress: Some(progress_tx),
    };

    let (result, ()) = tokio::join!(
        engine.sync_all_data(&context.user_id, options),
        async move {
            while let Some(progress) = progress_rx.recv().await {
                if !as_json {
                    eprintln!("[{:>3}%] {}", progress.percentage, progress.stage);
                }
            }
        }
    );

    if as_json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        for line in format_sync_result_lines(&result) {
            println!("{line}");
        }
    }
    sync_outcome(&result)
}

async fn user_conflicts(context: &Context) -> Result<Vec<SyncConflict>, CliError> {
    let db = open_database(&context.db_path).await?;
    let engine = build_engine(&db, context, CliRemote::Unconfigured);
    Ok(engine
        .get_conflicts()
        .await?
        .into_iter()
        .filter(|conflict| conflict.local_data.user_id() == context.user_id)
        .collect())
}

pub async fn run_conflicts(context: &Context, as_json: bool) -> Result<(), CliError> {
    let conflicts = user_conflicts(context).await?;

    if as_json {
        let json_items = conflicts
            .iter()
            .map(conflict_to_item)
            .collect::<Vec<ConflictItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if conflicts.is_empty() {
        println!("No sync conflicts waiting.");
        return Ok(());
    }

    for line in format_conflict_lines(&conflicts) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_resolve(
    context: &Context,
    id: &str,
    resolution: ResolutionArg,
) -> Result<(), CliError> {
    let id = id.trim();
    let remote = CliRemote::from_env(&context.engine_config)?.require_configured()?;
    let db = open_database(&context.db_path).await?;
    let engine = build_engine(&db, context, remote);

    let kind: ResolutionKind = resolution.into();
    engine.resolve_manual_conflict(id, kind).await?;
    println!("Resolved {id} ({kind})");
    Ok(())
}
