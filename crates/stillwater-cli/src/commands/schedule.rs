use std::time::Duration;

use stillwater_core::sync::{BackgroundScheduler, ScheduleDecision};
use tokio::sync::watch;

use crate::cli::TriggerArg;
use crate::commands::common::{
    build_engine, format_sync_result_lines, format_sync_timestamp, open_database, sync_outcome,
    CliRemote, Context,
};
use crate::error::CliError;

pub fn describe_decision(decision: &ScheduleDecision) -> String {
    match decision {
        ScheduleDecision::Disabled => "Background sync is disabled".to_string(),
        ScheduleDecision::NotDue { next_due_at } => {
            format!("Not due until {}", format_sync_timestamp(*next_due_at))
        }
        ScheduleDecision::Offline => "Skipped: device is offline".to_string(),
        ScheduleDecision::NetworkRestricted(class) => {
            format!("Skipped: Wi-Fi only is on and the connection is {class}")
        }
        ScheduleDecision::Ran(result) => {
            if result.success {
                "Background sync ran".to_string()
            } else {
                "Background sync ran with errors".to_string()
            }
        }
    }
}

pub async fn run_schedule(context: &Context, trigger: TriggerArg) -> Result<(), CliError> {
    let remote = CliRemote::from_env(&context.engine_config)?.require_configured()?;
    let db = open_database(&context.db_path).await?;
    let engine = build_engine(&db, context, remote);
    let scheduler = BackgroundScheduler::new(&engine);

    let decision = match trigger {
        TriggerArg::Interval => Some(scheduler.schedule_background_sync(&context.user_id).await?),
        TriggerArg::AppStart => scheduler.on_app_start(&context.user_id).await?,
        TriggerArg::AppBackground => scheduler.on_app_background(&context.user_id).await?,
    };

    let Some(decision) = decision else {
        println!("This trigger is turned off in the background sync config");
        return Ok(());
    };

    println!("{}", describe_decision(&decision));
    if let ScheduleDecision::Ran(result) = &decision {
        for line in format_sync_result_lines(result) {
            println!("{line}");
        }
        return sync_outcome(result);
    }
    Ok(())
}

pub async fn run_watch(context: &Context, tick_seconds: u64) -> Result<(), CliError> {
    let remote = CliRemote::from_env(&context.engine_config)?.require_configured()?;
    let db = open_database(&context.db_path).await?;
    let engine = build_engine(&db, context, remote);
    let scheduler = BackgroundScheduler::new(&engine);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    println!("Checking for background sync every {tick_seconds}s; press Ctrl-C to stop");
    tokio::join!(
        scheduler.run(
            &context.user_id,
            Duration::from_secs(tick_seconds.max(1)),
            shutdown_rx
        ),
        async move {
            if let Err(error) = tokio::signal::ctrl_c().await {
                tracing::warn!("Could not listen for Ctrl-C: {error}");
            }
            shutdown_tx.send(true).ok();
        }
    );
    Ok(())
}
