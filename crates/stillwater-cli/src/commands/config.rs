use stillwater_core::models::{BackgroundSyncConfig, BackgroundSyncConfigUpdate};

use crate::cli::ConfigSetArgs;
use crate::commands::common::{build_engine, open_database, CliRemote, Context};
use crate::error::CliError;

pub fn format_config_lines(config: &BackgroundSyncConfig) -> Vec<String> {
    let order = config
        .domain_order()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<String>>()
        .join(" > ");
    vec![
        format!("enabled              {}", config.enabled),
        format!("interval             {} min", config.sync_interval),
        format!("wifi_only            {}", config.wifi_only),
        format!("max_retries          {}", config.max_retries),
        format!("exponential_backoff  {}", config.exponential_backoff),
        format!("on_app_start         {}", config.sync_on_app_start),
        format!("on_app_background    {}", config.sync_on_app_background),
        format!("batch_size           {}", config.batch_size),
        format!("priority             {order}"),
    ]
}

/// Reject a `config set` that would change nothing
pub fn config_update(args: ConfigSetArgs) -> Result<BackgroundSyncConfigUpdate, CliError> {
    let update = BackgroundSyncConfigUpdate::from(args);
    if update == BackgroundSyncConfigUpdate::default() {
        return Err(CliError::Config(
            "nothing to update; pass at least one option (see `stillwater config set --help`)"
                .to_string(),
        ));
    }
    if update.sync_interval == Some(0) {
        return Err(CliError::Config("interval must be at least 1 minute".to_string()));
    }
    if update.batch_size == Some(0) {
        return Err(CliError::Config("batch size must be at least 1".to_string()));
    }
    Ok(update)
}

pub async fn run_config_show(context: &Context, as_json: bool) -> Result<(), CliError> {
    let db = open_database(&context.db_path).await?;
    let engine = build_engine(&db, context, CliRemote::Unconfigured);
    let config = engine.get_background_sync_config(&context.user_id).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        for line in format_config_lines(&config) {
            println!("{line}");
        }
    }
    Ok(())
}

pub async fn run_config_set(context: &Context, args: ConfigSetArgs) -> Result<(), CliError> {
    let update = config_update(args)?;
    let db = open_database(&context.db_path).await?;
    let engine = build_engine(&db, context, CliRemote::Unconfigured);
    let config = engine
        .update_background_sync_config(&context.user_id, &update)
        .await?;

    tracing::info!("Updated background sync config for {}", context.user_id);
    for line in format_config_lines(&config) {
        println!("{line}");
    }
    Ok(())
}
