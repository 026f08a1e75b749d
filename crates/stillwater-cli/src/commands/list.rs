use stillwater_core::db::LibSqlRecordStore;
use stillwater_core::util::now_millis;

use crate::cli::DomainArg;
use crate::commands::common::{
    format_record_lines, open_database, record_to_list_item, Context, RecordListItem,
};
use crate::error::CliError;

pub async fn run_list(
    context: &Context,
    domain: DomainArg,
    limit: usize,
    as_json: bool,
) -> Result<(), CliError> {
    let db = open_database(&context.db_path).await?;
    let records = LibSqlRecordStore::new(db.connection())
        .list(&context.user_id, domain.into(), limit)
        .await?;
    let now = now_millis();

    if as_json {
        let json_items = records
            .iter()
            .map(|record| record_to_list_item(record, now))
            .collect::<Vec<RecordListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if records.is_empty() {
        println!("No records yet.");
    } else {
        for line in format_record_lines(&records, now) {
            println!("{line}");
        }
    }

    Ok(())
}
