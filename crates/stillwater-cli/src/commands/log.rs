use stillwater_core::db::{LibSqlRecordStore, LocalStore};
use stillwater_core::models::{JournalEntry, MoodEntry, SessionProgress, SyncableRecord};

use crate::cli::LogCommands;
use crate::commands::common::{normalize_content, normalize_tags, open_database, Context};
use crate::error::CliError;

pub async fn run_log(context: &Context, command: LogCommands) -> Result<(), CliError> {
    let record = build_record(&context.user_id, command)?;
    let db = open_database(&context.db_path).await?;
    LibSqlRecordStore::new(db.connection()).save(&record).await?;

    tracing::debug!("Saved {} {}", record.domain(), record.id());
    println!("{}", record.id());
    Ok(())
}

/// Turn `log` arguments into a validated record owned by `user_id`
pub fn build_record(user_id: &str, command: LogCommands) -> Result<SyncableRecord, CliError> {
    let record: SyncableRecord = match command {
        LogCommands::Session {
            meditation_id,
            duration,
            completed,
            quality,
            notes,
            tags,
        } => {
            let mut session = SessionProgress::new(user_id, meditation_id.trim(), duration);
            if let Some(completed) = completed {
                session.completed_seconds = completed.min(duration);
                session.completed = session.completed_seconds >= duration;
            }
            session.quality = quality;
            session.notes = notes.trim().to_string();
            session.tags = normalize_tags(&tags);
            session.into()
        }
        LogCommands::Mood {
            mood,
            energy,
            stress,
            notes,
            tags,
        } => {
            let mut entry = MoodEntry::new(user_id, mood, energy, stress);
            entry.notes = notes.trim().to_string();
            entry.tags = normalize_tags(&tags);
            entry.into()
        }
        LogCommands::Journal {
            title,
            content,
            mood,
        } => {
            let content = normalize_content(&content.join(" ")).ok_or(CliError::EmptyContent)?;
            let mut entry = JournalEntry::new(user_id, title.trim(), content);
            entry.mood = mood;
            entry.into()
        }
    };

    record.validate()?;
    Ok(record)
}
