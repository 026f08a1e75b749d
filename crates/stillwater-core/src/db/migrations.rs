//! Versioned schema migrations

use libsql::{params, Connection};

use crate::error::{Error, Result};

/// One schema step; `statements` run in a single transaction
struct Migration {
    version: i64,
    description: &'static str,
    statements: &'static [&'static str],
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "records, sync status and settings",
        statements: &[
            // body holds the full record as JSON; the other columns are for filtering
            "CREATE TABLE IF NOT EXISTS records (
                domain TEXT NOT NULL,
                id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                version INTEGER NOT NULL,
                last_modified INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                sync_status TEXT NOT NULL DEFAULT 'pending',
                body TEXT NOT NULL,
                PRIMARY KEY (domain, id)
            )",
            "CREATE INDEX IF NOT EXISTS idx_records_pending
                ON records(user_id, domain, sync_status)",
            "CREATE INDEX IF NOT EXISTS idx_records_modified
                ON records(last_modified DESC)",
            "CREATE TABLE IF NOT EXISTS sync_status (
                user_id TEXT PRIMARY KEY,
                body TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
        ],
    },
    Migration {
        version: 2,
        description: "record versions never decrease",
        statements: &[
            "CREATE TRIGGER IF NOT EXISTS records_version_guard BEFORE UPDATE ON records
             FOR EACH ROW
             WHEN NEW.version < OLD.version
             BEGIN
                 SELECT RAISE(ABORT, 'record version must not decrease');
             END",
        ],
    },
];

const CURRENT_VERSION: i64 = 2;

/// Bring the schema up to [`CURRENT_VERSION`]
pub async fn run(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY)",
        (),
    )
    .await?;

    let found = current_version(conn).await?;
    if found > CURRENT_VERSION {
        return Err(Error::SchemaTooNew {
            found,
            supported: CURRENT_VERSION,
        });
    }

    for migration in MIGRATIONS.iter().filter(|migration| migration.version > found) {
        apply(conn, migration).await?;
    }
    Ok(())
}

async fn current_version(conn: &Connection) -> Result<i64> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;
    match rows.next().await? {
        Some(row) => Ok(row.get::<i64>(0)?),
        None => Ok(0),
    }
}

async fn apply(conn: &Connection, migration: &Migration) -> Result<()> {
    conn.execute("BEGIN TRANSACTION", ()).await?;

    let outcome = async {
        for statement in migration.statements {
            conn.execute(statement, ()).await?;
        }
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?)",
            params![migration.version],
        )
        .await?;
        conn.execute("COMMIT", ()).await?;
        Ok::<(), Error>(())
    }
    .await;

    if let Err(error) = outcome {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(error);
    }

    tracing::info!(
        "Migrated database to v{} ({})",
        migration.version,
        migration.description
    );
    Ok(())
}
