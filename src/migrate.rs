use sqlx::SqlitePool;

/// Create the SQLite schema. Idempotent.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    // Documents of every collection; enrichment columns stay NULL until set
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            collection TEXT NOT NULL,
            seq INTEGER NOT NULL,
            text TEXT,
            label TEXT,
            timestamp TEXT,
            sentiment TEXT,
            weapons_json TEXT,
            ingested_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS status (
            collection TEXT NOT NULL,
            key TEXT NOT NULL,
            done INTEGER NOT NULL,
            updated_at INTEGER,
            PRIMARY KEY (collection, key)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pipelines (
            id TEXT PRIMARY KEY,
            definition_json TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_documents_collection_seq ON documents(collection, seq)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_sentiment ON documents(sentiment)")
        .execute(pool)
        .await?;

    Ok(())
}
