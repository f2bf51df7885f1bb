use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS documents (
            collection  TEXT NOT NULL,
            id          TEXT NOT NULL,
            data        TEXT NOT NULL,
            updated_at  TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (collection, id)
        );

        CREATE INDEX IF NOT EXISTS idx_documents_collection
            ON documents(collection);

        -- sort_key() is registered on the connection before migrations run.
        CREATE INDEX IF NOT EXISTS idx_documents_created_at
            ON documents(collection, sort_key(json_extract(data, '$.createdAt')), id);

        CREATE INDEX IF NOT EXISTS idx_documents_last_active
            ON documents(collection, sort_key(json_extract(data, '$.lastActive')), id);
        ",
    )?;

    info!("Document store migrations complete");
    Ok(())
}
