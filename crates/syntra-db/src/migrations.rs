use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS snippets (
            id          TEXT PRIMARY KEY,
            title       TEXT NOT NULL,
            description TEXT,
            language    TEXT NOT NULL,
            code        TEXT NOT NULL,
            author_id   TEXT NOT NULL,
            status      TEXT NOT NULL DEFAULT 'Pending Review'
                        CHECK (status IN ('Pending Review', 'Reviewed')),
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS comments (
            id          TEXT PRIMARY KEY,
            snippet_id  TEXT NOT NULL REFERENCES snippets(id) ON DELETE CASCADE,
            line        INTEGER NOT NULL CHECK (line >= 0),
            text        TEXT NOT NULL,
            author_id   TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_comments_snippet
            ON comments(snippet_id, created_at);

        -- No foreign key: an edit aimed at a missing snippet is still logged.
        CREATE TABLE IF NOT EXISTS change_history (
            seq         INTEGER PRIMARY KEY AUTOINCREMENT,
            id          TEXT NOT NULL UNIQUE,
            snippet_id  TEXT NOT NULL,
            actor       TEXT NOT NULL,
            kind        TEXT NOT NULL CHECK (kind IN ('comment', 'code-change')),
            detail      TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_change_history_snippet
            ON change_history(snippet_id, created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
