use rusqlite::Connection;

use crate::error::Result;

/// Initialise all five core tables. Safe to call on every startup — uses
/// `IF NOT EXISTS` throughout. See SPEC_FULL.md §4.1 / §6.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS messages (
            id         TEXT PRIMARY KEY,
            channel    TEXT NOT NULL,
            chat_id    TEXT NOT NULL,
            sender_id  TEXT NOT NULL,
            role       TEXT NOT NULL,
            text       TEXT NOT NULL,
            trace_id   TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_messages_chat
            ON messages(chat_id, created_at);

        CREATE TABLE IF NOT EXISTS ledger (
            message_id TEXT NOT NULL,
            direction  TEXT NOT NULL,
            chat_id    TEXT NOT NULL,
            created_at TEXT NOT NULL,
            PRIMARY KEY (message_id)
        );

        CREATE TABLE IF NOT EXISTS pending_actions (
            action_id      TEXT PRIMARY KEY,
            chat_id        TEXT NOT NULL,
            tool_name      TEXT NOT NULL,
            risk_level     TEXT NOT NULL,
            proposed_args  TEXT NOT NULL,
            status         TEXT NOT NULL,
            expires_at     TEXT NOT NULL,
            created_at     TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_pending_chat
            ON pending_actions(chat_id, created_at DESC);

        CREATE TABLE IF NOT EXISTS jobs (
            job_id       TEXT PRIMARY KEY,
            chat_id      TEXT NOT NULL,
            when_spec    TEXT NOT NULL,
            text         TEXT NOT NULL,
            kind         TEXT NOT NULL,
            next_run_at  TEXT,
            created_at   TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS audit_log (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            trace_id   TEXT NOT NULL,
            event      TEXT NOT NULL,
            payload    TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_audit_trace ON audit_log(trace_id);",
    )?;
    Ok(())
}
