// src/database.rs

use log::debug;
use rusqlite::{Connection, Result};

pub fn init_db(conn: &Connection) -> Result<()> {
    debug!("init_db: Checking database schema...");

    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS profiles (
            id TEXT PRIMARY KEY,
            display_name TEXT NOT NULL,
            is_premium INTEGER NOT NULL DEFAULT 0,
            is_admin INTEGER NOT NULL DEFAULT 0,
            total_xp INTEGER NOT NULL DEFAULT 0,
            level INTEGER NOT NULL DEFAULT 1,
            badges TEXT NOT NULL DEFAULT '[]',
            streak_days INTEGER NOT NULL DEFAULT 0,
            last_active_on TEXT,
            updated_at INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS attempts (
            id INTEGER PRIMARY KEY,
            user_id TEXT NOT NULL,
            course_id TEXT NOT NULL,
            day INTEGER NOT NULL,
            task_id TEXT,
            kind TEXT NOT NULL CHECK (kind IN ('practice','arena','gym')),
            score INTEGER NOT NULL,
            total_questions INTEGER NOT NULL,
            accuracy_percent INTEGER NOT NULL,
            time_taken_seconds INTEGER NOT NULL,
            passed INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_attempts_lookup
            ON attempts (user_id, course_id, day, created_at);
        CREATE TABLE IF NOT EXISTS daily_progress (
            user_id TEXT NOT NULL,
            course_id TEXT NOT NULL,
            day INTEGER NOT NULL,
            notes_read INTEGER NOT NULL DEFAULT 0,
            practice_score REAL,
            compete_score REAL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (user_id, course_id, day)
        );
        CREATE TABLE IF NOT EXISTS reviews (
            user_id TEXT NOT NULL,
            course_id TEXT NOT NULL,
            card_id TEXT NOT NULL,
            front TEXT NOT NULL,
            back TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (user_id, course_id, card_id)
        );
        CREATE TABLE IF NOT EXISTS payment_requests (
            id INTEGER PRIMARY KEY,
            user_id TEXT NOT NULL,
            transaction_id TEXT UNIQUE NOT NULL,
            amount_inr INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending','approved','rejected')),
            created_at INTEGER NOT NULL,
            decided_by TEXT,
            decided_at INTEGER
        );
        CREATE TABLE IF NOT EXISTS payment_audit (
            id INTEGER PRIMARY KEY,
            request_id INTEGER NOT NULL REFERENCES payment_requests(id),
            actor TEXT NOT NULL,
            from_status TEXT NOT NULL,
            to_status TEXT NOT NULL,
            note TEXT,
            at INTEGER NOT NULL
        );
        ",
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        init_db(&conn).unwrap();
        let tables: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type = 'table'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(tables, 6);
    }
}
