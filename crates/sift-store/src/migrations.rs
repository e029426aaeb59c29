//! Schema migrations gated on `PRAGMA user_version`.
//!
//! Each migration runs inside a transaction and bumps `user_version` on
//! success, so a crash mid-migration leaves the database at the prior
//! version and the migration re-runs cleanly.

use rusqlite::Connection;
use tracing::debug;

use crate::errors::Result;

const MIGRATIONS: &[&str] = &[
    // v1 — runs and steps
    "
    CREATE TABLE runs (
        id            TEXT PRIMARY KEY,
        project_id    TEXT NOT NULL,
        tenant_id     TEXT NOT NULL,
        mode          TEXT NOT NULL CHECK (mode IN ('sequential', 'parallel')),
        agents        TEXT NOT NULL,
        status        TEXT NOT NULL CHECK (status IN ('queued', 'running', 'completed', 'failed', 'cancelled')),
        total_tokens  INTEGER NOT NULL DEFAULT 0,
        total_cost    REAL NOT NULL DEFAULT 0,
        error         TEXT,
        created_by    TEXT,
        created_at    TEXT NOT NULL,
        started_at    TEXT,
        completed_at  TEXT
    );
    CREATE INDEX idx_runs_project_created ON runs (project_id, created_at DESC);

    CREATE TABLE steps (
        id              TEXT PRIMARY KEY,
        run_id          TEXT NOT NULL REFERENCES runs (id) ON DELETE CASCADE,
        agent           TEXT NOT NULL,
        position        INTEGER NOT NULL,
        status          TEXT NOT NULL CHECK (status IN ('queued', 'running', 'completed', 'failed')),
        progress        INTEGER NOT NULL DEFAULT 0 CHECK (progress BETWEEN 0 AND 100),
        progress_label  TEXT,
        tokens_used     INTEGER NOT NULL DEFAULT 0,
        artifact_id     TEXT,
        error           TEXT,
        started_at      TEXT,
        completed_at    TEXT,
        UNIQUE (run_id, position)
    );
    CREATE INDEX idx_steps_run_position ON steps (run_id, position);
    ",
];

/// Run all pending migrations. Idempotent.
pub fn run_migrations(conn: &mut Connection) -> Result<u32> {
    let current: u32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    let mut applied = 0;

    for (idx, sql) in MIGRATIONS.iter().enumerate() {
        let version = (idx + 1) as u32;
        if version <= current {
            continue;
        }
        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", version)?;
        tx.commit()?;
        debug!(version, "applied migration");
        applied += 1;
    }

    Ok(applied)
}
