//! Embedded SQL migrations
//!
//! Migrations are compiled into the binary; ids sort in application order.

/// Migration metadata
pub struct Migration {
    pub id: &'static str,
    pub sql: &'static str,
}

const INITIAL_SCHEMA: &str = r#"
CREATE TABLE trust_snapshots (
    version         TEXT PRIMARY KEY,
    major           INTEGER NOT NULL,
    minor           INTEGER NOT NULL,
    patch           INTEGER NOT NULL,
    status          TEXT NOT NULL CHECK (status IN ('active', 'retired')),
    released_at     TEXT NOT NULL,
    document        TEXT NOT NULL,
    content_digest  TEXT NOT NULL,
    created_at      INTEGER NOT NULL
);

CREATE INDEX idx_trust_snapshots_order
    ON trust_snapshots (major DESC, minor DESC, patch DESC);

CREATE TABLE trust_audit_log (
    seq         INTEGER PRIMARY KEY AUTOINCREMENT,
    id          TEXT NOT NULL UNIQUE,
    event       TEXT NOT NULL,
    actor       TEXT NOT NULL,
    role        TEXT NOT NULL,
    timestamp   TEXT NOT NULL,
    version     TEXT NOT NULL,
    reason      TEXT NOT NULL,
    metadata    TEXT
);

CREATE TRIGGER trust_audit_log_no_update
    BEFORE UPDATE ON trust_audit_log
BEGIN
    SELECT RAISE(ABORT, 'trust_audit_log is append-only');
END;

CREATE TRIGGER trust_audit_log_no_delete
    BEFORE DELETE ON trust_audit_log
BEGIN
    SELECT RAISE(ABORT, 'trust_audit_log is append-only');
END;

CREATE TABLE trust_changelog (
    version          TEXT PRIMARY KEY,
    major            INTEGER NOT NULL,
    minor            INTEGER NOT NULL,
    patch            INTEGER NOT NULL,
    date             TEXT NOT NULL,
    change_type      TEXT NOT NULL,
    summary          TEXT NOT NULL,
    customer_impact  TEXT NOT NULL,
    link             TEXT NOT NULL,
    updated_at       INTEGER NOT NULL
);
"#;

const SINGLE_ACTIVE_INDEX: &str = r#"
CREATE UNIQUE INDEX idx_trust_snapshots_single_active
    ON trust_snapshots (status)
    WHERE status = 'active';

CREATE TRIGGER trust_snapshots_no_delete
    BEFORE DELETE ON trust_snapshots
BEGIN
    SELECT RAISE(ABORT, 'trust snapshots are never deleted');
END;
"#;

/// Get all embedded migrations in order
pub fn get_migrations() -> Vec<Migration> {
    vec![
        Migration {
            id: "001_trust_schema",
            sql: INITIAL_SCHEMA,
        },
        Migration {
            id: "002_single_active_index",
            sql: SINGLE_ACTIVE_INDEX,
        },
    ]
}
