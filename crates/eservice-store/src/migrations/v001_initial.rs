//! v001 -- Initial schema creation.
//!
//! Creates `profiles`, `accounts` and `requests`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Profiles
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS profiles (
    id         TEXT PRIMARY KEY NOT NULL,   -- UUID v4, same as the identity id
    full_name  TEXT NOT NULL,
    email      TEXT NOT NULL,
    role       TEXT NOT NULL,               -- 'customer' | 'technician'
    avatar_url TEXT NOT NULL,
    skills     TEXT,                        -- JSON array, technicians only
    created_at TEXT NOT NULL                -- RFC-3339, microseconds
);

-- ----------------------------------------------------------------
-- Accounts (email/password credentials)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS accounts (
    user_id       TEXT PRIMARY KEY NOT NULL,
    email         TEXT NOT NULL UNIQUE COLLATE NOCASE,
    password_hash TEXT NOT NULL,            -- hex-encoded BLAKE3 output
    salt          TEXT NOT NULL,            -- hex-encoded 16 random bytes
    created_at    TEXT NOT NULL,

    FOREIGN KEY (user_id) REFERENCES profiles(id)
);

-- ----------------------------------------------------------------
-- Service requests
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS requests (
    id                      TEXT PRIMARY KEY NOT NULL,
    customer_id             TEXT NOT NULL,
    assigned_technician_uid TEXT,           -- NULL until accepted
    customer_name           TEXT NOT NULL,
    customer_avatar         TEXT NOT NULL,
    service_category        TEXT NOT NULL,
    description             TEXT NOT NULL,
    location                TEXT NOT NULL,
    date_time               TEXT NOT NULL,  -- scheduled visit
    urgency                 TEXT NOT NULL,
    status                  TEXT NOT NULL,
    invoice                 TEXT,           -- JSON, immutable once set
    payment_status          TEXT NOT NULL DEFAULT 'none',
    technician_rating       TEXT,           -- JSON
    customer_rating         TEXT,           -- JSON
    photo                   TEXT,
    created_at              TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_requests_customer_dt
    ON requests(customer_id, date_time DESC);

CREATE INDEX IF NOT EXISTS idx_requests_dt
    ON requests(date_time DESC);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
