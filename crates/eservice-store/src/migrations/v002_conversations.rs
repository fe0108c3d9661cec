use rusqlite::Connection;

const UP_SQL: &str = r#"
-- Two-party threads opened when a request is accepted
CREATE TABLE IF NOT EXISTS conversations (
    id                TEXT PRIMARY KEY NOT NULL,
    participant_a     TEXT NOT NULL,       -- customer
    participant_b     TEXT NOT NULL,       -- technician
    participant_info  TEXT NOT NULL,       -- JSON map id -> {fullName, avatarUrl}
    last_message_text TEXT NOT NULL,
    updated_at        TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_conversations_a ON conversations(participant_a, updated_at DESC);
CREATE INDEX IF NOT EXISTS idx_conversations_b ON conversations(participant_b, updated_at DESC);

-- Append-only thread messages
CREATE TABLE IF NOT EXISTS messages (
    id              TEXT PRIMARY KEY NOT NULL,
    conversation_id TEXT NOT NULL,
    sender_uid      TEXT NOT NULL,
    text            TEXT NOT NULL,
    timestamp       TEXT NOT NULL,         -- strictly increasing per conversation

    FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_messages_conversation_ts
    ON messages(conversation_id, timestamp ASC);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
