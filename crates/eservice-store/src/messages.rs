use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::changes::Change;
use crate::codec::{decode_ts, decode_uuid, encode_ts, now};
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Message, NewMessage};

impl Database {
    /// Append a message, stamping it after every earlier message of the
    /// conversation.
    pub fn append_message(&self, message: &NewMessage) -> Result<Message> {
        let stored = insert_message_on(self.conn(), message, now())?;
        self.notify(Change::Messages(message.conversation_id));
        Ok(stored)
    }

    /// All messages of a conversation, oldest first.
    pub fn list_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, conversation_id, sender_uid, text, timestamp
             FROM messages
             WHERE conversation_id = ?1
             ORDER BY timestamp ASC",
        )?;

        let rows = stmt.query_map(params![conversation_id.to_string()], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    pub fn get_message_by_id(&self, id: Uuid) -> Result<Message> {
        self.conn()
            .query_row(
                "SELECT id, conversation_id, sender_uid, text, timestamp
                 FROM messages WHERE id = ?1",
                params![id.to_string()],
                row_to_message,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }
}

/// Insert `message` with a timestamp no earlier than `at` and strictly after
/// the newest message already in the conversation.
pub(crate) fn insert_message_on(
    conn: &Connection,
    message: &NewMessage,
    at: DateTime<Utc>,
) -> Result<Message> {
    let newest: Option<String> = conn
        .query_row(
            "SELECT MAX(timestamp) FROM messages WHERE conversation_id = ?1",
            params![message.conversation_id.to_string()],
            |row| row.get(0),
        )
        .optional()?
        .flatten();

    let mut timestamp = at;
    if let Some(newest) = newest {
        let newest = decode_ts(0, &newest)?;
        if timestamp <= newest {
            timestamp = newest + Duration::microseconds(1);
        }
    }

    conn.execute(
        "INSERT INTO messages (id, conversation_id, sender_uid, text, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            message.id.to_string(),
            message.conversation_id.to_string(),
            message.sender_uid.to_string(),
            message.text,
            encode_ts(&timestamp),
        ],
    )?;

    Ok(Message {
        id: message.id,
        conversation_id: message.conversation_id,
        sender_uid: message.sender_uid,
        text: message.text.clone(),
        timestamp,
    })
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let id_str: String = row.get(0)?;
    let conversation_str: String = row.get(1)?;
    let sender_str: String = row.get(2)?;
    let ts_str: String = row.get(4)?;

    Ok(Message {
        id: decode_uuid(0, &id_str)?,
        conversation_id: decode_uuid(1, &conversation_str)?,
        sender_uid: decode_uuid(2, &sender_str)?,
        text: row.get(3)?,
        timestamp: decode_ts(4, &ts_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversations::insert_conversation_on;
    use crate::conversations::tests::new_conversation;
    use crate::database::tests::temp_db;

    fn conversation(db: &Database) -> (Uuid, Uuid) {
        let (c, t) = (Uuid::new_v4(), Uuid::new_v4());
        let conv = insert_conversation_on(db.conn(), &new_conversation(c, t), now()).unwrap();
        (conv.id, c)
    }

    #[test]
    fn append_then_list_in_order() {
        let (_dir, db) = temp_db();
        let (conv, sender) = conversation(&db);

        let texts = ["first", "second", "third", "fourth"];
        for text in texts {
            db.append_message(&NewMessage::new(conv, sender, text)).unwrap();
        }

        let listed = db.list_messages(conv).unwrap();
        assert_eq!(
            listed.iter().map(|m| m.text.as_str()).collect::<Vec<_>>(),
            texts
        );
        assert!(listed.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn clock_skew_still_appends_after_newest() {
        let (_dir, db) = temp_db();
        let (conv, sender) = conversation(&db);

        let future = now() + Duration::hours(1);
        let ahead = insert_message_on(db.conn(), &NewMessage::new(conv, sender, "ahead"), future)
            .unwrap();
        let next = db.append_message(&NewMessage::new(conv, sender, "next")).unwrap();

        assert!(next.timestamp > ahead.timestamp);
        assert_eq!(db.list_messages(conv).unwrap().last().unwrap().id, next.id);
    }

    #[test]
    fn append_is_announced_per_conversation() {
        let (_dir, db) = temp_db();
        let (conv, sender) = conversation(&db);
        let mut rx = db.subscribe_changes();

        db.append_message(&NewMessage::new(conv, sender, "hi")).unwrap();
        assert_eq!(rx.try_recv().unwrap(), Change::Messages(conv));
    }

    #[test]
    fn message_needs_existing_conversation() {
        let (_dir, db) = temp_db();
        let orphan = NewMessage::new(Uuid::new_v4(), Uuid::new_v4(), "lost");
        assert!(matches!(
            db.append_message(&orphan),
            Err(StoreError::Sqlite(_))
        ));
    }

    #[test]
    fn get_by_id() {
        let (_dir, db) = temp_db();
        let (conv, sender) = conversation(&db);
        let stored = db.append_message(&NewMessage::new(conv, sender, "hi")).unwrap();
        assert_eq!(db.get_message_by_id(stored.id).unwrap(), stored);
    }
}
