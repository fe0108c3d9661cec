use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use eservice_shared::types::ParticipantInfo;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::changes::Change;
use crate::codec::{decode_json, decode_ts, decode_uuid, encode_ts};
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Conversation, Message, NewConversation};

impl Database {
    pub fn get_conversation(&self, id: Uuid) -> Result<Conversation> {
        self.conn()
            .query_row(
                "SELECT id, participant_a, participant_b, participant_info, last_message_text, updated_at
                 FROM conversations WHERE id = ?1",
                params![id.to_string()],
                row_to_conversation,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Conversations `uid` takes part in, most recently active first.
    pub fn list_conversations_for(&self, uid: Uuid) -> Result<Vec<Conversation>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, participant_a, participant_b, participant_info, last_message_text, updated_at
             FROM conversations
             WHERE participant_a = ?1 OR participant_b = ?1
             ORDER BY updated_at DESC, id ASC",
        )?;

        let rows = stmt.query_map(params![uid.to_string()], row_to_conversation)?;

        let mut conversations = Vec::new();
        for row in rows {
            conversations.push(row?);
        }
        Ok(conversations)
    }

    /// Point the conversation preview at `message`.
    ///
    /// The preview only moves forward: if a message with a later timestamp
    /// already holds it, nothing is written and `false` is returned.
    pub fn touch_conversation(&self, message: &Message) -> Result<bool> {
        let id = message.conversation_id.to_string();
        let affected = self.conn().execute(
            "UPDATE conversations SET last_message_text = ?2, updated_at = ?3
             WHERE id = ?1 AND updated_at <= ?3",
            params![id, message.text, encode_ts(&message.timestamp)],
        )?;
        if affected == 0 {
            let exists: bool = self.conn().query_row(
                "SELECT EXISTS(SELECT 1 FROM conversations WHERE id = ?1)",
                params![id],
                |row| row.get(0),
            )?;
            if !exists {
                return Err(StoreError::NotFound);
            }
            return Ok(false);
        }

        self.notify(Change::Conversations);
        Ok(true)
    }
}

pub(crate) fn insert_conversation_on(
    conn: &Connection,
    new: &NewConversation,
    updated_at: DateTime<Utc>,
) -> Result<Conversation> {
    let [a, b] = new.participant_uids;
    if a == b {
        return Err(StoreError::Conflict(
            "a conversation needs two distinct participants".to_string(),
        ));
    }

    conn.execute(
        "INSERT INTO conversations (id, participant_a, participant_b, participant_info, last_message_text, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            new.id.to_string(),
            a.to_string(),
            b.to_string(),
            serde_json::to_string(&new.participant_info)?,
            new.last_message_text,
            encode_ts(&updated_at),
        ],
    )?;

    Ok(Conversation {
        id: new.id,
        participant_uids: new.participant_uids,
        participant_info: new.participant_info.clone(),
        last_message_text: new.last_message_text.clone(),
        updated_at,
    })
}

fn row_to_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    let id_str: String = row.get(0)?;
    let a_str: String = row.get(1)?;
    let b_str: String = row.get(2)?;
    let info_json: String = row.get(3)?;
    let updated_str: String = row.get(5)?;

    Ok(Conversation {
        id: decode_uuid(0, &id_str)?,
        participant_uids: [decode_uuid(1, &a_str)?, decode_uuid(2, &b_str)?],
        participant_info: decode_json::<BTreeMap<Uuid, ParticipantInfo>>(3, &info_json)?,
        last_message_text: row.get(4)?,
        updated_at: decode_ts(5, &updated_str)?,
    })
}
