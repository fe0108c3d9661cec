//! CRUD operations for [`Profile`] records.

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::changes::Change;
use crate::codec::{decode_enum, decode_json, decode_ts, decode_uuid, encode_ts};
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Profile;

impl Database {
    /// Insert a new profile.
    pub fn insert_profile(&self, profile: &Profile) -> Result<()> {
        insert_profile_on(self.conn(), profile)?;
        self.notify(Change::Profiles);
        Ok(())
    }

    /// Fetch the profile of an identity.
    pub fn get_profile(&self, id: Uuid) -> Result<Profile> {
        self.conn()
            .query_row(
                "SELECT id, full_name, email, role, avatar_url, skills, created_at
                 FROM profiles WHERE id = ?1",
                params![id.to_string()],
                row_to_profile,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }
}

pub(crate) fn insert_profile_on(conn: &Connection, profile: &Profile) -> Result<()> {
    let skills = profile
        .skills
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    conn.execute(
        "INSERT INTO profiles (id, full_name, email, role, avatar_url, skills, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            profile.id.to_string(),
            profile.full_name,
            profile.email,
            profile.role.as_str(),
            profile.avatar_url,
            skills,
            encode_ts(&profile.created_at),
        ],
    )?;
    Ok(())
}

fn row_to_profile(row: &rusqlite::Row<'_>) -> rusqlite::Result<Profile> {
    let id_str: String = row.get(0)?;
    let role_str: String = row.get(3)?;
    let skills_json: Option<String> = row.get(5)?;
    let created_str: String = row.get(6)?;

    Ok(Profile {
        id: decode_uuid(0, &id_str)?,
        full_name: row.get(1)?,
        email: row.get(2)?,
        role: decode_enum(3, &role_str)?,
        avatar_url: row.get(4)?,
        skills: skills_json
            .map(|json| decode_json::<Vec<String>>(5, &json))
            .transpose()?,
        created_at: decode_ts(6, &created_str)?,
    })
}
