//! Credential records backing the auth collaborator.

use rusqlite::{params, OptionalExtension};

use crate::changes::Change;
use crate::codec::{decode_ts, decode_uuid, encode_ts};
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Account, Profile};
use crate::profiles::insert_profile_on;

impl Database {
    /// Create an account together with its profile in one transaction.
    ///
    /// Fails with [`StoreError::Conflict`] if the email is already registered
    /// (compared case-insensitively).
    pub fn register_account(&mut self, account: &Account, profile: &Profile) -> Result<()> {
        let tx = self.conn_mut().transaction()?;

        let taken: Option<String> = tx
            .query_row(
                "SELECT user_id FROM accounts WHERE email = ?1",
                params![account.email],
                |row| row.get(0),
            )
            .optional()?;
        if taken.is_some() {
            return Err(StoreError::Conflict(format!(
                "email {} already registered",
                account.email
            )));
        }

        insert_profile_on(&tx, profile)?;
        tx.execute(
            "INSERT INTO accounts (user_id, email, password_hash, salt, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                account.user_id.to_string(),
                account.email,
                account.password_hash,
                account.salt,
                encode_ts(&account.created_at),
            ],
        )?;

        tx.commit()?;
        self.notify(Change::Profiles);

        tracing::info!(user = %account.user_id, "account registered");
        Ok(())
    }

    /// Look up credentials by email (case-insensitive).
    pub fn find_account_by_email(&self, email: &str) -> Result<Account> {
        self.conn()
            .query_row(
                "SELECT user_id, email, password_hash, salt, created_at
                 FROM accounts WHERE email = ?1",
                params![email],
                |row| {
                    let id_str: String = row.get(0)?;
                    let created_str: String = row.get(4)?;
                    Ok(Account {
                        user_id: decode_uuid(0, &id_str)?,
                        email: row.get(1)?,
                        password_hash: row.get(2)?,
                        salt: row.get(3)?,
                        created_at: decode_ts(4, &created_str)?,
                    })
                },
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }
}
