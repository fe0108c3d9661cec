//! Service request collection.
//!
//! Every mutation after creation is a conditional update: the `WHERE` clause
//! pins the state the caller validated against, so a write based on a stale
//! snapshot fails with [`StoreError::Conflict`] instead of overwriting newer
//! state.

use eservice_shared::types::{Invoice, PaymentStatus, Rating, RatingSide, RequestStatus};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::changes::Change;
use crate::codec::{decode_enum, decode_json, decode_ts, decode_uuid, encode_ts};
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::ServiceRequest;

const REQUEST_COLUMNS: &str = "id, customer_id, assigned_technician_uid, customer_name, \
     customer_avatar, service_category, description, location, date_time, urgency, status, \
     invoice, payment_status, technician_rating, customer_rating, photo, created_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    pub fn insert_request(&self, request: &ServiceRequest) -> Result<()> {
        let invoice = request.invoice.as_ref().map(serde_json::to_string).transpose()?;
        let technician_rating = request
            .technician_rating
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let customer_rating = request
            .customer_rating
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.conn().execute(
            &format!(
                "INSERT INTO requests ({REQUEST_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"
            ),
            params![
                request.id.to_string(),
                request.customer_id.to_string(),
                request.assigned_technician_uid.map(|u| u.to_string()),
                request.customer_name,
                request.customer_avatar,
                request.service_category,
                request.description,
                request.location,
                encode_ts(&request.date_time),
                request.urgency.as_str(),
                request.status.as_str(),
                invoice,
                request.payment_status.as_str(),
                technician_rating,
                customer_rating,
                request.photo,
                encode_ts(&request.created_at),
            ],
        )?;

        self.notify(Change::Requests);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_request(&self, id: Uuid) -> Result<ServiceRequest> {
        self.conn()
            .query_row(
                &format!("SELECT {REQUEST_COLUMNS} FROM requests WHERE id = ?1"),
                params![id.to_string()],
                row_to_request,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Requests owned by one customer, latest scheduled visit first.
    pub fn list_requests_for_customer(&self, customer_id: Uuid) -> Result<Vec<ServiceRequest>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {REQUEST_COLUMNS} FROM requests
             WHERE customer_id = ?1
             ORDER BY date_time DESC, created_at DESC"
        ))?;

        let rows = stmt.query_map(params![customer_id.to_string()], row_to_request)?;

        let mut requests = Vec::new();
        for row in rows {
            requests.push(row?);
        }
        Ok(requests)
    }

    /// Every request, latest scheduled visit first.
    pub fn list_requests(&self) -> Result<Vec<ServiceRequest>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {REQUEST_COLUMNS} FROM requests
             ORDER BY date_time DESC, created_at DESC"
        ))?;

        let rows = stmt.query_map([], row_to_request)?;

        let mut requests = Vec::new();
        for row in rows {
            requests.push(row?);
        }
        Ok(requests)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Move `id` from `from` to `to`.  Does not touch the assignee; use a
    /// [`WriteBatch`](crate::WriteBatch) to accept a request.
    pub fn set_request_status(
        &self,
        id: Uuid,
        from: RequestStatus,
        to: RequestStatus,
    ) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE requests SET status = ?3 WHERE id = ?1 AND status = ?2",
            params![id.to_string(), from.as_str(), to.as_str()],
        )?;
        expect_one(self.conn(), affected, id, || format!("status is no longer {from}"))?;

        self.notify(Change::Requests);
        Ok(())
    }

    /// Attach an invoice to a completed, uninvoiced request and mark its
    /// payment as pending.
    pub fn attach_invoice(&self, id: Uuid, invoice: &Invoice) -> Result<()> {
        let json = serde_json::to_string(invoice)?;
        let affected = self.conn().execute(
            "UPDATE requests SET invoice = ?2, payment_status = ?3
             WHERE id = ?1 AND status = ?4 AND payment_status = ?5 AND invoice IS NULL",
            params![
                id.to_string(),
                json,
                PaymentStatus::Pending.as_str(),
                RequestStatus::Completed.as_str(),
                PaymentStatus::None.as_str(),
            ],
        )?;
        expect_one(self.conn(), affected, id, || {
            "request is not an uninvoiced completed job".to_string()
        })?;

        self.notify(Change::Requests);
        Ok(())
    }

    /// Settle a pending payment.
    pub fn mark_paid(&self, id: Uuid) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE requests SET payment_status = ?2 WHERE id = ?1 AND payment_status = ?3",
            params![
                id.to_string(),
                PaymentStatus::Paid.as_str(),
                PaymentStatus::Pending.as_str(),
            ],
        )?;
        expect_one(self.conn(), affected, id, || "payment is not pending".to_string())?;

        self.notify(Change::Requests);
        Ok(())
    }

    /// Write one side's rating on a paid request.  A side can rate once.
    pub fn set_rating(&self, id: Uuid, side: RatingSide, rating: &Rating) -> Result<()> {
        let column = match side {
            RatingSide::Customer => "customer_rating",
            RatingSide::Technician => "technician_rating",
        };
        let json = serde_json::to_string(rating)?;
        let affected = self.conn().execute(
            &format!(
                "UPDATE requests SET {column} = ?2
                 WHERE id = ?1 AND payment_status = ?3 AND {column} IS NULL"
            ),
            params![id.to_string(), json, PaymentStatus::Paid.as_str()],
        )?;
        expect_one(self.conn(), affected, id, || {
            format!("{column} already set or request unpaid")
        })?;

        self.notify(Change::Requests);
        Ok(())
    }
}

/// Accept a pending, unassigned request on behalf of `technician_id`.
pub(crate) fn accept_request_on(conn: &Connection, id: Uuid, technician_id: Uuid) -> Result<()> {
    let affected = conn.execute(
        "UPDATE requests SET status = ?2, assigned_technician_uid = ?3
         WHERE id = ?1 AND status = ?4 AND assigned_technician_uid IS NULL",
        params![
            id.to_string(),
            RequestStatus::Accepted.as_str(),
            technician_id.to_string(),
            RequestStatus::Pending.as_str(),
        ],
    )?;
    expect_one(conn, affected, id, || {
        "request is no longer pending and unassigned".to_string()
    })
}

/// Turn a zero-row conditional update into `NotFound` or `Conflict`.
fn expect_one(
    conn: &Connection,
    affected: usize,
    id: Uuid,
    why: impl FnOnce() -> String,
) -> Result<()> {
    if affected > 0 {
        return Ok(());
    }
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM requests WHERE id = ?1)",
        params![id.to_string()],
        |row| row.get(0),
    )?;
    if exists {
        Err(StoreError::Conflict(format!("request {id}: {}", why())))
    } else {
        Err(StoreError::NotFound)
    }
}

fn row_to_request(row: &rusqlite::Row<'_>) -> rusqlite::Result<ServiceRequest> {
    let id_str: String = row.get(0)?;
    let customer_str: String = row.get(1)?;
    let assignee_str: Option<String> = row.get(2)?;
    let date_str: String = row.get(8)?;
    let urgency_str: String = row.get(9)?;
    let status_str: String = row.get(10)?;
    let invoice_json: Option<String> = row.get(11)?;
    let payment_str: String = row.get(12)?;
    let tech_rating_json: Option<String> = row.get(13)?;
    let cust_rating_json: Option<String> = row.get(14)?;
    let created_str: String = row.get(16)?;

    Ok(ServiceRequest {
        id: decode_uuid(0, &id_str)?,
        customer_id: decode_uuid(1, &customer_str)?,
        assigned_technician_uid: assignee_str.map(|s| decode_uuid(2, &s)).transpose()?,
        customer_name: row.get(3)?,
        customer_avatar: row.get(4)?,
        service_category: row.get(5)?,
        description: row.get(6)?,
        location: row.get(7)?,
        date_time: decode_ts(8, &date_str)?,
        urgency: decode_enum(9, &urgency_str)?,
        status: decode_enum(10, &status_str)?,
        invoice: invoice_json.map(|j| decode_json(11, &j)).transpose()?,
        payment_status: decode_enum(12, &payment_str)?,
        technician_rating: tech_rating_json.map(|j| decode_json(13, &j)).transpose()?,
        customer_rating: cust_rating_json.map(|j| decode_json(14, &j)).transpose()?,
        photo: row.get(15)?,
        created_at: decode_ts(16, &created_str)?,
    })
}
