//! Invoicing and payment.

use eservice_shared::types::{Invoice, InvoiceDraft, PaymentStatus, RequestStatus, Role};
use eservice_shared::validation::validate_invoice;
use eservice_store::store_timestamp;
use tracing::info;
use uuid::Uuid;

use super::{logged, request_missing, TransitionEngine};
use crate::error::ClientError;
use crate::state::with_db;

impl TransitionEngine {
    /// Attach an invoice to a completed request.  Only the assigned
    /// technician may do this, and only once; payment becomes `pending`.
    pub async fn create_invoice(&self, id: Uuid, draft: InvoiceDraft) -> Result<Invoice, ClientError> {
        logged("create_invoice", id, self.create_invoice_inner(id, draft).await)
    }

    async fn create_invoice_inner(&self, id: Uuid, draft: InvoiceDraft) -> Result<Invoice, ClientError> {
        let caller = self.signed_in_as(Role::Technician, "issue invoices")?;
        let request = self.lookup(id)?;
        if !request.is_assigned_to(caller.id) {
            return Err(ClientError::Forbidden(format!(
                "request {id} is not assigned to {}",
                caller.id
            )));
        }
        if request.status != RequestStatus::Completed {
            return Err(ClientError::InvalidState(format!(
                "request {id} is {}, not Completed",
                request.status
            )));
        }
        if request.invoice.is_some() {
            return Err(ClientError::InvalidState(format!(
                "request {id} already has an invoice"
            )));
        }
        request.payment_status.advance_to(PaymentStatus::Pending)?;
        validate_invoice(&draft)?;

        let invoice = draft.issue(store_timestamp());
        let stored = invoice.clone();
        with_db(&self.db, move |db| db.attach_invoice(id, &stored))
            .await
            .map_err(request_missing(id))?;

        info!(request = %id, total = invoice.total, items = invoice.items.len(), "invoice issued");
        Ok(invoice)
    }

    /// Record payment of the invoice by the owning customer.
    pub async fn mark_paid(&self, id: Uuid) -> Result<(), ClientError> {
        logged("mark_paid", id, self.mark_paid_inner(id).await)
    }

    async fn mark_paid_inner(&self, id: Uuid) -> Result<(), ClientError> {
        let caller = self.signed_in_as(Role::Customer, "pay invoices")?;
        let request = self.lookup(id)?;
        if request.customer_id != caller.id {
            return Err(ClientError::Forbidden(format!(
                "request {id} belongs to another customer"
            )));
        }
        request.payment_status.advance_to(PaymentStatus::Paid)?;

        with_db(&self.db, move |db| db.mark_paid(id))
            .await
            .map_err(request_missing(id))?;

        info!(request = %id, customer = %caller.id, "invoice paid");
        Ok(())
    }
}
