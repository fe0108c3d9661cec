use eservice_shared::types::{PaymentStatus, Rating, RatingSide};
use eservice_shared::validation::validate_rating;
use tracing::info;
use uuid::Uuid;

use super::{is_assignee, is_owner, logged, request_missing, TransitionEngine};
use crate::error::ClientError;
use crate::state::with_db;

impl TransitionEngine {
    /// Rate the other party of a paid request.  Each side can be written
    /// once, by its author: the owning customer or the assigned technician.
    pub async fn add_rating(&self, id: Uuid, side: RatingSide, rating: Rating) -> Result<(), ClientError> {
        logged("add_rating", id, self.add_rating_inner(id, side, rating).await)
    }

    async fn add_rating_inner(&self, id: Uuid, side: RatingSide, rating: Rating) -> Result<(), ClientError> {
        let caller = self.signed_in_as(side.author_role(), "write this rating")?;
        let request = self.lookup(id)?;

        let related = match side {
            RatingSide::Customer => is_owner(&caller, &request),
            RatingSide::Technician => is_assignee(&caller, &request),
        };
        if !related {
            return Err(ClientError::Forbidden(format!(
                "{} is not a party to request {id}",
                caller.id
            )));
        }
        if request.payment_status != PaymentStatus::Paid {
            return Err(ClientError::InvalidState(format!(
                "request {id} is not paid yet"
            )));
        }
        if request.rating(side).is_some() {
            return Err(ClientError::InvalidState(format!(
                "request {id} already has a {side:?} rating"
            )));
        }
        validate_rating(&rating)?;

        let stars = rating.stars;
        with_db(&self.db, move |db| db.set_rating(id, side, &rating))
            .await
            .map_err(request_missing(id))?;

        info!(request = %id, ?side, stars, "rating recorded");
        Ok(())
    }
}
