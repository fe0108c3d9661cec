//! Input checks shared by the client write paths.

use crate::constants::{
    INVOICE_TOTAL_TOLERANCE, MAX_RATING_STARS, MIN_RATING_STARS, TECHNICIAN_SKILLS,
};
use crate::error::ValidationError;
use crate::types::{InvoiceDraft, Rating, Role};

/// Reject empty or whitespace-only text for the named field.
pub fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Blank(field));
    }
    Ok(())
}

pub fn validate_invoice(draft: &InvoiceDraft) -> Result<(), ValidationError> {
    if draft.items.is_empty() {
        return Err(ValidationError::EmptyInvoice);
    }

    for (index, item) in draft.items.iter().enumerate() {
        if item.description.trim().is_empty() {
            return Err(ValidationError::UnnamedItem { index });
        }
        if !item.cost.is_finite() || item.cost <= 0.0 {
            return Err(ValidationError::InvalidCost {
                index,
                cost: item.cost,
            });
        }
    }

    let sum: f64 = draft.items.iter().map(|i| i.cost).sum();
    if !draft.total.is_finite() || (draft.total - sum).abs() > INVOICE_TOTAL_TOLERANCE {
        return Err(ValidationError::TotalMismatch {
            total: draft.total,
            sum,
        });
    }

    Ok(())
}

pub fn validate_rating(rating: &Rating) -> Result<(), ValidationError> {
    if !(MIN_RATING_STARS..=MAX_RATING_STARS).contains(&rating.stars) {
        return Err(ValidationError::Stars(rating.stars));
    }
    Ok(())
}

/// Technicians need at least one known skill; customers carry none.
pub fn validate_skills(role: Role, skills: &[String]) -> Result<(), ValidationError> {
    match role {
        Role::Customer if !skills.is_empty() => Err(ValidationError::UnexpectedSkills),
        Role::Customer => Ok(()),
        Role::Technician => {
            if skills.is_empty() {
                return Err(ValidationError::MissingSkills);
            }
            if let Some(unknown) = skills
                .iter()
                .find(|s| !TECHNICIAN_SKILLS.contains(&s.as_str()))
            {
                return Err(ValidationError::UnknownSkill(unknown.clone()));
            }
            Ok(())
        }
    }
}
