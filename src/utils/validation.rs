//! Validation utilities

use crate::types::*;
use bigdecimal::BigDecimal;

/// Validate that an entity id is non-empty and reasonably sized.
pub fn validate_id(entity: &'static str, id: &str) -> BookResult<()> {
    if id.trim().is_empty() {
        return Err(BookkeepingError::Validation {
            field: entity,
            message: "id cannot be empty".to_string(),
        });
    }

    if id.len() > 50 {
        return Err(BookkeepingError::Validation {
            field: entity,
            message: "id cannot exceed 50 characters".to_string(),
        });
    }

    Ok(())
}

/// Validate that a human-readable name is present.
pub fn validate_name(entity: &'static str, name: &str) -> BookResult<()> {
    if name.trim().is_empty() {
        return Err(BookkeepingError::Validation {
            field: entity,
            message: "name cannot be empty".to_string(),
        });
    }

    if name.len() > 200 {
        return Err(BookkeepingError::Validation {
            field: entity,
            message: "name cannot exceed 200 characters".to_string(),
        });
    }

    Ok(())
}

/// Validate that a journal entry detail amount is not negative.
pub fn validate_non_negative_amount(field: &'static str, amount: &BigDecimal) -> BookResult<()> {
    if *amount < BigDecimal::from(0) {
        return Err(BookkeepingError::Validation {
            field,
            message: format!("amount must not be negative, got {amount}"),
        });
    }

    Ok(())
}
