//! Draw requirements: validation and the load/save path.

use shared::{
    domain::{decimal_len, Requirements},
    error::DrawError,
};
use tracing::info;

use crate::store::RequirementsStore;

pub const MIN_TOTAL_DIGITS: u32 = 3;

/// Collects every rule the settings form enforces.
pub fn validate_requirements(requirements: &Requirements) -> Result<(), DrawError> {
    let mut violations = Vec::new();

    if requirements.event_name.trim().is_empty() {
        violations.push("event name cannot be left empty".to_string());
    }
    if requirements.main_prize_count < 1 {
        violations.push("main prize count must be greater than or equal to 1".to_string());
    }
    if requirements.consolation_prize_count < 1 {
        violations
            .push("consolation prize count must be greater than or equal to 1".to_string());
    }
    if requirements.total_digits < MIN_TOTAL_DIGITS {
        violations.push(format!(
            "total digits must be greater than or equal to {MIN_TOTAL_DIGITS}"
        ));
    }
    let widest_bound =
        decimal_len(requirements.min_range).max(decimal_len(requirements.max_range));
    if widest_bound > requirements.width() {
        violations.push("total digits must cover the length of both range bounds".to_string());
    }
    if requirements.min_range >= requirements.max_range {
        violations.push("from value must be less than to value".to_string());
    }

    let range_size =
        i128::from(requirements.max_range) - i128::from(requirements.min_range) + 1;
    if range_size < requirements.total_prizes() as i128 {
        violations.push(format!(
            "range {}..={} holds fewer numbers than the {} prizes configured",
            requirements.min_range,
            requirements.max_range,
            requirements.total_prizes()
        ));
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(DrawError::InvalidRequirements(violations))
    }
}

pub async fn load_requirements<S>(store: &S) -> Result<Requirements, DrawError>
where
    S: RequirementsStore + ?Sized,
{
    store
        .get_requirements()
        .await?
        .ok_or(DrawError::ConfigurationMissing)
}

/// Validates then overwrites the stored requirements. Nothing is written on failure.
pub async fn save_requirements<S>(store: &S, requirements: &Requirements) -> Result<(), DrawError>
where
    S: RequirementsStore + ?Sized,
{
    validate_requirements(requirements)?;
    store.save_requirements(requirements).await?;
    info!(
        event_name = %requirements.event_name,
        main = requirements.main_prize_count,
        consolation = requirements.consolation_prize_count,
        digits = requirements.total_digits,
        min = requirements.min_range,
        max = requirements.max_range,
        "saved draw requirements"
    );
    Ok(())
}

#[cfg(test)]
#[path = "tests/settings_tests.rs"]
mod tests;
