//! Inventory validation against the active requirements. Pure: nothing is written.

use std::collections::HashSet;

use shared::{
    domain::{decimal_len, pad_coupon, parse_coupon_value, Requirements},
    error::DrawError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryReport {
    pub entries: usize,
    /// Distinct values after zero-padding to the configured width.
    pub distinct: usize,
    pub required: usize,
    pub problematic: Vec<String>,
}

impl InventoryReport {
    pub fn is_ok(&self) -> bool {
        self.entries > 0 && self.problematic.is_empty() && self.is_sufficient()
    }

    pub fn is_sufficient(&self) -> bool {
        self.entries >= self.required && self.distinct >= self.required
    }

    /// Empty or out-of-bounds inventories.
    pub fn check_structure(&self) -> Result<(), DrawError> {
        if self.entries == 0 {
            return Err(DrawError::InventoryEmpty);
        }
        if !self.problematic.is_empty() {
            return Err(DrawError::InventoryInvalid {
                values: self.problematic.clone(),
            });
        }
        Ok(())
    }

    pub fn check(&self) -> Result<(), DrawError> {
        self.check_structure()?;
        if !self.is_sufficient() {
            return Err(DrawError::InventoryInsufficient {
                required: self.required,
                available: self.distinct.min(self.entries),
            });
        }
        Ok(())
    }
}

pub fn is_problematic(raw: &str, requirements: &Requirements) -> bool {
    match parse_coupon_value(raw) {
        None => true,
        Some(value) => {
            value < requirements.min_range
                || value > requirements.max_range
                || decimal_len(value) > requirements.width()
        }
    }
}

pub fn validate_inventory<'a, I>(values: I, requirements: &Requirements) -> InventoryReport
where
    I: IntoIterator<Item = &'a str>,
{
    let width = requirements.width();
    let mut entries = 0;
    let mut seen = HashSet::new();
    let mut problematic = Vec::new();

    for raw in values {
        entries += 1;
        seen.insert(pad_coupon(raw, width));
        if is_problematic(raw, requirements) {
            problematic.push(raw.to_string());
        }
    }

    InventoryReport {
        entries,
        distinct: seen.len(),
        required: requirements.total_prizes(),
        problematic,
    }
}

#[cfg(test)]
#[path = "tests/validator_tests.rs"]
mod tests;
