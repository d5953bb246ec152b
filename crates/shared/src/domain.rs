use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_newtype!(UserId);

pub const USER_ID_PREFIX: &str = "IIPL-";

impl UserId {
    /// Sequential operator id in the `IIPL-0001` format.
    pub fn from_sequence(sequence: i64) -> Self {
        Self(format!("{USER_ID_PREFIX}{sequence:04}"))
    }
}

/// The active draw configuration. At most one row exists in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirements {
    pub event_name: String,
    pub main_prize_count: u32,
    pub consolation_prize_count: u32,
    pub total_digits: u32,
    pub min_range: i64,
    pub max_range: i64,
}

impl Requirements {
    pub fn total_prizes(&self) -> usize {
        self.main_prize_count as usize + self.consolation_prize_count as usize
    }

    /// Rank stamped on every consolation coupon. All consolations share it.
    pub fn consolation_rank(&self) -> i64 {
        i64::from(self.main_prize_count) + 1
    }

    pub fn width(&self) -> usize {
        self.total_digits as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponEntry {
    pub coupon_number: String,
    pub prize_number: Option<i64>,
}

impl CouponEntry {
    pub fn unstamped(coupon_number: impl Into<String>) -> Self {
        Self {
            coupon_number: coupon_number.into(),
            prize_number: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrizeTier {
    Main,
    Consolation,
}

impl PrizeTier {
    /// Label written to the prize log, e.g. `Main-Prize-3`. Positions are 1-based.
    pub fn label(self, position: usize) -> String {
        match self {
            PrizeTier::Main => format!("Main-Prize-{position}"),
            PrizeTier::Consolation => format!("Consolation-Prize-{position}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrizeRecord {
    pub event_name: String,
    pub prize_type_label: String,
    pub coupon_number: String,
    pub run_user_id: UserId,
    pub run_at: DateTime<Utc>,
}

/// In-memory outcome of one selection run. Never persisted directly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawResult {
    pub main_prize_numbers: Vec<String>,
    pub consolation_prize_numbers: Vec<String>,
}

impl DrawResult {
    pub fn len(&self) -> usize {
        self.main_prize_numbers.len() + self.consolation_prize_numbers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parses a raw coupon value as an integer. Empty and fractional values are not numeric.
pub fn parse_coupon_value(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<i64>().ok()
}

pub fn decimal_len(value: i64) -> usize {
    value.to_string().len()
}

/// Left-pads a coupon value with `0` to `width`.
///
/// Numeric values are canonicalized first so `7`, `07` and `0007` collapse to
/// the same identity. Non-numeric values are padded as given.
pub fn pad_coupon(raw: &str, width: usize) -> String {
    match parse_coupon_value(raw) {
        Some(value) if value >= 0 => format!("{value:0width$}"),
        _ => format!("{:0>width$}", raw.trim()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_numeric_values_to_width() {
        assert_eq!(pad_coupon("7", 4), "0007");
        assert_eq!(pad_coupon("0007", 4), "0007");
        assert_eq!(pad_coupon(" 20 ", 3), "020");
        assert_eq!(pad_coupon("12345", 3), "12345");
    }

    #[test]
    fn rejects_empty_and_fractional_values() {
        assert_eq!(parse_coupon_value(""), None);
        assert_eq!(parse_coupon_value("7.5"), None);
        assert_eq!(parse_coupon_value("abc"), None);
        assert_eq!(parse_coupon_value("0042"), Some(42));
    }

    #[test]
    fn formats_user_ids_and_labels() {
        assert_eq!(UserId::from_sequence(3).as_str(), "IIPL-0003");
        assert_eq!(PrizeTier::Main.label(2), "Main-Prize-2");
        assert_eq!(PrizeTier::Consolation.label(12), "Consolation-Prize-12");
    }
}
