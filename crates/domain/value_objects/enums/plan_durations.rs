use std::fmt::Display;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Billing term of a plan as reported by the plan service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanDuration {
    Month,
    Quarter,
    Year,
    Other(String),
}

impl PlanDuration {
    pub fn as_str(&self) -> &str {
        match self {
            PlanDuration::Month => "MONTH",
            PlanDuration::Quarter => "QUARTER",
            PlanDuration::Year => "YEAR",
            PlanDuration::Other(raw) => raw.as_str(),
        }
    }

    /// Accepts the canonical values plus the spellings older orders carry
    /// (`MONTHLY`, `YEARLY`, `3 Months`, `3_MONTHS`).
    pub fn from_str(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "MONTH" | "MONTHLY" => PlanDuration::Month,
            "QUARTER" | "QUARTERLY" | "3 MONTHS" | "3_MONTHS" => PlanDuration::Quarter,
            "YEAR" | "YEARLY" => PlanDuration::Year,
            _ => PlanDuration::Other(raw.trim().to_string()),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PlanDuration::Month => "Monthly",
            PlanDuration::Quarter => "3 Months",
            PlanDuration::Year => "Yearly",
            PlanDuration::Other(_) => "",
        }
    }

    /// Nominal term length used when an order carries no usable date range.
    pub fn nominal_days(&self) -> i64 {
        match self {
            PlanDuration::Month => 30,
            PlanDuration::Quarter => 90,
            PlanDuration::Year => 365,
            PlanDuration::Other(_) => 0,
        }
    }
}

impl Default for PlanDuration {
    fn default() -> Self {
        PlanDuration::Other(String::new())
    }
}

impl Display for PlanDuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for PlanDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PlanDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.map(|value| PlanDuration::from_str(&value)).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_follow_duration_class() {
        assert_eq!(PlanDuration::Month.label(), "Monthly");
        assert_eq!(PlanDuration::Quarter.label(), "3 Months");
        assert_eq!(PlanDuration::Year.label(), "Yearly");
        assert_eq!(PlanDuration::from_str("WEEK").label(), "");
    }

    #[test]
    fn parses_legacy_spellings() {
        assert_eq!(PlanDuration::from_str("yearly"), PlanDuration::Year);
        assert_eq!(PlanDuration::from_str("3 Months"), PlanDuration::Quarter);
        assert_eq!(PlanDuration::from_str(" month "), PlanDuration::Month);
        assert_eq!(PlanDuration::from_str("WEEK").nominal_days(), 0);
    }

    #[test]
    fn null_duration_deserializes_to_unknown() {
        let duration: PlanDuration = serde_json::from_str("null").unwrap();
        assert_eq!(duration.nominal_days(), 0);
    }
}
