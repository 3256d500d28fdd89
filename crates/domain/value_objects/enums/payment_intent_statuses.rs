use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Lifecycle of one checkout attempt.
///
/// `Created -> Verified -> Assigned` is the happy path. `Failed` and
/// `Dismissed` are terminal; `PartiallyAssigned` means the order half was
/// granted but the subscription half was not, and is only left by the
/// reconciliation worker.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentIntentStatus {
    Created,
    Verified,
    Assigned,
    PartiallyAssigned,
    Failed,
    Dismissed,
}

impl PaymentIntentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentIntentStatus::Created => "CREATED",
            PaymentIntentStatus::Verified => "VERIFIED",
            PaymentIntentStatus::Assigned => "ASSIGNED",
            PaymentIntentStatus::PartiallyAssigned => "PARTIALLY_ASSIGNED",
            PaymentIntentStatus::Failed => "FAILED",
            PaymentIntentStatus::Dismissed => "DISMISSED",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "CREATED" => Some(PaymentIntentStatus::Created),
            "VERIFIED" => Some(PaymentIntentStatus::Verified),
            "ASSIGNED" => Some(PaymentIntentStatus::Assigned),
            "PARTIALLY_ASSIGNED" => Some(PaymentIntentStatus::PartiallyAssigned),
            "FAILED" => Some(PaymentIntentStatus::Failed),
            "DISMISSED" => Some(PaymentIntentStatus::Dismissed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentIntentStatus::Assigned
                | PaymentIntentStatus::Failed
                | PaymentIntentStatus::Dismissed
        )
    }

    pub fn can_transition_to(&self, next: PaymentIntentStatus) -> bool {
        use PaymentIntentStatus::*;
        matches!(
            (self, next),
            (Created, Verified)
                | (Created, Failed)
                | (Created, Dismissed)
                | (Verified, Assigned)
                | (Verified, PartiallyAssigned)
                | (Verified, Failed)
                | (PartiallyAssigned, Assigned)
        )
    }
}

impl Display for PaymentIntentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_partial_assignment_is_reopened() {
        use PaymentIntentStatus::*;
        assert!(PartiallyAssigned.can_transition_to(Assigned));
        assert!(!Failed.can_transition_to(Created));
        assert!(!Assigned.can_transition_to(PartiallyAssigned));
        assert!(!Dismissed.can_transition_to(Verified));
        assert!(!PartiallyAssigned.is_terminal());
    }

    #[test]
    fn string_form_round_trips_through_storage() {
        let status = PaymentIntentStatus::from_str(PaymentIntentStatus::PartiallyAssigned.as_str());
        assert_eq!(status, Some(PaymentIntentStatus::PartiallyAssigned));
        assert_eq!(PaymentIntentStatus::from_str("pending"), None);
    }
}
