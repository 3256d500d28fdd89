use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body of the create-payment-order call.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GatewayOrderRequest {
    pub plan_id: Uuid,
    pub amount: Decimal,
    pub amount_in_paise: i64,
    pub is_upgrade: bool,
    pub credit_amount: Decimal,
}

/// Gateway order as confirmed by the payment backend, amount already validated.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GatewayOrder {
    pub gateway_order_id: String,
    pub amount_minor: i64,
    pub currency: String,
    pub internal_payment_id: Option<String>,
}

/// Signed callback produced by the gateway widget.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignedPaymentResponse {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentVerification {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub eligible_for_plan_assignment: Option<bool>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub internal_payment_id: Option<String>,
    #[serde(default)]
    pub razorpay_payment_id: Option<String>,
}

/// Payment ids are longs on some services and strings on others.
pub fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| match value {
        serde_json::Value::String(text) if !text.trim().is_empty() => Some(text),
        serde_json::Value::Number(number) => Some(number.to_string()),
        _ => None,
    }))
}

impl PaymentVerification {
    /// Only an explicit success counts; an explicit `false` eligibility vetoes it.
    pub fn is_verified(&self) -> bool {
        let succeeded = self
            .status
            .as_deref()
            .is_some_and(|status| status.trim().eq_ignore_ascii_case("SUCCESS"));
        succeeded && self.eligible_for_plan_assignment != Some(false)
    }
}

/// Order-side assignment backed by a verified payment.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderAssignment {
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub gateway_payment_id: String,
    pub internal_payment_id: Option<String>,
}

/// Everything the client needs to open the gateway widget.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CheckoutTicket {
    pub intent_id: Uuid,
    pub plan_id: Uuid,
    pub plan_name: String,
    pub gateway_order_id: String,
    pub gateway_key_id: String,
    pub amount_minor: i64,
    pub currency: String,
    pub credit_applied: Decimal,
    pub is_upgrade: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AssignmentOutcome {
    pub status: &'static str,
    pub message: &'static str,
    pub intent_id: Option<Uuid>,
    pub order: serde_json::Value,
    pub subscription: serde_json::Value,
}

impl AssignmentOutcome {
    pub fn assigned(
        intent_id: Option<Uuid>,
        order: serde_json::Value,
        subscription: serde_json::Value,
    ) -> Self {
        Self {
            status: "SUCCESS",
            message: "Order and Subscription assigned successfully.",
            intent_id,
            order,
            subscription,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckoutStart {
    /// Paid plan: the caller opens the gateway widget with this ticket.
    Gateway(CheckoutTicket),
    /// Free plan: entitlement was granted without a gateway step.
    Assigned(AssignmentOutcome),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckoutOutcome {
    Assigned(AssignmentOutcome),
    Dismissed { intent_id: Uuid },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verification(status: Option<&str>, eligible: Option<bool>) -> PaymentVerification {
        PaymentVerification {
            status: status.map(str::to_string),
            eligible_for_plan_assignment: eligible,
            internal_payment_id: None,
            razorpay_payment_id: None,
        }
    }

    #[test]
    fn numeric_internal_payment_id_is_accepted() {
        let parsed: PaymentVerification =
            serde_json::from_str(r#"{"status":"SUCCESS","internalPaymentId":42}"#).unwrap();
        assert_eq!(parsed.internal_payment_id.as_deref(), Some("42"));
    }

    #[test]
    fn ambiguous_verification_is_not_success() {
        assert!(verification(Some("SUCCESS"), None).is_verified());
        assert!(verification(Some("success"), Some(true)).is_verified());
        assert!(!verification(Some("SUCCESS"), Some(false)).is_verified());
        assert!(!verification(Some("CREATED"), Some(true)).is_verified());
        assert!(!verification(None, Some(true)).is_verified());
    }
}
