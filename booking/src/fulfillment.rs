//! Decides whether a pickup/delivery choice is complete enough to confirm.

use serde::{Deserialize, Serialize};

pub const CHOOSE_FULFILLMENT: &str = "Choose pickup or delivery";
pub const DELIVERY_ADDRESS_REQUIRED: &str = "Delivery address is required";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FulfillmentType {
    Pickup,
    Delivery,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FulfillmentState {
    #[serde(rename = "type")]
    pub kind: FulfillmentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_address: Option<String>,
}

impl FulfillmentState {
    pub fn pickup() -> Self {
        Self {
            kind: FulfillmentType::Pickup,
            delivery_address: None,
        }
    }

    pub fn delivery(address: impl Into<String>) -> Self {
        Self {
            kind: FulfillmentType::Delivery,
            delivery_address: Some(address.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FulfillmentCheck {
    pub valid: bool,
    pub reason: Option<&'static str>,
}

impl FulfillmentCheck {
    const fn ok() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    const fn rejected(reason: &'static str) -> Self {
        Self {
            valid: false,
            reason: Some(reason),
        }
    }
}

pub fn validate(fulfillment: Option<&FulfillmentState>) -> FulfillmentCheck {
    let Some(f) = fulfillment else {
        return FulfillmentCheck::rejected(CHOOSE_FULFILLMENT);
    };

    match f.kind {
        FulfillmentType::Pickup => FulfillmentCheck::ok(),
        FulfillmentType::Delivery => {
            let has_address = f
                .delivery_address
                .as_deref()
                .is_some_and(|a| !a.trim().is_empty());

            if has_address {
                FulfillmentCheck::ok()
            } else {
                FulfillmentCheck::rejected(DELIVERY_ADDRESS_REQUIRED)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_is_invalid() {
        assert_eq!(
            validate(None),
            FulfillmentCheck {
                valid: false,
                reason: Some("Choose pickup or delivery")
            }
        );
    }

    #[test]
    fn pickup_is_always_valid() {
        assert_eq!(validate(Some(&FulfillmentState::pickup())), FulfillmentCheck::ok());
    }

    #[test]
    fn delivery_needs_a_non_blank_address() {
        let missing = FulfillmentState {
            kind: FulfillmentType::Delivery,
            delivery_address: None,
        };
        assert_eq!(
            validate(Some(&missing)).reason,
            Some("Delivery address is required")
        );

        let blank = FulfillmentState::delivery(" \t\n");
        assert!(!validate(Some(&blank)).valid);

        let real = FulfillmentState::delivery("123 Main St");
        assert_eq!(validate(Some(&real)), FulfillmentCheck::ok());
    }

    #[test]
    fn wire_shapes() {
        let parsed: FulfillmentState = serde_json::from_str(r#"{"type":"delivery"}"#).unwrap();
        assert_eq!(parsed.delivery_address, None);

        let json = serde_json::to_value(validate(Some(&FulfillmentState::pickup()))).unwrap();
        assert_eq!(json, serde_json::json!({ "valid": true, "reason": null }));
    }
}
