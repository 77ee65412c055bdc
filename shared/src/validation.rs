//! Validation utilities for warehouse inventory input
//!
//! Everything here runs before any stock is touched: a request that fails
//! these checks is rejected as malformed input.

use thiserror::Error;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::models::{NewLocation, NewOperation, NewProduct, NewVendor, OperationBody};

/// Longest accepted operation reference
pub const MAX_REFERENCE_LEN: usize = 64;

/// Largest quantity a single line, reservation or threshold may carry.
///
/// Also the `max` of the `range` validators on the line and product models.
pub const MAX_QUANTITY: i64 = 1_000_000_000_000;

/// A malformed or missing input field
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct InputError {
    pub field: String,
    pub message: String,
}

impl InputError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    /// First failing field of a `validator` result, named under `prefix`
    pub fn from_validation(prefix: &str, errors: &ValidationErrors) -> Self {
        let field_errors = errors.field_errors();
        let mut fields: Vec<_> = field_errors.keys().copied().collect();
        fields.sort_unstable();

        let Some(field) = fields.first() else {
            return Self::new(prefix, "invalid value");
        };
        let message = field_errors[field]
            .first()
            .map(|e| match &e.message {
                Some(message) => message.to_string(),
                None => describe(e),
            })
            .unwrap_or_else(|| "invalid value".to_string());

        let field = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };
        Self::new(field, message)
    }
}

fn describe(error: &ValidationError) -> String {
    match error.code.as_ref() {
        "range" => {
            let param = |name: &str| error.params.get(name).and_then(|v| v.as_f64());
            match (param("value"), param("max")) {
                (Some(value), Some(max)) if value > max => {
                    format!("must be at most {}", max as i64)
                }
                _ => "must not be negative".to_string(),
            }
        }
        "length" => "has an invalid length".to_string(),
        "email" => "is not a valid email address".to_string(),
        other => format!("failed {} check", other),
    }
}

fn check<T: Validate>(prefix: &str, value: &T) -> Result<(), InputError> {
    value
        .validate()
        .map_err(|errors| InputError::from_validation(prefix, &errors))
}

/// Validate a quantity is a non-negative integer no larger than `MAX_QUANTITY`
pub fn validate_quantity(field: &str, qty: i64) -> Result<(), InputError> {
    if qty < 0 {
        return Err(InputError::new(field, "must not be negative"));
    }
    if qty > MAX_QUANTITY {
        return Err(InputError::new(
            field,
            format!("must be at most {}", MAX_QUANTITY),
        ));
    }
    Ok(())
}

/// Validate an operation reference (e.g., "WH/IN/0001")
pub fn validate_reference(reference: &str) -> Result<(), InputError> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return Err(InputError::new("reference", "is required"));
    }
    if trimmed.len() > MAX_REFERENCE_LEN {
        return Err(InputError::new(
            "reference",
            format!("must be at most {} characters", MAX_REFERENCE_LEN),
        ));
    }
    Ok(())
}

/// Validate a catalog code: letters, digits and `-_./`, no whitespace
pub fn validate_code(field: &str, code: &str) -> Result<(), InputError> {
    if code.is_empty() {
        return Err(InputError::new(field, "is required"));
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'))
    {
        return Err(InputError::new(
            field,
            "may only contain letters, digits and - _ . /",
        ));
    }
    Ok(())
}

/// Validate the shape of a new operation and every one of its lines
pub fn validate_new_operation(input: &NewOperation) -> Result<(), InputError> {
    validate_reference(&input.reference)?;
    validate_body(&input.body)
}

/// Validate the lines of an operation body.
///
/// Runs again at validation time, so rows written by older releases are
/// held to the same rules as fresh input.
pub fn validate_body(body: &OperationBody) -> Result<(), InputError> {
    match body {
        OperationBody::Receipt { lines, .. } => {
            for (i, line) in lines.iter().enumerate() {
                check(&format!("lines[{}]", i), line)?;
            }
        }
        OperationBody::Delivery { lines, .. } => {
            for (i, line) in lines.iter().enumerate() {
                check(&format!("lines[{}]", i), line)?;
            }
        }
        OperationBody::Transfer {
            from_location_id,
            to_location_id,
            lines,
        } => {
            if from_location_id == to_location_id {
                return Err(InputError::new(
                    "to_location_id",
                    "must differ from from_location_id",
                ));
            }
            for (i, line) in lines.iter().enumerate() {
                check(&format!("lines[{}]", i), line)?;
            }
        }
        OperationBody::Adjustment { lines, .. } => {
            for (i, line) in lines.iter().enumerate() {
                check(&format!("lines[{}]", i), line)?;
            }
        }
    }
    Ok(())
}

pub fn validate_new_product(input: &NewProduct) -> Result<(), InputError> {
    check("", input)?;
    validate_code("code", &input.code)
}

pub fn validate_new_location(input: &NewLocation) -> Result<(), InputError> {
    check("", input)?;
    validate_code("code", &input.code)
}

pub fn validate_new_vendor(input: &NewVendor) -> Result<(), InputError> {
    check("", input)?;
    validate_code("code", &input.code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AdjustmentLine, DeliveryLine, LocationType, ReceiptLine, TransferLine};
    use proptest::prelude::*;
    use uuid::Uuid;

    fn receipt(expected_qty: i64) -> NewOperation {
        NewOperation {
            reference: "WH/IN/0001".to_string(),
            note: None,
            body: OperationBody::Receipt {
                vendor_id: None,
                lines: vec![ReceiptLine {
                    product_id: Uuid::new_v4(),
                    location_id: Uuid::new_v4(),
                    expected_qty,
                    note: None,
                }],
            },
        }
    }

    #[test]
    fn test_validate_receipt_valid() {
        assert!(validate_new_operation(&receipt(20)).is_ok());
        assert!(validate_new_operation(&receipt(0)).is_ok());
    }

    #[test]
    fn test_negative_expected_qty_names_the_line() {
        let err = validate_new_operation(&receipt(-1)).unwrap_err();
        assert_eq!(err.field, "lines[0].expected_qty");
        assert_eq!(err.message, "must not be negative");
    }

    #[test]
    fn test_quantity_limit_is_inclusive() {
        assert!(validate_new_operation(&receipt(MAX_QUANTITY)).is_ok());

        let err = validate_new_operation(&receipt(MAX_QUANTITY + 1)).unwrap_err();
        assert_eq!(err.field, "lines[0].expected_qty");
        assert_eq!(err.message, format!("must be at most {}", MAX_QUANTITY));

        let err = validate_new_operation(&receipt(i64::MAX)).unwrap_err();
        assert_eq!(err.field, "lines[0].expected_qty");

        assert!(validate_quantity("qty", MAX_QUANTITY).is_ok());
        assert!(validate_quantity("qty", MAX_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_negative_delivery_qty_rejected() {
        let op = NewOperation {
            reference: "WH/OUT/0001".to_string(),
            note: None,
            body: OperationBody::Delivery {
                customer_name: Some("Acme".to_string()),
                lines: vec![
                    DeliveryLine {
                        product_id: Uuid::new_v4(),
                        location_id: Uuid::new_v4(),
                        qty: 5,
                        note: None,
                    },
                    DeliveryLine {
                        product_id: Uuid::new_v4(),
                        location_id: Uuid::new_v4(),
                        qty: -3,
                        note: None,
                    },
                ],
            },
        };
        let err = validate_new_operation(&op).unwrap_err();
        assert_eq!(err.field, "lines[1].qty");
    }

    #[test]
    fn test_negative_counted_qty_rejected() {
        let body = OperationBody::Adjustment {
            reason: None,
            lines: vec![AdjustmentLine {
                product_id: Uuid::new_v4(),
                location_id: Uuid::new_v4(),
                counted_qty: -8,
                note: None,
            }],
        };
        assert_eq!(validate_body(&body).unwrap_err().field, "lines[0].counted_qty");
    }

    #[test]
    fn test_transfer_to_same_location_rejected() {
        let loc = Uuid::new_v4();
        let body = OperationBody::Transfer {
            from_location_id: loc,
            to_location_id: loc,
            lines: vec![TransferLine {
                product_id: Uuid::new_v4(),
                qty: 1,
                note: None,
            }],
        };
        assert_eq!(validate_body(&body).unwrap_err().field, "to_location_id");
    }

    #[test]
    fn test_blank_reference_rejected() {
        let mut op = receipt(1);
        op.reference = "   ".to_string();
        assert_eq!(validate_new_operation(&op).unwrap_err().field, "reference");

        op.reference = "X".repeat(MAX_REFERENCE_LEN + 1);
        assert!(validate_new_operation(&op).is_err());
    }

    #[test]
    fn test_empty_operation_is_well_formed() {
        let op = NewOperation {
            reference: "WH/ADJ/0001".to_string(),
            note: None,
            body: OperationBody::Adjustment {
                reason: Some("cycle count".to_string()),
                lines: vec![],
            },
        };
        assert!(validate_new_operation(&op).is_ok());
    }

    #[test]
    fn test_validate_code() {
        assert!(validate_code("code", "PRD-0001").is_ok());
        assert!(validate_code("code", "WH/STOCK").is_ok());
        assert!(validate_code("code", "").is_err());
        assert!(validate_code("code", "has space").is_err());
    }

    #[test]
    fn test_validate_new_product() {
        let product = NewProduct {
            code: "PRD-0001".to_string(),
            name: "Steel bolt M8".to_string(),
            category: Some("Hardware".to_string()),
            unit_of_measure: "pcs".to_string(),
            reorder_threshold: Some(10),
            reorder_target: Some(50),
        };
        assert!(validate_new_product(&product).is_ok());

        let bad = NewProduct {
            reorder_threshold: Some(-1),
            ..product.clone()
        };
        assert_eq!(validate_new_product(&bad).unwrap_err().field, "reorder_threshold");

        let unnamed = NewProduct {
            name: String::new(),
            ..product
        };
        assert_eq!(validate_new_product(&unnamed).unwrap_err().field, "name");
    }

    #[test]
    fn test_validate_new_location_and_vendor() {
        let location = NewLocation {
            code: "WH-A".to_string(),
            name: "Main warehouse".to_string(),
            location_type: LocationType::Warehouse,
            parent_id: None,
        };
        assert!(validate_new_location(&location).is_ok());

        let vendor = NewVendor {
            code: "VEN-01".to_string(),
            name: "Bolts Inc".to_string(),
            contact_name: None,
            email: Some("not-an-email".to_string()),
            phone: None,
        };
        assert_eq!(validate_new_vendor(&vendor).unwrap_err().field, "email");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Quantity validation accepts exactly the integers in `0..=MAX_QUANTITY`
        #[test]
        fn prop_quantity_bounds(qty in any::<i64>()) {
            prop_assert_eq!(
                validate_quantity("qty", qty).is_ok(),
                (0..=MAX_QUANTITY).contains(&qty)
            );
        }

        /// A receipt is well formed iff every line quantity is non-negative
        #[test]
        fn prop_receipt_lines_checked(qtys in prop::collection::vec(-50i64..50, 0..8)) {
            let lines = qtys
                .iter()
                .map(|&expected_qty| ReceiptLine {
                    product_id: Uuid::new_v4(),
                    location_id: Uuid::new_v4(),
                    expected_qty,
                    note: None,
                })
                .collect();
            let body = OperationBody::Receipt { vendor_id: None, lines };

            prop_assert_eq!(validate_body(&body).is_ok(), qtys.iter().all(|&q| q >= 0));
        }
    }
}
