// src/contact/validators.rs

use super::models::ContactRequest;
use crate::common::validation::present;
use crate::common::{ValidationResult, Validator};

pub const REQUIRED_FIELDS_MISSING: &str = "Required fields missing";

pub struct ContactValidator;

impl Validator<ContactRequest> for ContactValidator {
    fn validate(&self, data: &ContactRequest) -> ValidationResult {
        let mut result = ValidationResult::new();

        if present(&data.name).is_none() {
            result.add_error("name", REQUIRED_FIELDS_MISSING);
        }
        if present(&data.email).is_none() {
            result.add_error("email", REQUIRED_FIELDS_MISSING);
        }
        if present(&data.message).is_none() {
            result.add_error("message", REQUIRED_FIELDS_MISSING);
        }

        result
    }
}
