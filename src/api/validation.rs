//! Request field validation.

use validator::ValidateEmail;

use super::error::ApiError;
use super::response::FieldError;

/// Collects field errors so a single response reports all of them.
#[derive(Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    fn reject(&mut self, field: &'static str, value: &str, reason: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            value: value.to_string(),
            reason: reason.into(),
        });
    }

    pub fn email(&mut self, field: &'static str, value: &str) -> &mut Self {
        if !is_valid_email(value) {
            self.reject(field, value, "must be a well-formed email address");
        }
        self
    }

    /// Character count must fall within `min..=max`.
    pub fn length(
        &mut self,
        field: &'static str,
        value: &str,
        min: usize,
        max: usize,
    ) -> &mut Self {
        let len = value.chars().count();
        if len < min || len > max {
            self.reject(field, value, format!("length must be between {min} and {max}"));
        }
        self
    }

    /// Like `length`, but the rejected value is never echoed back.
    pub fn secret_length(
        &mut self,
        field: &'static str,
        value: &str,
        min: usize,
        max: usize,
    ) -> &mut Self {
        let len = value.chars().count();
        if len < min || len > max {
            self.reject(field, "", format!("length must be between {min} and {max}"));
        }
        self
    }

    pub fn not_blank(&mut self, field: &'static str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.reject(field, value, "must not be blank");
        }
        self
    }

    pub fn finish(&mut self) -> Result<(), ApiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(std::mem::take(&mut self.errors)))
        }
    }
}

fn is_valid_email(value: &str) -> bool {
    value.validate_email()
}
