//! Field rules shared by the HTTP layer and the checkout form.

use once_cell::sync::Lazy;
use regex::Regex;
use validator::ValidationError;

static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z]+(?:[ .'-]+[A-Za-z]+)*\.?$").unwrap());
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").unwrap()
});
static LOCAL_PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{10}$").unwrap());
static GSTIN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9]{2}[A-Z]{5}[0-9]{4}[A-Z][1-9A-Z]Z[0-9A-Z]$").unwrap()
});
static UTM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9 _.+-]{1,100}$").unwrap());

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

pub fn is_alphabetic_name(value: &str) -> bool {
    NAME_RE.is_match(value.trim())
}

pub fn is_email(value: &str) -> bool {
    EMAIL_RE.is_match(value.trim())
}

/// Ten digits once spaces and dashes are removed.
pub fn is_local_phone(value: &str) -> bool {
    let digits: String = value
        .chars()
        .filter(|c| !matches!(c, ' ' | '-'))
        .collect();
    LOCAL_PHONE_RE.is_match(&digits)
}

pub fn is_gstin(value: &str) -> bool {
    GSTIN_RE.is_match(&value.trim().to_uppercase())
}

pub fn validate_name(value: &str) -> Result<(), ValidationError> {
    if is_alphabetic_name(value) {
        Ok(())
    } else {
        Err(invalid("name", "Name may only contain letters"))
    }
}

pub fn validate_email(value: &str) -> Result<(), ValidationError> {
    if is_email(value) {
        Ok(())
    } else {
        Err(invalid("email", "Please enter a valid email address"))
    }
}

/// Accepts local ten-digit numbers and numbers with a country code.
pub fn validate_phone(value: &str) -> Result<(), ValidationError> {
    let digits: String = value.chars().filter(char::is_ascii_digit).collect();
    if is_local_phone(value) || (value.trim().starts_with('+') && (8..=15).contains(&digits.len()))
    {
        Ok(())
    } else {
        Err(invalid("phone", "Please enter a valid 10-digit phone number"))
    }
}

pub fn validate_gstin(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() || is_gstin(value) {
        Ok(())
    } else {
        Err(invalid("gst_number", "Please enter a valid GST number"))
    }
}

pub fn validate_utm(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() || UTM_RE.is_match(value) {
        Ok(())
    } else {
        Err(invalid("utm", "Invalid UTM parameter"))
    }
}

/// Empty strings from HTML forms mean "not provided".
pub fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
