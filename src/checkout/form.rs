use std::collections::BTreeMap;

use crate::services::registrations::UtmParams;
use crate::validation;

/// Values the attendee typed into the checkout form.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CheckoutForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub company_name: String,
    pub gst_number: Option<String>,
    /// Only collected for event checkouts
    pub why_to_attend: Option<String>,
    pub referred_by: Option<String>,
}

const MAX_REASON_CHARS: usize = 1000;

/// Field name to inline error message.
pub type FieldErrors = BTreeMap<&'static str, String>;

impl CheckoutForm {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
    }

    /// Client-side checks; nothing is sent while any field fails.
    pub fn validate(&self, is_event: bool) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();

        if self.first_name.trim().is_empty() {
            errors.insert("first_name", "First name is required".into());
        } else if !validation::is_alphabetic_name(&self.first_name) {
            errors.insert("first_name", "First name may only contain letters".into());
        }

        if self.last_name.trim().is_empty() {
            errors.insert("last_name", "Last name is required".into());
        } else if !validation::is_alphabetic_name(&self.last_name) {
            errors.insert("last_name", "Last name may only contain letters".into());
        }

        if self.email.trim().is_empty() {
            errors.insert("email", "Email is required".into());
        } else if !validation::is_email(&self.email) {
            errors.insert("email", "Please enter a valid email address".into());
        }

        if !validation::is_local_phone(self.phone.trim()) {
            errors.insert("phone", "Please enter a valid 10-digit phone number".into());
        }

        if self.company_name.trim().is_empty() {
            errors.insert("company_name", "Company name is required".into());
        }

        if let Some(gst) = self.gst_number.as_deref() {
            if !gst.trim().is_empty() && !validation::is_gstin(gst) {
                errors.insert("gst_number", "Please enter a valid GST number".into());
            }
        }

        if let Some(reason) = self.why_to_attend.as_deref() {
            if is_event && reason.chars().count() > MAX_REASON_CHARS {
                errors.insert("why_to_attend", "Please keep this under 1000 characters".into());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Reads `utm_source`, `utm_medium` and `utm_campaign` from a page query string.
pub fn utm_from_query(query: &str) -> UtmParams {
    let mut utm = UtmParams::default();
    let query = query.trim_start_matches('?');
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match key.as_ref() {
            "utm_source" => utm.source = Some(value.to_string()),
            "utm_medium" => utm.medium = Some(value.to_string()),
            "utm_campaign" => utm.campaign = Some(value.to_string()),
            _ => {}
        }
    }
    utm
}
