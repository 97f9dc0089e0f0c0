use std::fmt::Write;

const ORGANIZATION: &str = "InnerCircle Business Network";

/// Message bodies sent after checkout events.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageTemplate {
    Welcome {
        name: String,
    },
    Otp {
        code: String,
        valid_minutes: u32,
    },
    EventConfirmation {
        name: String,
        event: String,
        date: Option<String>,
        venue: Option<String>,
    },
    PaymentConfirmation {
        name: String,
        paid_for: String,
        amount: i64,
        payment_id: String,
    },
    /// Welcome, payment and event details in one body.
    Comprehensive {
        name: String,
        paid_for: String,
        amount: i64,
        payment_id: Option<String>,
        coupon_code: Option<String>,
        event: Option<String>,
    },
}

fn first_name(name: &str) -> &str {
    name.split_whitespace().next().unwrap_or(name)
}

impl MessageTemplate {
    pub fn render(&self) -> String {
        match self {
            MessageTemplate::Welcome { name } => format!(
                "Hi {}, welcome to {}! We're glad to have you with us. Our team will reach out shortly with next steps.",
                first_name(name),
                ORGANIZATION
            ),
            MessageTemplate::Otp {
                code,
                valid_minutes,
            } => format!(
                "{} is your {} verification code. It is valid for {} minutes. Do not share it with anyone.",
                code, ORGANIZATION, valid_minutes
            ),
            MessageTemplate::EventConfirmation {
                name,
                event,
                date,
                venue,
            } => {
                let mut body = format!(
                    "Hi {}, your seat for {} is confirmed.",
                    first_name(name),
                    event
                );
                if let Some(date) = date {
                    let _ = write!(body, " Date: {}.", date);
                }
                if let Some(venue) = venue {
                    let _ = write!(body, " Venue: {}.", venue);
                }
                body.push_str(" See you there!");
                body
            }
            MessageTemplate::PaymentConfirmation {
                name,
                paid_for,
                amount,
                payment_id,
            } => format!(
                "Hi {}, we received your payment of ₹{} for {}. Payment ID: {}. Keep this for your records.",
                first_name(name),
                amount,
                paid_for,
                payment_id
            ),
            MessageTemplate::Comprehensive {
                name,
                paid_for,
                amount,
                payment_id,
                coupon_code,
                event,
            } => {
                let mut body = format!(
                    "Hi {}, welcome to {}! Your registration for {} is confirmed.",
                    first_name(name),
                    ORGANIZATION,
                    paid_for
                );
                match (payment_id, coupon_code) {
                    (Some(payment_id), _) => {
                        let _ = write!(
                            body,
                            " Payment of ₹{} received (Payment ID: {}).",
                            amount, payment_id
                        );
                    }
                    (None, Some(code)) => {
                        let _ = write!(body, " Coupon {} applied, nothing to pay.", code);
                    }
                    (None, None) => {}
                }
                if let Some(event) = event {
                    let _ = write!(body, " Event: {}.", event);
                }
                body.push_str(" Our team will be in touch soon.");
                body
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comprehensive_paid_message_mentions_payment() {
        let body = MessageTemplate::Comprehensive {
            name: "Asha Rao".into(),
            paid_for: "Chapter Meeting".into(),
            amount: 1770,
            payment_id: Some("pay_123".into()),
            coupon_code: None,
            event: Some("chapter-meeting".into()),
        }
        .render();
        assert!(body.starts_with("Hi Asha,"));
        assert!(body.contains("₹1770"));
        assert!(body.contains("pay_123"));
        assert!(body.contains("chapter-meeting"));
    }

    #[test]
    fn comprehensive_coupon_message_mentions_coupon() {
        let body = MessageTemplate::Comprehensive {
            name: "Ravi".into(),
            paid_for: "Membership".into(),
            amount: 0,
            payment_id: None,
            coupon_code: Some("INNERCIRCLE".into()),
            event: None,
        }
        .render();
        assert!(body.contains("Coupon INNERCIRCLE applied"));
        assert!(!body.contains("Payment ID"));
    }

    #[test]
    fn otp_and_event_templates() {
        let otp = MessageTemplate::Otp {
            code: "482913".into(),
            valid_minutes: 10,
        }
        .render();
        assert!(otp.starts_with("482913"));

        let event = MessageTemplate::EventConfirmation {
            name: "Asha".into(),
            event: "Founders Meetup".into(),
            date: Some("12 Jan".into()),
            venue: None,
        }
        .render();
        assert!(event.contains("Date: 12 Jan."));
        assert!(!event.contains("Venue"));
    }
}
