pub mod common;
pub mod health;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod plans;
pub mod registrations;
