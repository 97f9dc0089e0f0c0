pub mod coupons;
pub mod payments;
pub mod pricing;
pub mod registrations;
