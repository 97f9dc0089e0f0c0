pub mod membership_plan;

pub use membership_plan::{all_plans, find_plan, MembershipPlan};
