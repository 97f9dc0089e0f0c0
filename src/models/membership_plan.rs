use once_cell::sync::Lazy;
use serde::Serialize;
use utoipa::ToSchema;

/// Tax-inclusive price with an optional fee breakdown.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct PlanPrice {
    pub amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_fee: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annual_fee: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_fee: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct PlanColors {
    pub primary: String,
    pub secondary: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct SubPlan {
    pub title: String,
    pub price: PlanPrice,
    pub breakdown: Vec<String>,
    pub payment_url: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct MembershipPlan {
    pub id: u32,
    pub name: String,
    pub slug: String,
    pub tagline: String,
    pub price: PlanPrice,
    pub is_event: bool,
    pub features: Vec<String>,
    pub benefits: Vec<String>,
    pub highlights: Vec<String>,
    pub colors: PlanColors,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sub_plans: Vec<SubPlan>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn price(amount: i64) -> PlanPrice {
    PlanPrice {
        amount,
        registration_fee: None,
        annual_fee: None,
        meeting_fee: None,
    }
}

static PLANS: Lazy<Vec<MembershipPlan>> = Lazy::new(|| {
    vec![
        MembershipPlan {
            id: 1,
            name: "Inner Circle Membership".into(),
            slug: "inner-circle".into(),
            tagline: "A seat at the table with founders who refer business to each other".into(),
            price: PlanPrice {
                amount: 8259,
                registration_fee: Some(1180),
                annual_fee: Some(7079),
                meeting_fee: None,
            },
            is_event: false,
            features: strings(&[
                "Weekly chapter meetings",
                "One seat per business category",
                "Member directory access",
            ]),
            benefits: strings(&[
                "Qualified referrals from fellow members",
                "Visibility at regional showcases",
            ]),
            highlights: strings(&["Category exclusivity", "Founder-only chapters"]),
            colors: PlanColors {
                primary: "#1E3A8A".into(),
                secondary: "#F59E0B".into(),
            },
            sub_plans: vec![
                SubPlan {
                    title: "Annual".into(),
                    price: PlanPrice {
                        amount: 8259,
                        registration_fee: Some(1180),
                        annual_fee: Some(7079),
                        meeting_fee: None,
                    },
                    breakdown: strings(&["One-time registration", "Twelve months of membership"]),
                    payment_url: "/checkout?plan=inner-circle&option=annual".into(),
                },
                SubPlan {
                    title: "Half-yearly".into(),
                    price: PlanPrice {
                        amount: 4720,
                        registration_fee: Some(1180),
                        annual_fee: None,
                        meeting_fee: None,
                    },
                    breakdown: strings(&["One-time registration", "Six months of membership"]),
                    payment_url: "/checkout?plan=inner-circle&option=half-yearly".into(),
                },
            ],
        },
        MembershipPlan {
            id: 2,
            name: "Chapter Meeting".into(),
            slug: "chapter-meeting".into(),
            tagline: "Visit a chapter before you join".into(),
            price: PlanPrice {
                meeting_fee: Some(1770),
                ..price(1770)
            },
            is_event: true,
            features: strings(&["Breakfast meeting", "Ten-minute business pitch"]),
            benefits: strings(&["Meet members across industries"]),
            highlights: strings(&["Guest pass"]),
            colors: PlanColors {
                primary: "#065F46".into(),
                secondary: "#A7F3D0".into(),
            },
            sub_plans: Vec::new(),
        },
        MembershipPlan {
            id: 3,
            name: "Business Vertical".into(),
            slug: "business-vertical".into(),
            tagline: "Industry-focused circles for deeper collaboration".into(),
            price: price(5900),
            is_event: false,
            features: strings(&["Monthly vertical meetups", "Industry expert sessions"]),
            benefits: strings(&["Peer benchmarking", "Joint go-to-market opportunities"]),
            highlights: strings(&["Curated cohorts"]),
            colors: PlanColors {
                primary: "#7C2D12".into(),
                secondary: "#FED7AA".into(),
            },
            sub_plans: Vec::new(),
        },
    ]
});

pub fn all_plans() -> &'static [MembershipPlan] {
    &PLANS
}

pub fn find_plan(slug: &str) -> Option<&'static MembershipPlan> {
    PLANS.iter().find(|p| p.slug.eq_ignore_ascii_case(slug.trim()))
}
