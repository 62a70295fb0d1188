//! Subscription Model
//!
//! Plans and the two records written after a successful payment.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::payment::PaymentSuccess;
use crate::session::Session;

/// Order reference stored when the gateway issued no order id
pub const ONE_TIME_PAYMENT: &str = "one_time_payment";

/// Longest plan duration accepted from remote configuration (1000 years)
pub const MAX_DURATION_DAYS: u32 = 365_250;

/// Subscription plan tiers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Monthly,
    Lifetime,
}

impl PlanTier {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Lifetime => "lifetime",
        }
    }
}

impl std::str::FromStr for PlanTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "monthly" => Ok(Self::Monthly),
            "lifetime" => Ok(Self::Lifetime),
            other => Err(other.to_string()),
        }
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A purchasable plan
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanDefinition {
    pub tier: PlanTier,
    pub name: String,
    pub description: String,

    /// Price in minor units (paise)
    pub amount: i64,

    pub duration_days: u32,
}

impl PlanDefinition {
    /// Built-in plan for a tier
    pub fn builtin(tier: PlanTier) -> Self {
        match tier {
            PlanTier::Monthly => Self {
                tier,
                name: "Monthly Premium".into(),
                description: "Full access for 1 month".into(),
                amount: 39_900, // ₹399
                duration_days: 30,
            },
            PlanTier::Lifetime => Self {
                tier,
                name: "Lifetime Access".into(),
                description: "Pay once, enjoy forever".into(),
                amount: 599_900, // ₹5999
                duration_days: 36_500,
            },
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::days(i64::from(self.duration_days))
    }

    /// Subscription end for a payment issued at `start`; `None` if the
    /// date cannot be represented
    pub fn expires_at(&self, start: DateTime<Utc>) -> Option<DateTime<Utc>> {
        start.checked_add_signed(self.duration())
    }

    /// Line shown inside the payment widget
    pub fn checkout_description(&self) -> String {
        format!("{} — {}", self.name, self.description)
    }

    /// Price in major units (rupees)
    pub fn price(&self) -> Decimal {
        Decimal::new(self.amount, 2)
    }

    /// Price formatted for the plan listing, e.g. `5,999` or `1,00,000`
    pub fn display_price(&self) -> String {
        let price = self.price();
        let rupees = group_indian(&price.trunc().abs().to_string());
        let sign = if price.is_sign_negative() { "-" } else { "" };

        let paise = price.fract().abs();
        if paise.is_zero() {
            format!("{sign}{rupees}")
        } else {
            let paise = paise.round_dp(2).to_string();
            let paise = paise.trim_start_matches('0');
            format!("{sign}{rupees}{paise:0<3}")
        }
    }
}

/// Groups digits as 12,34,567 (last three, then pairs)
fn group_indian(digits: &str) -> String {
    if digits.len() <= 3 {
        return digits.to_string();
    }

    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut groups: Vec<&str> = Vec::new();
    let mut end = head.len();
    while end > 0 {
        let start = end.saturating_sub(2);
        groups.push(&head[start..end]);
        end = start;
    }
    groups.reverse();

    format!("{},{}", groups.join(","), tail)
}

/// Subscription status on the user document
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    #[default]
    Inactive,
    Active,
}

impl SubscriptionStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Active => "active",
        }
    }
}

/// Fields written to the target user's existing document
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountUpdate {
    pub subscription_status: SubscriptionStatus,
    pub subscription_plan: PlanTier,
    pub subscription_start: DateTime<Utc>,
    pub subscription_end: DateTime<Utc>,

    /// Gateway order id, or [`ONE_TIME_PAYMENT`]
    #[serde(rename = "razorpay_subscription_id")]
    pub gateway_order_ref: String,

    pub last_payment_id: String,
}

impl AccountUpdate {
    /// Activate `tier` for `start..end`
    pub fn activate(tier: PlanTier, payment: &PaymentSuccess, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            subscription_status: SubscriptionStatus::Active,
            subscription_plan: tier,
            subscription_start: start,
            subscription_end: end,
            gateway_order_ref: payment
                .order_id
                .clone()
                .unwrap_or_else(|| ONE_TIME_PAYMENT.to_string()),
            last_payment_id: payment.payment_id.clone(),
        }
    }
}

/// Status of a payment record
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Active,
}

impl PaymentStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
        }
    }
}

/// Channel a payment record originated from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentSource {
    Web,
}

impl PaymentSource {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "web",
        }
    }
}

/// Record appended once per successful checkout
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    /// Account credited (never the anonymous session id)
    pub user_id: String,
    pub user_email: String,
    pub plan_tier: PlanTier,
    pub plan_name: String,
    pub amount: i64,
    pub currency: String,

    #[serde(rename = "razorpay_payment_id")]
    pub payment_id: String,
    #[serde(rename = "razorpay_order_id")]
    pub order_id: Option<String>,
    #[serde(rename = "razorpay_signature")]
    pub signature: Option<String>,

    pub status: PaymentStatus,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub source: PaymentSource,

    /// Id of the session that performed the write
    pub auth_uid: String,
}

impl PaymentRecord {
    pub fn new(
        session: &Session,
        plan: &PlanDefinition,
        payment: &PaymentSuccess,
        currency: &str,
        started_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: session.target_id().to_string(),
            user_email: session.profile().email.clone().unwrap_or_default(),
            plan_tier: plan.tier,
            plan_name: plan.name.clone(),
            amount: plan.amount,
            currency: currency.to_string(),
            payment_id: payment.payment_id.clone(),
            order_id: payment.order_id.clone(),
            signature: payment.signature.clone(),
            status: PaymentStatus::Active,
            started_at,
            expires_at,
            source: PaymentSource::Web,
            auth_uid: session.session_id().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn test_builtin_plans() {
        let monthly = PlanDefinition::builtin(PlanTier::Monthly);
        assert_eq!(monthly.amount, 39_900);
        assert_eq!(monthly.price(), dec!(399.00));
        assert_eq!(monthly.checkout_description(), "Monthly Premium — Full access for 1 month");

        let lifetime = PlanDefinition::builtin(PlanTier::Lifetime);
        assert_eq!(lifetime.amount, 599_900);
        assert_eq!(lifetime.duration_days, 36_500);
    }

    #[test]
    fn test_expiry_is_start_plus_duration() {
        let start = Utc.with_ymd_and_hms(2026, 1, 31, 10, 0, 0).unwrap();
        let monthly = PlanDefinition::builtin(PlanTier::Monthly);
        assert_eq!(
            monthly.expires_at(start),
            Some(Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_unrepresentable_expiry() {
        let start = Utc.with_ymd_and_hms(2026, 1, 31, 10, 0, 0).unwrap();
        let mut plan = PlanDefinition::builtin(PlanTier::Monthly);

        plan.duration_days = u32::MAX;
        assert_eq!(plan.expires_at(start), None);

        plan.duration_days = MAX_DURATION_DAYS;
        assert!(plan.expires_at(start).is_some());
    }

    #[test]
    fn test_display_price() {
        let mut plan = PlanDefinition::builtin(PlanTier::Lifetime);
        assert_eq!(plan.display_price(), "5,999");

        plan.amount = 39_900;
        assert_eq!(plan.display_price(), "399");

        plan.amount = 10_000_000;
        assert_eq!(plan.display_price(), "1,00,000");

        plan.amount = 49_950;
        assert_eq!(plan.display_price(), "499.50");
    }

    #[test]
    fn test_tier_parsing() {
        assert_eq!("Monthly".parse::<PlanTier>(), Ok(PlanTier::Monthly));
        assert_eq!(" lifetime ".parse::<PlanTier>(), Ok(PlanTier::Lifetime));
        assert!("weekly".parse::<PlanTier>().is_err());
    }

    #[test]
    fn test_account_update_without_order_id() {
        let start = Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap();
        let payment = PaymentSuccess {
            payment_id: "pay_1".into(),
            order_id: None,
            signature: None,
        };
        let update = AccountUpdate::activate(PlanTier::Monthly, &payment, start, start + Duration::days(30));

        assert_eq!(update.gateway_order_ref, ONE_TIME_PAYMENT);
        assert_eq!(update.subscription_status, SubscriptionStatus::Active);
        assert_eq!(update.subscription_plan, PlanTier::Monthly);
    }
}
