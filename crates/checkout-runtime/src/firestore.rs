//! Firestore Document Store
//!
//! Implementation of `DocumentStore` and `PlanSource` over the Firestore REST
//! API. Each write is its own `:commit` call so the account update and the
//! payment record stay independent.

use async_trait::async_trait;
use checkout_core::service::ServiceResult;
use checkout_core::{AccountUpdate, Credential, DocumentStore, PaymentRecord, PlanOverride, PlanSource};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};

use crate::config::FirebaseConfig;
use crate::error::{ensure_success, Result};

/// Collection holding user documents
pub const USERS: &str = "users";

/// Collection receiving payment records
pub const SUBSCRIPTIONS: &str = "subscriptions";

/// Collection with plan price overrides
pub const PLANS: &str = "plans";

/// Firestore REST client
pub struct FirestoreClient {
    client: reqwest::Client,
    config: FirebaseConfig,
}

impl FirestoreClient {
    pub fn new(config: FirebaseConfig) -> Result<Self> {
        Ok(Self {
            client: config.http_client()?,
            config,
        })
    }

    async fn commit(&self, credential: &Credential, write: Value) -> Result<()> {
        let url = format!("{}:commit", self.config.documents_url());
        let response = self
            .client
            .post(url)
            .bearer_auth(credential.as_str())
            .json(&json!({ "writes": [write] }))
            .send()
            .await?;

        ensure_success(response).await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FirestoreClient {
    async fn update_account(
        &self,
        credential: &Credential,
        user_id: &str,
        update: &AccountUpdate,
    ) -> ServiceResult<()> {
        self.commit(credential, account_update_write(&self.config, user_id, update))
            .await?;
        tracing::debug!(user_id = %user_id, "Updated user subscription fields");
        Ok(())
    }

    async fn insert_payment(&self, credential: &Credential, record: &PaymentRecord) -> ServiceResult<String> {
        let record_id = uuid::Uuid::new_v4().simple().to_string();
        self.commit(credential, payment_record_write(&self.config, &record_id, record))
            .await?;
        tracing::debug!(record_id = %record_id, "Created payment record");
        Ok(record_id)
    }
}

#[async_trait]
impl PlanSource for FirestoreClient {
    async fn fetch_overrides(&self, credential: &Credential) -> ServiceResult<Vec<PlanOverride>> {
        let url = format!("{}/{PLANS}", self.config.documents_url());
        let response = self
            .client
            .get(url)
            .bearer_auth(credential.as_str())
            .send()
            .await
            .map_err(crate::RuntimeError::from)?;
        let body: Value = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(crate::RuntimeError::from)?;

        Ok(parse_plan_overrides(&body))
    }
}

// ============================================================================
// Typed values
// ============================================================================

fn string(value: &str) -> Value {
    json!({ "stringValue": value })
}

fn integer(value: i64) -> Value {
    json!({ "integerValue": value.to_string() })
}

fn timestamp(value: DateTime<Utc>) -> Value {
    json!({ "timestampValue": value.to_rfc3339_opts(SecondsFormat::Micros, true) })
}

fn optional_string(value: Option<&str>) -> Value {
    value.map_or_else(|| json!({ "nullValue": null }), string)
}

fn server_time(field: &str) -> Value {
    json!({ "fieldPath": field, "setToServerValue": "REQUEST_TIME" })
}

fn read_string(fields: &Value, key: &str) -> Option<String> {
    fields[key]["stringValue"].as_str().map(str::to_string)
}

#[allow(clippy::cast_possible_truncation)]
fn read_integer(fields: &Value, key: &str) -> Option<i64> {
    let value = &fields[key];
    value["integerValue"]
        .as_str()
        .and_then(|s| s.parse().ok())
        .or_else(|| value["integerValue"].as_i64())
        .or_else(|| value["doubleValue"].as_f64().map(|f| f.round() as i64))
}

// ============================================================================
// Writes
// ============================================================================

/// Update of an existing `users/{id}` document; fails if it does not exist
pub fn account_update_write(config: &FirebaseConfig, user_id: &str, update: &AccountUpdate) -> Value {
    let mut fields = Map::new();
    fields.insert("subscription_status".into(), string(update.subscription_status.as_str()));
    fields.insert("subscription_plan".into(), string(update.subscription_plan.as_str()));
    fields.insert("subscription_start".into(), timestamp(update.subscription_start));
    fields.insert("subscription_end".into(), timestamp(update.subscription_end));
    fields.insert("razorpay_subscription_id".into(), string(&update.gateway_order_ref));
    fields.insert("last_payment_id".into(), string(&update.last_payment_id));

    let mask: Vec<String> = fields.keys().cloned().collect();

    json!({
        "update": {
            "name": config.document_name(&format!("{USERS}/{user_id}")),
            "fields": fields,
        },
        "updateMask": { "fieldPaths": mask },
        "currentDocument": { "exists": true },
        "updateTransforms": [server_time("updated_at")],
    })
}

/// Creation of `subscriptions/{record_id}`; fails if it already exists
pub fn payment_record_write(config: &FirebaseConfig, record_id: &str, record: &PaymentRecord) -> Value {
    let fields = json!({
        "user_id": string(&record.user_id),
        "user_email": string(&record.user_email),
        "plan_tier": string(record.plan_tier.as_str()),
        "plan_name": string(&record.plan_name),
        "amount": integer(record.amount),
        "currency": string(&record.currency),
        "razorpay_payment_id": string(&record.payment_id),
        "razorpay_order_id": optional_string(record.order_id.as_deref()),
        "razorpay_signature": optional_string(record.signature.as_deref()),
        "status": string(record.status.as_str()),
        "started_at": timestamp(record.started_at),
        "expires_at": timestamp(record.expires_at),
        "source": string(record.source.as_str()),
        "auth_uid": string(&record.auth_uid),
    });

    json!({
        "update": {
            "name": config.document_name(&format!("{SUBSCRIPTIONS}/{record_id}")),
            "fields": fields,
        },
        "currentDocument": { "exists": false },
        "updateTransforms": [server_time("created_at")],
    })
}

// ============================================================================
// Reads
// ============================================================================

/// Overrides from a `plans` list response.
///
/// A document's tier is its `tier` field, else its document id. The legacy
/// `price_monthly` field carries the price for every tier.
pub fn parse_plan_overrides(body: &Value) -> Vec<PlanOverride> {
    let Some(documents) = body["documents"].as_array() else {
        return Vec::new();
    };

    documents
        .iter()
        .filter_map(|doc| {
            let fields = &doc["fields"];
            let tier = read_string(fields, "tier").or_else(|| {
                doc["name"]
                    .as_str()
                    .and_then(|name| name.rsplit('/').next())
                    .map(str::to_string)
            })?;

            Some(PlanOverride {
                tier,
                price: read_integer(fields, "price_monthly"),
                duration_days: read_integer(fields, "duration_days").and_then(|d| u32::try_from(d).ok()),
                name: read_string(fields, "name"),
                description: read_string(fields, "description"),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkout_core::model::{PaymentSource, PaymentStatus};
    use checkout_core::{PlanTier, SubscriptionStatus};
    use chrono::TimeZone;

    fn config() -> FirebaseConfig {
        FirebaseConfig::new("key", "ransh-ott")
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_account_update_write() {
        let update = AccountUpdate {
            subscription_status: SubscriptionStatus::Active,
            subscription_plan: PlanTier::Monthly,
            subscription_start: start(),
            subscription_end: start() + chrono::Duration::days(30),
            gateway_order_ref: "one_time_payment".into(),
            last_payment_id: "pay_1".into(),
        };
        let write = account_update_write(&config(), "abc123", &update);

        assert_eq!(
            write["update"]["name"],
            "projects/ransh-ott/databases/(default)/documents/users/abc123"
        );
        assert_eq!(write["currentDocument"]["exists"], true);
        assert_eq!(write["update"]["fields"]["subscription_status"]["stringValue"], "active");
        assert_eq!(
            write["update"]["fields"]["subscription_end"]["timestampValue"],
            "2026-04-13T09:30:00.000000Z"
        );
        assert_eq!(write["updateMask"]["fieldPaths"].as_array().unwrap().len(), 6);
        assert_eq!(write["updateTransforms"][0]["fieldPath"], "updated_at");
    }

    #[test]
    fn test_payment_record_write() {
        let record = PaymentRecord {
            user_id: "abc123".into(),
            user_email: String::new(),
            plan_tier: PlanTier::Monthly,
            plan_name: "Monthly Premium".into(),
            amount: 39_900,
            currency: "INR".into(),
            payment_id: "pay_1".into(),
            order_id: None,
            signature: None,
            status: PaymentStatus::Active,
            started_at: start(),
            expires_at: start() + chrono::Duration::days(30),
            source: PaymentSource::Web,
            auth_uid: "anon_1".into(),
        };
        let write = payment_record_write(&config(), "rec1", &record);
        let fields = &write["update"]["fields"];

        assert_eq!(fields["amount"]["integerValue"], "39900");
        assert_eq!(fields["user_id"]["stringValue"], "abc123");
        assert!(fields["razorpay_order_id"]["nullValue"].is_null());
        assert_eq!(write["currentDocument"]["exists"], false);
        assert_eq!(write["updateTransforms"][0]["fieldPath"], "created_at");
    }

    #[test]
    fn test_parse_plan_overrides() {
        let body = json!({
            "documents": [
                {
                    "name": "projects/ransh-ott/databases/(default)/documents/plans/monthly",
                    "fields": { "price_monthly": { "integerValue": "29900" } }
                },
                {
                    "name": "projects/ransh-ott/databases/(default)/documents/plans/abc",
                    "fields": {
                        "tier": { "stringValue": "lifetime" },
                        "price_monthly": { "doubleValue": 449900.0 },
                        "duration_days": { "integerValue": "3650" }
                    }
                }
            ]
        });

        let overrides = parse_plan_overrides(&body);
        assert_eq!(overrides.len(), 2);
        assert_eq!(overrides[0].tier, "monthly");
        assert_eq!(overrides[0].price, Some(29_900));
        assert_eq!(overrides[1].tier, "lifetime");
        assert_eq!(overrides[1].price, Some(449_900));
        assert_eq!(overrides[1].duration_days, Some(3650));
    }

    #[test]
    fn test_empty_collection() {
        assert!(parse_plan_overrides(&json!({})).is_empty());
    }
}
