//! Plan Catalog
//!
//! Built-in plans, optionally re-priced from the remote `plans` collection.

use crate::model::{PlanDefinition, PlanTier, MAX_DURATION_DAYS};
use crate::service::{PlanOverride, PlanSource};
use crate::session::Credential;

/// Plans on offer for one checkout
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlanCatalog {
    plans: Vec<PlanDefinition>,
}

impl Default for PlanCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PlanCatalog {
    pub fn builtin() -> Self {
        Self {
            plans: vec![
                PlanDefinition::builtin(PlanTier::Monthly),
                PlanDefinition::builtin(PlanTier::Lifetime),
            ],
        }
    }

    /// Built-in plans with whatever overrides `source` can provide.
    ///
    /// Lookup failure is expected and keeps the defaults.
    pub async fn load(source: &dyn PlanSource, credential: &Credential) -> Self {
        let mut catalog = Self::builtin();

        match source.fetch_overrides(credential).await {
            Ok(overrides) => {
                let applied = catalog.apply_overrides(&overrides);
                tracing::debug!(applied, fetched = overrides.len(), "Loaded plan overrides");
            }
            Err(e) => {
                tracing::info!(error = %e, "Using built-in plan prices");
            }
        }

        catalog
    }

    pub fn plans(&self) -> &[PlanDefinition] {
        &self.plans
    }

    pub fn get(&self, tier: PlanTier) -> Option<&PlanDefinition> {
        self.plans.iter().find(|p| p.tier == tier)
    }

    /// Apply overrides for known tiers; returns how many matched
    pub fn apply_overrides(&mut self, overrides: &[PlanOverride]) -> usize {
        let mut applied = 0;

        for entry in overrides {
            let Ok(tier) = entry.tier.parse::<PlanTier>() else {
                tracing::debug!(tier = %entry.tier, "Ignoring override for unknown tier");
                continue;
            };
            let Some(plan) = self.plans.iter_mut().find(|p| p.tier == tier) else {
                continue;
            };

            if let Some(price) = entry.price.filter(|p| *p > 0) {
                plan.amount = price;
            }
            match entry.duration_days {
                Some(days @ 1..=MAX_DURATION_DAYS) => plan.duration_days = days,
                Some(days) => tracing::warn!(tier = %tier, days, "Ignoring out-of-range plan duration"),
                None => {}
            }
            if let Some(name) = entry.name.as_deref().filter(|s| !s.trim().is_empty()) {
                plan.name = name.to_string();
            }
            if let Some(description) = entry.description.as_deref().filter(|s| !s.trim().is_empty()) {
                plan.description = description.to_string();
            }
            applied += 1;
        }

        applied
    }
}
