// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Budget-aware provider selection.
//!
//! Produces the ordered fallback chain for a query: quality-qualified
//! providers ranked by quality per unit cost, then the remaining eligible
//! providers. Critical queries put premium providers first and ignore cost.

use std::cmp::Ordering;

use switchyard_config::model::SelectorConfig;
use switchyard_core::{BudgetHint, ComplexityClass, ProviderProfile, ProviderTier};
use tracing::{debug, info};

/// Budget state visible to the selector.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BudgetView {
    /// Period spend divided by the cap; `None` when uncapped.
    pub spend_ratio: Option<f64>,
    /// Allowance left this period; `None` when uncapped.
    pub remaining_usd: Option<f64>,
}

impl BudgetView {
    pub fn uncapped() -> Self {
        Self::default()
    }
}

/// Outcome of provider selection.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// Providers to try, in order.
    Chain(Vec<ProviderProfile>),
    /// Budget rules excluded every available provider.
    BudgetExceeded,
    /// Every provider is cooling down.
    NoneAvailable,
}

/// Orders providers for the fallback executor.
pub struct ProviderSelector {
    config: SelectorConfig,
}

impl ProviderSelector {
    pub fn new(config: &SelectorConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Select up to `max_attempts` providers for a query of `class`.
    pub fn select(
        &self,
        class: ComplexityClass,
        profiles: &[ProviderProfile],
        budget: BudgetView,
        max_attempts: usize,
    ) -> Selection {
        let available: Vec<&ProviderProfile> = profiles.iter().filter(|p| !p.on_cooldown).collect();
        if available.is_empty() {
            return Selection::NoneAvailable;
        }

        let critical = class == ComplexityClass::Critical;
        let eligible: Vec<&ProviderProfile> = available
            .into_iter()
            .filter(|p| critical || self.within_budget(p, budget))
            .collect();
        if eligible.is_empty() {
            info!(%class, ?budget, "budget excludes every provider");
            return Selection::BudgetExceeded;
        }

        let floor = self.config.quality_floors.for_class(class);
        let (mut qualified, mut rest): (Vec<&ProviderProfile>, Vec<&ProviderProfile>) =
            eligible.into_iter().partition(|p| p.quality() >= floor);

        let order = |a: &&ProviderProfile, b: &&ProviderProfile| self.rank(class, a, b);
        qualified.sort_by(order);
        rest.sort_by(order);

        let chain: Vec<ProviderProfile> = qualified
            .into_iter()
            .chain(rest)
            .take(max_attempts.max(1))
            .cloned()
            .collect();
        debug!(
            %class,
            chain = ?chain.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(),
            "provider chain selected"
        );
        Selection::Chain(chain)
    }

    /// Guidance passed to the provider for a query of `class`.
    pub fn budget_hint(&self, class: ComplexityClass, budget: BudgetView) -> BudgetHint {
        BudgetHint {
            class,
            max_cost_usd: if class == ComplexityClass::Critical {
                None
            } else {
                budget.remaining_usd
            },
            max_tokens: self.config.max_tokens_for(class),
        }
    }

    /// Quality per unit of effective cost.
    pub fn score(&self, profile: &ProviderProfile) -> f64 {
        profile.quality() / profile.effective_cost().max(self.config.cost_floor)
    }

    fn within_budget(&self, profile: &ProviderProfile, budget: BudgetView) -> bool {
        if let Some(ratio) = budget.spend_ratio {
            let cutoff = match profile.tier {
                ProviderTier::Premium => Some(self.config.premium_cutoff),
                ProviderTier::Standard => Some(self.config.standard_cutoff),
                ProviderTier::Free => None,
            };
            if cutoff.is_some_and(|c| ratio >= c) {
                return false;
            }
        }
        match budget.remaining_usd {
            Some(remaining) => profile.effective_cost() <= remaining,
            None => true,
        }
    }

    fn rank(&self, class: ComplexityClass, a: &ProviderProfile, b: &ProviderProfile) -> Ordering {
        let by_id = a.id.cmp(&b.id);
        if class == ComplexityClass::Critical && self.config.critical_prefers_premium {
            return b
                .tier
                .cmp(&a.tier)
                .then_with(|| b.quality().total_cmp(&a.quality()))
                .then(by_id);
        }
        self.score(b).total_cmp(&self.score(a)).then(by_id)
    }
}
