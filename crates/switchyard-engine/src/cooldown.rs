// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider cooldowns after rate limiting or authentication failures.

use std::time::Duration;

use dashmap::DashMap;
use switchyard_config::model::FallbackConfig;
use switchyard_core::ProviderErrorKind;
use tokio::time::Instant;
use tracing::info;

pub struct Cooldowns {
    until: DashMap<String, Instant>,
    rate_limited: Duration,
    auth: Duration,
}

impl Cooldowns {
    pub fn new(config: &FallbackConfig) -> Self {
        Self {
            until: DashMap::new(),
            rate_limited: Duration::from_secs(config.rate_limit_cooldown_secs),
            auth: Duration::from_secs(config.auth_cooldown_secs),
        }
    }

    /// Start a cooldown if `kind` calls for one.
    pub fn observe(&self, provider_id: &str, kind: ProviderErrorKind) {
        let duration = match kind {
            ProviderErrorKind::RateLimited => self.rate_limited,
            ProviderErrorKind::AuthError => self.auth,
            ProviderErrorKind::Timeout | ProviderErrorKind::ServerError => return,
        };
        if duration.is_zero() {
            return;
        }
        info!(provider = provider_id, %kind, secs = duration.as_secs(), "provider cooling down");
        self.until
            .insert(provider_id.to_string(), Instant::now() + duration);
    }

    pub fn is_cooling(&self, provider_id: &str) -> bool {
        let now = Instant::now();
        let cooling = self
            .until
            .get(provider_id)
            .is_some_and(|until| now < *until);
        if !cooling {
            self.until.remove_if(provider_id, |_, until| now >= *until);
        }
        cooling
    }
}
