// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::billing::LedgerBackend;
use crate::capability::CapabilityService;
use crate::config::Settings;
use crate::delegation::{ControlHandler, DelegationManager};
use crate::lifecycle::Lifecycle;
use crate::locks::RouterLocks;
use crate::providers::Provider;
use crate::storage::FileStore;

/// Session JWT verification settings.
#[derive(Clone, Default)]
pub struct AuthConfig {
    /// HS256 secret. `None` accepts unsigned tokens (development only).
    pub jwt_secret: Option<Vec<u8>>,
}

impl AuthConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            jwt_secret: settings
                .auth_jwt_secret
                .as_ref()
                .map(|s| s.as_bytes().to_vec()),
        }
    }

    pub fn is_production(&self) -> bool {
        self.jwt_secret.is_some()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub storage: Arc<FileStore>,
    pub locks: Arc<RouterLocks>,
    pub capabilities: Arc<CapabilityService>,
    pub ledger: Arc<LedgerBackend>,
    pub provider: Arc<Provider>,
    pub auth_config: AuthConfig,
}

impl AppState {
    pub fn new(
        settings: Settings,
        storage: FileStore,
        capabilities: CapabilityService,
        ledger: LedgerBackend,
        provider: Provider,
    ) -> Self {
        let auth_config = AuthConfig::from_settings(&settings);
        Self {
            settings: Arc::new(settings),
            storage: Arc::new(storage),
            locks: Arc::new(RouterLocks::new()),
            capabilities: Arc::new(capabilities),
            ledger: Arc::new(ledger),
            provider: Arc::new(provider),
            auth_config,
        }
    }

    pub fn lifecycle(&self) -> Lifecycle<'_> {
        Lifecycle::new(&self.storage, &self.locks)
    }

    pub fn delegation(&self) -> DelegationManager<'_> {
        DelegationManager::new(&self.storage, &self.locks, &self.capabilities)
    }

    pub fn control(&self) -> ControlHandler<'_> {
        ControlHandler::new(&self.storage, &self.locks, &self.capabilities)
    }

    /// State over a fresh store in `data_dir`: owner `alice@x`, in-memory
    /// ledger, built-in provider, unsigned session tokens.
    #[cfg(test)]
    pub fn for_tests(data_dir: &std::path::Path) -> Self {
        use crate::billing::InMemoryLedger;
        use crate::providers::BuiltinProvider;

        let settings = Settings::for_tests(data_dir);
        let mut storage = FileStore::new(settings.storage_paths());
        storage.initialize().expect("initialize test storage");

        let secret = settings
            .control_token_secret
            .clone()
            .unwrap_or_default()
            .into_bytes();
        let capabilities = CapabilityService::new(
            &secret,
            chrono::Duration::days(settings.control_token_ttl_days),
        );
        let provider = Provider::Builtin(BuiltinProvider::new(storage.paths().projects_dir()));

        Self::new(
            settings,
            storage,
            capabilities,
            LedgerBackend::Memory(InMemoryLedger::default()),
            provider,
        )
    }
}
