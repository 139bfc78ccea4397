//! Adapter registry and lifecycle management.
//!
//! The registry exclusively owns adapter registrations. Initialization is
//! idempotent and single-flight: concurrent `initialize` calls for the same
//! adapter serialize on a per-entry async mutex, so the underlying vendor
//! initialization runs at most once. Failures are recorded per adapter and
//! retryable; they never affect sibling adapters.

use super::types::{Adapter, AdapterDescriptor, AdType, RegistrationStatus};
use crate::error::MediationError;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Registration state for one adapter.
struct AdapterEntry {
    adapter: Arc<dyn Adapter>,
    descriptor: AdapterDescriptor,
    status: RegistrationStatus,
    initialized_at: Option<Instant>,
    /// Serializes vendor initialization for this entry.
    init_lock: Arc<tokio::sync::Mutex<()>>,
}

/// Per-adapter line of an initialization report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterReport {
    pub name: String,
    pub registered: bool,
    pub initialized: bool,
    pub version: String,
}

struct RegistryInner {
    entries: HashMap<String, AdapterEntry>,
    /// Registration order; `list_available` and reports follow it.
    order: Vec<String>,
}

/// Owns adapter instances and their registration lifecycle.
pub struct AdapterRegistry {
    inner: RwLock<RegistryInner>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner {
                entries: HashMap::new(),
                order: Vec::new(),
            }),
        }
    }

    /// Registers an adapter under its descriptor name.
    ///
    /// # Errors
    ///
    /// `DuplicateAdapter` if the name is already registered.
    pub fn register(
        &self,
        descriptor: AdapterDescriptor,
        adapter: Arc<dyn Adapter>,
    ) -> Result<(), MediationError> {
        let mut inner = self.inner.write().unwrap();
        let name = descriptor.name.clone();

        if inner.entries.contains_key(&name) {
            return Err(MediationError::DuplicateAdapter(name));
        }

        debug!(adapter = %name, version = %descriptor.adapter_version, "adapter registered");
        inner.entries.insert(
            name.clone(),
            AdapterEntry {
                adapter,
                descriptor,
                status: RegistrationStatus::Discovered,
                initialized_at: None,
                init_lock: Arc::new(tokio::sync::Mutex::new(())),
            },
        );
        inner.order.push(name);
        Ok(())
    }

    /// Initializes an adapter, idempotently and single-flight.
    ///
    /// If the adapter is already initialized this returns immediately
    /// without re-invoking the vendor. Concurrent calls for the same name
    /// serialize; only the first performs the vendor initialization, the
    /// rest observe the result. A failed attempt records `Failed` and may
    /// be retried by calling again.
    pub async fn initialize(
        &self,
        name: &str,
        config: &serde_json::Value,
    ) -> Result<(), MediationError> {
        let (adapter, init_lock) = {
            let inner = self.inner.read().unwrap();
            let entry = inner
                .entries
                .get(name)
                .ok_or_else(|| MediationError::AdapterNotFound(name.to_string()))?;

            if entry.status == RegistrationStatus::Initialized {
                return Ok(());
            }
            (Arc::clone(&entry.adapter), Arc::clone(&entry.init_lock))
        };

        let _guard = init_lock.lock().await;

        // A concurrent caller may have finished while we waited.
        if self.status(name) == Some(RegistrationStatus::Initialized) {
            return Ok(());
        }

        self.set_status(name, RegistrationStatus::Initializing);
        match adapter.initialize(config).await {
            Ok(()) => {
                self.mark_initialized(name);
                info!(adapter = %name, "adapter initialized");
                Ok(())
            }
            Err(err) => {
                self.set_status(name, RegistrationStatus::Failed);
                warn!(adapter = %name, error = %err, "adapter initialization failed");
                Err(err.into())
            }
        }
    }

    /// Returns the live adapter instance for a name.
    pub fn get_adapter(&self, name: &str) -> Result<Arc<dyn Adapter>, MediationError> {
        let inner = self.inner.read().unwrap();
        inner
            .entries
            .get(name)
            .map(|entry| Arc::clone(&entry.adapter))
            .ok_or_else(|| MediationError::AdapterNotFound(name.to_string()))
    }

    /// Returns all registered adapter names in registration order.
    pub fn list_available(&self) -> Vec<String> {
        let inner = self.inner.read().unwrap();
        inner.order.clone()
    }

    /// Returns the registration status of an adapter, if registered.
    pub fn status(&self, name: &str) -> Option<RegistrationStatus> {
        let inner = self.inner.read().unwrap();
        inner.entries.get(name).map(|entry| entry.status)
    }

    /// Monotonic instant at which an adapter finished initializing.
    pub fn initialized_at(&self, name: &str) -> Option<Instant> {
        let inner = self.inner.read().unwrap();
        inner.entries.get(name).and_then(|entry| entry.initialized_at)
    }

    /// Returns initialized adapters supporting the given ad type, in
    /// registration order. This is the orchestrator's candidate source.
    pub fn initialized_for(&self, ad_type: AdType) -> Vec<(String, Arc<dyn Adapter>)> {
        let inner = self.inner.read().unwrap();
        inner
            .order
            .iter()
            .filter_map(|name| {
                let entry = inner.entries.get(name)?;
                if entry.status == RegistrationStatus::Initialized
                    && entry.adapter.supports_ad_type(ad_type)
                {
                    Some((name.clone(), Arc::clone(&entry.adapter)))
                } else {
                    None
                }
            })
            .collect()
    }

    /// Per-adapter diagnostics report in registration order.
    pub fn initialization_report(&self) -> Vec<AdapterReport> {
        let inner = self.inner.read().unwrap();
        inner
            .order
            .iter()
            .filter_map(|name| {
                let entry = inner.entries.get(name)?;
                Some(AdapterReport {
                    name: name.clone(),
                    registered: true,
                    initialized: entry.status == RegistrationStatus::Initialized,
                    version: entry.descriptor.adapter_version.clone(),
                })
            })
            .collect()
    }

    /// Destroys all adapters and clears the registry. Process-teardown only.
    pub async fn clear(&self) {
        let adapters: Vec<Arc<dyn Adapter>> = {
            let mut inner = self.inner.write().unwrap();
            let adapters = inner
                .order
                .iter()
                .filter_map(|name| inner.entries.get(name).map(|e| Arc::clone(&e.adapter)))
                .collect();
            inner.entries.clear();
            inner.order.clear();
            adapters
        };

        for adapter in adapters {
            adapter.destroy().await;
        }
    }

    fn set_status(&self, name: &str, status: RegistrationStatus) {
        let mut inner = self.inner.write().unwrap();
        if let Some(entry) = inner.entries.get_mut(name) {
            entry.status = status;
        }
    }

    fn mark_initialized(&self, name: &str) {
        let mut inner = self.inner.write().unwrap();
        if let Some(entry) = inner.entries.get_mut(name) {
            entry.status = RegistrationStatus::Initialized;
            entry.initialized_at = Some(Instant::now());
        }
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read().unwrap();
        f.debug_struct("AdapterRegistry")
            .field("registered", &inner.order.len())
            .finish()
    }
}
