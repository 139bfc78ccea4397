//! Presentation lifecycle control.
//!
//! Governs attach/detach/show per placement. Show is exclusive: at most
//! one presentation may be in flight per placement, and duplicates are
//! rejected with a distinct `PresenterBusy` outcome instead of silently
//! doing nothing. The per-placement lock is an RAII guard held for the
//! duration of the show operation only.

use super::container::AdContainer;
use crate::cache::{AdCache, CachedAd};
use crate::error::MediationError;
use crate::telemetry::TelemetryClient;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Rendering behavior when no cached ad is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentationMode {
    /// Render nothing and report `NoFill`.
    Production,
    /// Render a visible placeholder so integration is observable.
    Sandbox,
}

/// Releases the per-placement show lock when dropped.
///
/// Hold it while the presentation is on screen; dropping it allows the
/// next `show` for the placement.
#[must_use = "dropping the guard immediately releases show exclusivity"]
pub struct ShowGuard {
    placement_id: String,
    active: Arc<DashMap<String, ()>>,
}

impl Drop for ShowGuard {
    fn drop(&mut self) {
        self.active.remove(&self.placement_id);
        debug!(placement = %self.placement_id, "show finished");
    }
}

impl std::fmt::Debug for ShowGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShowGuard")
            .field("placement_id", &self.placement_id)
            .finish()
    }
}

/// Governs attach/detach/show per placement.
pub struct PresentationController {
    cache: Arc<AdCache>,
    telemetry: TelemetryClient,
    mode: PresentationMode,
    /// Placements with a show in flight.
    active_shows: Arc<DashMap<String, ()>>,
    /// Refresh timers keyed by container address.
    refresh_tasks: DashMap<usize, tokio::task::JoinHandle<()>>,
}

impl PresentationController {
    pub fn new(cache: Arc<AdCache>, telemetry: TelemetryClient, mode: PresentationMode) -> Self {
        Self {
            cache,
            telemetry,
            mode,
            active_shows: Arc::new(DashMap::new()),
            refresh_tasks: DashMap::new(),
        }
    }

    /// Renders the cached ad for a placement into a container.
    ///
    /// With no usable cached ad, sandbox mode renders a placeholder and
    /// production mode renders nothing and reports `NoFill`. A refresh
    /// interval arms a timer that re-renders from cache until `detach`.
    pub fn attach(
        &self,
        container: Arc<dyn AdContainer>,
        placement_id: &str,
        refresh_interval: Option<Duration>,
    ) -> Result<(), MediationError> {
        let rendered = self.render_from_cache(container.as_ref(), placement_id);

        if let Some(interval) = refresh_interval {
            self.arm_refresh(Arc::clone(&container), placement_id, interval);
        }

        match (rendered, self.mode) {
            (true, _) => Ok(()),
            (false, PresentationMode::Sandbox) => {
                container.render_placeholder();
                debug!(placement = placement_id, "rendered sandbox placeholder");
                Ok(())
            }
            (false, PresentationMode::Production) => Err(MediationError::NoFill),
        }
    }

    /// Clears a container and cancels its refresh timer.
    pub fn detach(&self, container: &Arc<dyn AdContainer>) {
        if let Some((_, task)) = self.refresh_tasks.remove(&container_key(container)) {
            task.abort();
        }
        container.clear();
    }

    /// Acquires show exclusivity for a placement.
    ///
    /// Fails with `PresenterBusy` while another show is in flight for the
    /// same placement.
    pub fn begin_show(&self, placement_id: &str) -> Result<ShowGuard, MediationError> {
        use dashmap::mapref::entry::Entry;

        match self.active_shows.entry(placement_id.to_string()) {
            Entry::Occupied(_) => {
                warn!(placement = placement_id, "duplicate show rejected");
                self.telemetry.presenter_busy(placement_id);
                Err(MediationError::PresenterBusy(placement_id.to_string()))
            }
            Entry::Vacant(entry) => {
                entry.insert(());
                Ok(ShowGuard {
                    placement_id: placement_id.to_string(),
                    active: Arc::clone(&self.active_shows),
                })
            }
        }
    }

    /// Consumes the cached ad for a placement and begins its presentation.
    ///
    /// Returns the ad to present together with the exclusivity guard; the
    /// caller keeps the guard alive while the ad is on screen.
    pub fn show(&self, placement_id: &str) -> Result<(CachedAd, ShowGuard), MediationError> {
        let guard = self.begin_show(placement_id)?;

        let ad = self
            .cache
            .take(placement_id)
            .ok_or(MediationError::NoFill)?;

        self.telemetry.ad_shown(placement_id, &ad.network);
        debug!(placement = placement_id, network = %ad.network, "ad shown");
        Ok((ad, guard))
    }

    fn render_from_cache(&self, container: &dyn AdContainer, placement_id: &str) -> bool {
        match self.cache.get(placement_id) {
            Some(ad) => {
                container.clear();
                container.render_creative(&ad.creative);
                self.telemetry.ad_shown(placement_id, &ad.network);
                true
            }
            None => false,
        }
    }

    fn arm_refresh(
        &self,
        container: Arc<dyn AdContainer>,
        placement_id: &str,
        interval: Duration,
    ) {
        let key = container_key(&container);
        let cache = Arc::clone(&self.cache);
        let placement = placement_id.to_string();
        let mode = self.mode;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                match cache.get(&placement) {
                    Some(ad) => {
                        container.clear();
                        container.render_creative(&ad.creative);
                    }
                    None if mode == PresentationMode::Sandbox => {
                        container.clear();
                        container.render_placeholder();
                    }
                    None => {}
                }
            }
        });

        // Re-attaching the same container replaces its timer.
        if let Some(previous) = self.refresh_tasks.insert(key, task) {
            previous.abort();
        }
    }
}

fn container_key(container: &Arc<dyn AdContainer>) -> usize {
    Arc::as_ptr(container) as *const () as usize
}

impl Drop for PresentationController {
    fn drop(&mut self) {
        for entry in self.refresh_tasks.iter() {
            entry.value().abort();
        }
    }
}

impl std::fmt::Debug for PresentationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresentationController")
            .field("mode", &self.mode)
            .field("active_shows", &self.active_shows.len())
            .finish()
    }
}
