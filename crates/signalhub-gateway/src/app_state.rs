//! Shared application state for the hub server.
//!
//! Owns the hub (registry + groups), the dispatcher with its handler table,
//! the inbound policy, and metrics. Cloned into every axum handler.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use signalhub_core::error::Result;

use crate::config::HubConfig;
use crate::dispatch::Dispatcher;
use crate::obs::HubMetrics;
use crate::policy::PolicyEngine;
use crate::realtime::Hub;
use crate::services;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
    hub: Arc<Hub>,
    dispatcher: Arc<Dispatcher>,
}

struct AppStateInner {
    cfg: HubConfig,
    policy: PolicyEngine,
    metrics: Arc<HubMetrics>,
    draining: AtomicBool,
}

impl AppState {
    /// Build state with the built-in handlers registered.
    pub fn new(cfg: HubConfig) -> Result<Self> {
        Self::with_dispatcher(cfg, services::default_dispatcher())
    }

    pub fn with_dispatcher(cfg: HubConfig, dispatcher: Dispatcher) -> Result<Self> {
        cfg.validate()?;

        let metrics = Arc::new(HubMetrics::new());
        let hub = Arc::new(Hub::with_metrics(&cfg.limits, Arc::clone(&metrics)));
        let policy = PolicyEngine::new(&cfg.limits);

        tracing::info!(
            kinds = dispatcher.registered_kinds().len(),
            binary_ops = dispatcher.registered_ops().len(),
            queue_capacity = cfg.limits.outbound_queue_capacity,
            overflow = cfg.limits.overflow_policy.as_str(),
            "hub state initialized"
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                cfg,
                policy,
                metrics,
                draining: AtomicBool::new(false),
            }),
            hub,
            dispatcher: Arc::new(dispatcher),
        })
    }

    pub fn cfg(&self) -> &HubConfig {
        &self.inner.cfg
    }

    pub fn policy(&self) -> &PolicyEngine {
        &self.inner.policy
    }

    pub fn metrics(&self) -> &HubMetrics {
        &self.inner.metrics
    }

    /// Point-in-time gauges appended to `/metrics`.
    pub fn metrics_extra(&self) -> Vec<(&'static str, u64)> {
        vec![
            ("signalhub_registry_connections", self.hub.registry().len() as u64),
            ("signalhub_groups", self.hub.groups().group_count() as u64),
            ("signalhub_draining", u64::from(self.is_draining())),
        ]
    }

    pub fn hub(&self) -> Arc<Hub> {
        Arc::clone(&self.hub)
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.dispatcher)
    }

    pub fn is_draining(&self) -> bool {
        self.inner.draining.load(Ordering::Relaxed)
    }

    /// Stop accepting upgrades and close every live connection.
    pub fn begin_drain(&self) {
        if self.inner.draining.swap(true, Ordering::Relaxed) {
            return;
        }
        self.hub.shutdown();
    }
}
