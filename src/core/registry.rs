use crate::core::communication::DeviceService;
use crate::core::terminal::TerminalLog;
use crate::domain::config::DeviceClass;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

static IDENTITY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^v(\d+\.\d+\.\d+(?:[-+][0-9A-Za-z.\-+]*)?)\s+(\S.*)$")
        .expect("valid identity regex")
});

/// Name and firmware version reported by a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub version: String,
    pub name: String,
}

impl Identity {
    pub fn new(version: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            name: name.into(),
        }
    }

    pub fn unknown() -> Self {
        Self::new("0.0.0", "Unknown")
    }
}

/// Parse an identification reply of the shape `v<semver> <name>`.
/// Anything else is an unknown device.
pub fn parse_identity(reply: &str) -> Identity {
    IDENTITY_PATTERN
        .captures(reply.trim())
        .map(|caps| Identity::new(&caps[1], caps[2].trim()))
        .unwrap_or_else(Identity::unknown)
}

/// One discovered device endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    pub id: String,
    pub raw_name: String,
    pub version: String,
    pub display_label: String,
    /// Set until the identification probe for this endpoint completes
    pub identifying: bool,
}

impl Endpoint {
    fn pending(id: &str) -> Self {
        Self {
            id: id.to_string(),
            raw_name: String::new(),
            version: String::new(),
            display_label: format!("{} (identifying...)", id),
            identifying: true,
        }
    }

    fn resolve(&mut self, identity: Identity) {
        self.display_label = format!("{} v{} ({})", identity.name, identity.version, self.id);
        self.raw_name = identity.name;
        self.version = identity.version;
        self.identifying = false;
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    generation: u64,
    endpoints: Vec<Endpoint>,
}

/// Set of endpoints found by the last scan.
///
/// Each endpoint is identified by its own probe task. A probe only ever
/// touches its own entry, and only if no newer scan replaced the set.
#[derive(Clone)]
pub struct DeviceRegistry {
    service: Arc<dyn DeviceService>,
    terminal: TerminalLog,
    generic_label: String,
    state: Arc<RwLock<RegistryState>>,
    probes: Arc<Mutex<JoinSet<()>>>,
}

impl DeviceRegistry {
    pub fn new(
        service: Arc<dyn DeviceService>,
        terminal: TerminalLog,
        generic_label: impl Into<String>,
    ) -> Self {
        Self {
            service,
            terminal,
            generic_label: generic_label.into(),
            state: Arc::new(RwLock::new(RegistryState::default())),
            probes: Arc::new(Mutex::new(JoinSet::new())),
        }
    }

    /// Replace the endpoint set with a fresh scan and start one
    /// identification probe per endpoint. Returns the ids found.
    pub async fn scan(&self, class: DeviceClass) -> Vec<String> {
        self.terminal.info("Scanning for devices...").await;

        let mut ids = match self.service.scan_endpoints(class).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Device scan failed: {}", e);
                self.terminal.error(format!("Device scan failed: {}", e)).await;
                Vec::new()
            }
        };

        // one entry and one probe per id, first occurrence wins
        let mut seen = HashSet::new();
        ids.retain(|id| seen.insert(id.clone()));

        let generation = {
            let mut state = self.state.write().await;
            state.generation += 1;
            state.endpoints = ids.iter().map(|id| Endpoint::pending(id)).collect();
            state.generation
        };

        info!("Scan found {} {} endpoint(s)", ids.len(), class);
        self.terminal
            .info(format!("Found {} device(s)", ids.len()))
            .await;

        let mut probes = self.probes.lock().await;
        probes.abort_all();
        if ids.is_empty() {
            self.terminal.info("Device detection completed").await;
        }
        for id in &ids {
            let registry = self.clone();
            let id = id.clone();
            probes.spawn(async move { registry.probe(generation, id).await });
        }

        ids
    }

    async fn probe(&self, generation: u64, id: String) {
        let identity = match self.service.identify(&id).await {
            Ok(reply) => parse_identity(&reply),
            Err(e) => {
                debug!("Identification of '{}' failed: {}", id, e);
                Identity::new("1.0.0", format!("{} {}", self.generic_label, id))
            }
        };

        let finished = {
            let mut state = self.state.write().await;
            if state.generation != generation {
                return;
            }
            if let Some(endpoint) = state.endpoints.iter_mut().find(|e| e.id == id) {
                debug!("Identified '{}' as {} v{}", id, identity.name, identity.version);
                endpoint.resolve(identity);
            }
            state.endpoints.iter().all(|e| !e.identifying)
        };

        if finished {
            self.terminal.info("Device detection completed").await;
        }
    }

    /// Wait until every probe started by the last scan has finished
    pub async fn wait_identified(&self) {
        let mut probes = std::mem::take(&mut *self.probes.lock().await);
        while probes.join_next().await.is_some() {}
    }

    /// Snapshot of the current endpoint set, in scan order
    pub async fn endpoints(&self) -> Vec<Endpoint> {
        self.state.read().await.endpoints.clone()
    }

    pub async fn get(&self, id: &str) -> Option<Endpoint> {
        self.state
            .read()
            .await
            .endpoints
            .iter()
            .find(|e| e.id == id)
            .cloned()
    }

    /// First endpoint of the last scan, if any
    pub async fn first(&self) -> Option<Endpoint> {
        self.state.read().await.endpoints.first().cloned()
    }
}
