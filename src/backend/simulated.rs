//! Simulated Pair
//!
//! In-memory stand-in for a real primary/standby pair, used for failover
//! drills and tests. A successful role change swaps the roles of the two
//! sites. Faults can be injected: unreachable sites, protocol refusal,
//! readiness strings, apply gap, topology failures, and a protocol that
//! reports success without ever changing roles.
//!
//! When opened with [`SimulatedPair::persistent`] the simulated roles are
//! kept in a JSON file so one-shot CLI invocations see each other's drills.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{
    InstanceStatusSource, PairBackend, ProtocolFailure, RoleChangeProtocol, TopologyApplier,
    Unreachable,
};
use crate::errors::HaResult;
use crate::pair::{ConnectionInfo, PairConfig, Site};
use crate::status::{InstanceReport, ProtectionMode, ReplicationRole};
use crate::sync::{lock, wait};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SimInstance {
    role: ReplicationRole,
    reachable: bool,
    #[serde(default)]
    readiness_override: Option<String>,
    #[serde(default)]
    apply_gap_seconds: u64,
}

impl SimInstance {
    fn new(role: ReplicationRole) -> Self {
        Self {
            role,
            reachable: true,
            readiness_override: None,
            apply_gap_seconds: 0,
        }
    }

    fn readiness(&self) -> String {
        if let Some(ref readiness) = self.readiness_override {
            return readiness.clone();
        }
        match self.role {
            ReplicationRole::Standby => "TO PRIMARY".to_string(),
            ReplicationRole::Primary => "TO STANDBY".to_string(),
            ReplicationRole::Unknown => "NOT ALLOWED".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SimState {
    primary: SimInstance,
    standby: SimInstance,
    protection_mode: ProtectionMode,
    #[serde(default)]
    protocol_failure: Option<String>,
    #[serde(default)]
    ignore_role_change: bool,
    #[serde(default)]
    apply_failure: Option<Site>,
    #[serde(default)]
    applied: Vec<Site>,
    #[serde(default)]
    failovers_requested: u32,
    #[serde(default)]
    switchbacks_requested: u32,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            primary: SimInstance::new(ReplicationRole::Primary),
            standby: SimInstance::new(ReplicationRole::Standby),
            protection_mode: ProtectionMode::MaxPerformance,
            protocol_failure: None,
            ignore_role_change: false,
            apply_failure: None,
            applied: Vec::new(),
            failovers_requested: 0,
            switchbacks_requested: 0,
        }
    }
}

impl SimState {
    fn instance_mut(&mut self, site: Site) -> &mut SimInstance {
        match site {
            Site::Primary => &mut self.primary,
            Site::Standby => &mut self.standby,
        }
    }

    fn instance(&self, site: Site) -> &SimInstance {
        match site {
            Site::Primary => &self.primary,
            Site::Standby => &self.standby,
        }
    }
}

#[derive(Debug, Default)]
struct ProtocolGate {
    paused: bool,
    entered: u32,
}

/// In-memory primary/standby pair
pub struct SimulatedPair {
    state: Mutex<SimState>,
    gate: Mutex<ProtocolGate>,
    gate_changed: Condvar,
    state_path: Option<PathBuf>,
}

impl Default for SimulatedPair {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedPair {
    /// Steady pair: primary site PRIMARY, standby site STANDBY, both reachable.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState::default()),
            gate: Mutex::new(ProtocolGate::default()),
            gate_changed: Condvar::new(),
            state_path: None,
        }
    }

    /// Simulated pair whose roles survive process restarts.
    pub fn persistent(path: &Path) -> HaResult<Self> {
        let state = if path.exists() {
            let content = fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        } else {
            SimState::default()
        };
        Ok(Self {
            state: Mutex::new(state),
            gate: Mutex::new(ProtocolGate::default()),
            gate_changed: Condvar::new(),
            state_path: Some(path.to_path_buf()),
        })
    }

    // =========================================================================
    // FAULT INJECTION
    // =========================================================================

    pub fn set_role(&self, site: Site, role: ReplicationRole) {
        self.mutate(|s| s.instance_mut(site).role = role);
    }

    pub fn set_reachable(&self, site: Site, reachable: bool) {
        self.mutate(|s| s.instance_mut(site).reachable = reachable);
    }

    /// Override the readiness string; `None` restores the role-derived default.
    pub fn set_readiness(&self, site: Site, readiness: Option<&str>) {
        self.mutate(|s| s.instance_mut(site).readiness_override = readiness.map(str::to_string));
    }

    pub fn set_apply_gap(&self, site: Site, seconds: u64) {
        self.mutate(|s| s.instance_mut(site).apply_gap_seconds = seconds);
    }

    pub fn set_protection_mode(&self, mode: ProtectionMode) {
        self.mutate(|s| s.protection_mode = mode);
    }

    /// Make every role-change request fail with `message`.
    pub fn fail_protocol(&self, message: Option<&str>) {
        self.mutate(|s| s.protocol_failure = message.map(str::to_string));
    }

    /// Accept role-change requests but never change roles.
    pub fn ignore_role_changes(&self, ignore: bool) {
        self.mutate(|s| s.ignore_role_change = ignore);
    }

    /// Make topology application fail on one site.
    pub fn fail_apply_on(&self, site: Option<Site>) {
        self.mutate(|s| s.apply_failure = site);
    }

    // =========================================================================
    // PROTOCOL GATE
    // =========================================================================

    /// Hold every role-change request until [`resume_protocol`](Self::resume_protocol).
    pub fn pause_protocol(&self) {
        lock(&self.gate).paused = true;
    }

    pub fn resume_protocol(&self) {
        lock(&self.gate).paused = false;
        self.gate_changed.notify_all();
    }

    /// Block until at least `count` role-change requests have entered the protocol.
    pub fn wait_for_protocol_entry(&self, count: u32) {
        let mut gate = lock(&self.gate);
        while gate.entered < count {
            gate = wait(&self.gate_changed, gate);
        }
    }

    // =========================================================================
    // INSPECTION
    // =========================================================================

    pub fn role(&self, site: Site) -> ReplicationRole {
        lock(&self.state).instance(site).role
    }

    /// Sites topology was applied to, in order.
    pub fn applied_sites(&self) -> Vec<Site> {
        lock(&self.state).applied.clone()
    }

    pub fn failovers_requested(&self) -> u32 {
        lock(&self.state).failovers_requested
    }

    pub fn switchbacks_requested(&self) -> u32 {
        lock(&self.state).switchbacks_requested
    }

    fn mutate<T>(&self, f: impl FnOnce(&mut SimState) -> T) -> T {
        let mut state = lock(&self.state);
        let result = f(&mut state);
        self.save(&state);
        result
    }

    fn save(&self, state: &SimState) {
        let Some(ref path) = self.state_path else {
            return;
        };
        let write = || -> HaResult<()> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let tmp = path.with_extension("tmp");
            fs::write(&tmp, serde_json::to_vec_pretty(state)?)?;
            fs::rename(&tmp, path)?;
            Ok(())
        };
        if let Err(e) = write() {
            warn!(path = %path.display(), error = %e, "failed to persist simulated pair");
        }
    }

    fn pass_gate(&self) {
        let mut gate = lock(&self.gate);
        gate.entered += 1;
        self.gate_changed.notify_all();
        while gate.paused {
            gate = wait(&self.gate_changed, gate);
        }
    }
}

impl InstanceStatusSource for SimulatedPair {
    fn query_instance(&self, conn: &ConnectionInfo) -> Result<InstanceReport, Unreachable> {
        let state = lock(&self.state);
        let instance = state.instance(conn.site);
        if !instance.reachable {
            return Err(Unreachable(format!("{} did not answer", conn.address())));
        }
        let mut report = InstanceReport::new(instance.role, state.protection_mode)
            .with_readiness(instance.readiness());
        if instance.role == ReplicationRole::Standby {
            report = report.with_apply_gap(instance.apply_gap_seconds);
        }
        Ok(report)
    }
}

impl RoleChangeProtocol for SimulatedPair {
    fn request_failover(&self, _pair: &PairConfig) -> Result<(), ProtocolFailure> {
        self.pass_gate();
        self.mutate(|s| {
            s.failovers_requested += 1;
            if let Some(ref message) = s.protocol_failure {
                return Err(ProtocolFailure(message.clone()));
            }
            if !s.standby.reachable {
                return Err(ProtocolFailure("standby site is unreachable".into()));
            }
            if !s.ignore_role_change {
                s.standby.role = ReplicationRole::Primary;
                s.primary.role = ReplicationRole::Standby;
            }
            Ok(())
        })
    }

    fn request_switchback(&self, _pair: &PairConfig) -> Result<(), ProtocolFailure> {
        self.pass_gate();
        self.mutate(|s| {
            s.switchbacks_requested += 1;
            if let Some(ref message) = s.protocol_failure {
                return Err(ProtocolFailure(message.clone()));
            }
            if !s.primary.reachable || !s.standby.reachable {
                return Err(ProtocolFailure(
                    "switchback requires both sites to be reachable".into(),
                ));
            }
            if !s.ignore_role_change {
                s.primary.role = ReplicationRole::Primary;
                s.standby.role = ReplicationRole::Standby;
            }
            Ok(())
        })
    }
}

impl TopologyApplier for SimulatedPair {
    fn apply_topology(&self, site: Site, _pair: &PairConfig) -> Result<(), ProtocolFailure> {
        self.mutate(|s| {
            if s.apply_failure == Some(site) {
                return Err(ProtocolFailure(format!("{} site rejected topology", site)));
            }
            s.applied.push(site);
            Ok(())
        })
    }
}

impl PairBackend for SimulatedPair {
    fn name(&self) -> &'static str {
        "simulated"
    }
}
