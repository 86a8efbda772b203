//! Pair Configuration Manager
//!
//! Validates a new pair configuration, refuses it while a transition holds
//! the state flag, applies topology to both sites and persists it. The
//! whole sequence runs inside one state-store update, so no transition can
//! start between the conflict check and the write.

use std::sync::Arc;

use tracing::{info, warn};

use super::config::{PairConfig, Site};
use crate::backend::TopologyApplier;
use crate::errors::{HaError, HaResult};
use crate::observability::Event;
use crate::transition::StateStore;

pub struct PairConfigManager {
    applier: Arc<dyn TopologyApplier>,
}

impl PairConfigManager {
    pub fn new(applier: Arc<dyn TopologyApplier>) -> Self {
        Self { applier }
    }

    /// Validate, apply and persist `config`.
    ///
    /// Topology goes to the primary site first. Application is not
    /// transactional across the two instances: if the standby site fails
    /// after the primary site succeeded, the previous config stays active
    /// and the error names the failed site. Re-applying is idempotent.
    pub fn configure(&self, store: &StateStore, config: PairConfig) -> HaResult<PairConfig> {
        if let Err(e) = config.validate() {
            warn!(event = %Event::ConfigureRejected, error = %e, "pair config rejected");
            return Err(e);
        }

        let result = store.update(|state| {
            if !state.transition_state.is_steady() {
                return Err(HaError::ConfigurationConflict(state.transition_state));
            }
            for site in [Site::Primary, Site::Standby] {
                self.applier
                    .apply_topology(site, &config)
                    .map_err(|e| HaError::ConfigurationApplyFailed {
                        site,
                        message: e.0,
                    })?;
            }
            state.pair_config = Some(config.clone());
            Ok(config.clone())
        });

        match result {
            Ok(applied) => {
                info!(
                    event = %Event::ConfigureApplied,
                    primary = %applied.connection(Site::Primary).address(),
                    standby = %applied.connection(Site::Standby).address(),
                    "pair config applied"
                );
                Ok(applied)
            }
            Err(e) => {
                warn!(event = %Event::ConfigureRejected, error = %e, "pair config not applied");
                Err(e)
            }
        }
    }

    /// Active pair configuration.
    pub fn active(&self, store: &StateStore) -> HaResult<PairConfig> {
        store.snapshot()?.pair_config.ok_or(HaError::NotConfigured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SimulatedPair;
    use crate::transition::{TransitionKind, TransitionState};
    use tempfile::TempDir;

    fn pair_config() -> PairConfig {
        PairConfig {
            primary_host: "east".into(),
            primary_port: 1521,
            standby_host: "west".into(),
            standby_port: 1521,
            primary_db_name: "EAST".into(),
            standby_db_name: "WEST".into(),
            admin_credential_ref: String::new(),
        }
    }

    fn setup() -> (TempDir, StateStore, Arc<SimulatedPair>, PairConfigManager) {
        let tmp = TempDir::new().unwrap();
        let store = StateStore::open(tmp.path()).unwrap();
        let sim = Arc::new(SimulatedPair::new());
        let manager = PairConfigManager::new(sim.clone());
        (tmp, store, sim, manager)
    }

    #[test]
    fn test_configure_applies_both_sites_and_persists() {
        let (_tmp, store, sim, manager) = setup();

        manager.configure(&store, pair_config()).unwrap();

        assert_eq!(sim.applied_sites(), vec![Site::Primary, Site::Standby]);
        assert_eq!(manager.active(&store).unwrap(), pair_config());
    }

    #[test]
    fn test_unconfigured() {
        let (_tmp, store, _sim, manager) = setup();
        assert!(matches!(manager.active(&store), Err(HaError::NotConfigured)));
    }

    #[test]
    fn test_invalid_config_applies_nothing() {
        let (_tmp, store, sim, manager) = setup();
        let mut config = pair_config();
        config.standby_port = 0;

        let err = manager.configure(&store, config).unwrap_err();
        assert!(matches!(err, HaError::InvalidConfig(_)));
        assert!(sim.applied_sites().is_empty());
    }

    #[test]
    fn test_conflict_while_transition_in_flight() {
        let (_tmp, store, sim, manager) = setup();
        store
            .update(|s| {
                s.transition_state = s.transition_state.begin(TransitionKind::Failover)?;
                Ok(())
            })
            .unwrap();

        let err = manager.configure(&store, pair_config()).unwrap_err();
        assert!(matches!(
            err,
            HaError::ConfigurationConflict(TransitionState::FailoverInProgress)
        ));
        assert!(sim.applied_sites().is_empty());
        assert!(store.snapshot().unwrap().pair_config.is_none());
    }

    #[test]
    fn test_partial_apply_keeps_previous_config() {
        let (_tmp, store, sim, manager) = setup();
        manager.configure(&store, pair_config()).unwrap();

        let mut next = pair_config();
        next.standby_host = "south".into();
        sim.fail_apply_on(Some(Site::Standby));

        let err = manager.configure(&store, next).unwrap_err();
        assert!(matches!(
            err,
            HaError::ConfigurationApplyFailed {
                site: Site::Standby,
                ..
            }
        ));
        assert_eq!(manager.active(&store).unwrap().standby_host, "west");
    }
}
