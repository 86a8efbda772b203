//! Transition Invariant Tests
//!
//! End-to-end behaviour of the orchestrator against a simulated pair:
//! - At most one transition in flight, enforced by the persisted state
//! - Every attempt that passes the compare-and-swap is recorded exactly once
//! - Configuration is frozen while a transition runs
//! - A failed attempt parks the pair in TRANSITION_FAILED until reset

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use chrono::{Duration, Utc};
use ha_orchestrator::backend::{CommandBackend, CommandBackendConfig, SimulatedPair};
use ha_orchestrator::ledger::{FileLedger, OperationLedger};
use ha_orchestrator::orchestrator::{ConfirmationPolicy, Orchestrator, OrchestratorOptions};
use ha_orchestrator::pair::{PairConfig, Site};
use ha_orchestrator::report::DateRange;
use ha_orchestrator::status::ReplicationRole;
use ha_orchestrator::transition::{TransitionKind, TransitionState};
use ha_orchestrator::HaError;
use tempfile::TempDir;

fn pair_config() -> PairConfig {
    PairConfig {
        primary_host: "db-east.internal".into(),
        primary_port: 1521,
        standby_host: "db-west.internal".into(),
        standby_port: 1521,
        primary_db_name: "ORCL_EAST".into(),
        standby_db_name: "ORCL_WEST".into(),
        admin_credential_ref: "env:HA_ADMIN".into(),
    }
}

fn fast_options() -> OrchestratorOptions {
    OrchestratorOptions {
        confirmation: ConfirmationPolicy {
            max_polls: 3,
            poll_interval_ms: 1,
        },
        ..OrchestratorOptions::default()
    }
}

/// Today plus a day either side, so a run that crosses midnight UTC still
/// sees its own entries.
fn today() -> DateRange {
    let day = Utc::now().date_naive();
    DateRange::new(day - Duration::days(1), day + Duration::days(1)).unwrap()
}

/// Opens a configured orchestrator over a fresh data directory.
fn setup() -> (TempDir, Arc<SimulatedPair>, Orchestrator) {
    let tmp = TempDir::new().unwrap();
    let sim = Arc::new(SimulatedPair::new());
    let orchestrator = Orchestrator::open(tmp.path(), sim.clone(), fast_options()).unwrap();
    orchestrator.configure(pair_config()).unwrap();
    (tmp, sim, orchestrator)
}

// =============================================================================
// Happy Path
// =============================================================================

/// Standby ready, primary up: failover succeeds and is recorded once.
#[test]
fn test_failover_from_steady_pair() {
    let (_tmp, sim, orchestrator) = setup();

    let outcome = orchestrator.failover().unwrap();

    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(outcome.kind, TransitionKind::Failover);
    assert_eq!(outcome.final_state, TransitionState::Steady);
    assert_eq!(outcome.message, "Failover completed successfully");
    assert_eq!(sim.role(Site::Standby), ReplicationRole::Primary);
    assert_eq!(sim.role(Site::Primary), ReplicationRole::Standby);

    let entries = orchestrator.operations(today()).unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].success);
    assert_eq!(entries[0].kind, TransitionKind::Failover);
    assert_eq!(entries[0].id, outcome.ledger_id);
    assert!(entries[0].attempt_id.is_some());
}

/// Failover followed by switchback restores the configured roles.
#[test]
fn test_switchback_restores_configured_roles() {
    let (_tmp, sim, orchestrator) = setup();

    assert!(orchestrator.failover().unwrap().success);
    let outcome = orchestrator.switchback().unwrap();

    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(sim.role(Site::Primary), ReplicationRole::Primary);
    assert_eq!(sim.role(Site::Standby), ReplicationRole::Standby);

    let report = orchestrator.availability_report(today()).unwrap();
    assert_eq!(report.total_attempts, 2);
    assert_eq!(report.failover_success_rate, 100.0);
    assert_eq!(report.switchback_success_rate, 100.0);
}

/// Failover is allowed when the primary site is down.
#[test]
fn test_failover_with_primary_unreachable() {
    let (_tmp, sim, orchestrator) = setup();
    sim.set_reachable(Site::Primary, false);

    let outcome = orchestrator.failover().unwrap();

    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(sim.role(Site::Standby), ReplicationRole::Primary);
}

// =============================================================================
// Precondition Failures
// =============================================================================

/// Standby site already PRIMARY: attempt recorded as failed, pair parked.
#[test]
fn test_failover_when_standby_already_primary() {
    let (_tmp, sim, orchestrator) = setup();
    sim.set_role(Site::Standby, ReplicationRole::Primary);

    let outcome = orchestrator.failover().unwrap();

    assert!(!outcome.success);
    assert_eq!(outcome.error_code.as_deref(), Some("HA_PRECONDITION_NOT_MET"));
    assert_eq!(outcome.final_state, TransitionState::TransitionFailed);
    assert_eq!(sim.failovers_requested(), 0);

    let entries = orchestrator.operations(today()).unwrap();
    assert_eq!(entries.len(), 1);
    assert!(!entries[0].success);
    assert!(entries[0].error_message.is_some());
    assert_eq!(
        orchestrator.state().unwrap().transition_state,
        TransitionState::TransitionFailed
    );
}

/// Switchback requires the pair to be in the failed-over arrangement.
#[test]
fn test_switchback_from_configured_roles_rejected() {
    let (_tmp, sim, orchestrator) = setup();

    let outcome = orchestrator.switchback().unwrap();

    assert!(!outcome.success);
    assert_eq!(outcome.error_code.as_deref(), Some("HA_PRECONDITION_NOT_MET"));
    assert_eq!(sim.switchbacks_requested(), 0);
}

/// A standby too far behind is not promoted.
#[test]
fn test_apply_gap_over_limit_blocks_failover() {
    let (_tmp, sim, orchestrator) = setup();
    sim.set_apply_gap(Site::Standby, 600);

    let outcome = orchestrator.failover().unwrap();

    assert!(!outcome.success);
    assert_eq!(outcome.error_code.as_deref(), Some("HA_PRECONDITION_NOT_MET"));
}

/// Readiness outside the configured vocabulary blocks failover.
#[test]
fn test_unready_standby_blocks_failover() {
    let (_tmp, sim, orchestrator) = setup();
    sim.set_readiness(Site::Standby, Some("NOT ALLOWED"));

    let outcome = orchestrator.failover().unwrap();

    assert!(!outcome.success);
    assert_eq!(sim.role(Site::Standby), ReplicationRole::Standby);
}

// =============================================================================
// Failed State Discipline
// =============================================================================

/// TRANSITION_FAILED refuses new transitions until an operator reset.
#[test]
fn test_failed_state_requires_reset() {
    let (_tmp, sim, orchestrator) = setup();
    sim.fail_protocol(Some("ORA-16661: the standby database needs to be reinstated"));

    let outcome = orchestrator.failover().unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.error_code.as_deref(), Some("HA_PROTOCOL_ERROR"));
    assert!(outcome.message.starts_with("Failover failed: "));

    sim.fail_protocol(None);
    let err = orchestrator.failover().unwrap_err();
    assert!(matches!(
        err,
        HaError::TransitionAlreadyInProgress(TransitionState::TransitionFailed)
    ));

    assert_eq!(orchestrator.reset().unwrap(), TransitionState::Steady);
    assert!(orchestrator.failover().unwrap().success);

    // Rejected attempt is not recorded
    assert_eq!(orchestrator.operations(today()).unwrap().len(), 2);
}

/// A swap the status never confirms times out.
#[test]
fn test_unconfirmed_role_swap_times_out() {
    let (_tmp, sim, orchestrator) = setup();
    sim.ignore_role_changes(true);

    let outcome = orchestrator.failover().unwrap();

    assert!(!outcome.success);
    assert_eq!(outcome.error_code.as_deref(), Some("HA_CONFIRMATION_TIMEOUT"));
    assert_eq!(outcome.final_state, TransitionState::TransitionFailed);
    assert_eq!(sim.failovers_requested(), 1);
}

/// A status tool that hangs after the role change is cut off at its
/// deadline, so confirmation still times out within budget and the pair
/// is not left in FAILOVER_IN_PROGRESS.
#[cfg(unix)]
#[test]
fn test_hung_status_tool_still_times_out() {
    let tmp = TempDir::new().unwrap();
    let swapped = tmp.path().join("swapped");
    let mark = swapped.to_string_lossy().into_owned();

    let status = r#"if [ -f MARK ]; then exec sleep 600; fi
if [ "{site}" = standby ]; then
  echo '{"role":"PHYSICAL STANDBY","protection_mode":"MAXIMUM PERFORMANCE","readiness":"TO PRIMARY"}'
else
  echo '{"role":"PRIMARY","protection_mode":"MAXIMUM PERFORMANCE"}'
fi"#
    .replace("MARK", &mark);
    let sh = |script: String| vec!["sh".to_string(), "-c".to_string(), script];

    let backend = CommandBackend::new(CommandBackendConfig {
        status: sh(status),
        failover: sh(format!("touch {}", mark)),
        switchback: sh("true".to_string()),
        timeout_ms: 200,
        ..CommandBackendConfig::default()
    })
    .unwrap();
    let options = OrchestratorOptions {
        confirmation: ConfirmationPolicy {
            max_polls: 2,
            poll_interval_ms: 1,
        },
        ..OrchestratorOptions::default()
    };
    let orchestrator = Orchestrator::open(tmp.path(), Arc::new(backend), options).unwrap();
    orchestrator.configure(pair_config()).unwrap();

    let started = Instant::now();
    let outcome = orchestrator.failover().unwrap();

    assert!(started.elapsed() < std::time::Duration::from_secs(10));
    assert!(swapped.exists());
    assert!(!outcome.success);
    assert_eq!(outcome.error_code.as_deref(), Some("HA_CONFIRMATION_TIMEOUT"));
    assert_eq!(outcome.final_state, TransitionState::TransitionFailed);
    assert_eq!(orchestrator.reset().unwrap(), TransitionState::Steady);
}

// =============================================================================
// Mutual Exclusion
// =============================================================================

/// While one failover is inside the protocol, every other transition and
/// configure call is refused and nothing extra reaches the ledger.
#[test]
fn test_concurrent_requests_refused_while_in_flight() {
    let (_tmp, sim, orchestrator) = setup();
    let orchestrator = Arc::new(orchestrator);

    sim.pause_protocol();
    let running = {
        let orchestrator = Arc::clone(&orchestrator);
        thread::spawn(move || orchestrator.failover())
    };
    sim.wait_for_protocol_entry(1);

    let err = orchestrator.failover().unwrap_err();
    assert!(matches!(
        err,
        HaError::TransitionAlreadyInProgress(TransitionState::FailoverInProgress)
    ));
    let err = orchestrator.switchback().unwrap_err();
    assert!(matches!(err, HaError::TransitionAlreadyInProgress(_)));

    let mut other = pair_config();
    other.standby_host = "db-north.internal".into();
    let err = orchestrator.configure(other).unwrap_err();
    assert!(matches!(
        err,
        HaError::ConfigurationConflict(TransitionState::FailoverInProgress)
    ));

    sim.resume_protocol();
    let outcome = running.join().unwrap().unwrap();
    assert!(outcome.success, "{}", outcome.message);

    assert_eq!(sim.failovers_requested(), 1);
    assert_eq!(orchestrator.operations(today()).unwrap().len(), 1);
    assert_eq!(
        orchestrator.state().unwrap().pair_config,
        Some(pair_config())
    );

    let metrics = orchestrator.metrics();
    assert_eq!(metrics.failovers_started, 1);
    assert_eq!(metrics.transitions_rejected, 2);
}

/// Many racing callers: exactly one attempt starts.
#[test]
fn test_racing_failovers_admit_one() {
    let (_tmp, sim, orchestrator) = setup();
    let orchestrator = Arc::new(orchestrator);

    sim.pause_protocol();
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let orchestrator = Arc::clone(&orchestrator);
            thread::spawn(move || orchestrator.failover())
        })
        .collect();
    sim.wait_for_protocol_entry(1);
    sim.resume_protocol();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let started = results.iter().filter(|r| r.is_ok()).count();
    let refused = results
        .iter()
        .filter(|r| matches!(r, Err(HaError::TransitionAlreadyInProgress(_))))
        .count();

    // Callers arriving after the winner finished may start a second
    // attempt; it fails its precondition and is recorded.
    assert!(started >= 1);
    assert_eq!(started + refused, 8);
    assert_eq!(sim.failovers_requested(), 1);
    assert_eq!(orchestrator.operations(today()).unwrap().len(), started);
}

// =============================================================================
// Configuration
// =============================================================================

/// Topology reaches both sites, primary first.
#[test]
fn test_configure_applies_primary_then_standby() {
    let (_tmp, sim, orchestrator) = setup();

    assert_eq!(sim.applied_sites(), vec![Site::Primary, Site::Standby]);
    assert_eq!(orchestrator.state().unwrap().pair_config, Some(pair_config()));
}

/// A rejected config changes nothing.
#[test]
fn test_invalid_configuration_leaves_previous_config() {
    let (_tmp, sim, orchestrator) = setup();

    let mut bad = pair_config();
    bad.standby_db_name = bad.primary_db_name.to_lowercase();
    let err = orchestrator.configure(bad).unwrap_err();

    assert!(matches!(err, HaError::InvalidConfig(_)));
    assert_eq!(sim.applied_sites().len(), 2);
    assert_eq!(orchestrator.state().unwrap().pair_config, Some(pair_config()));
}

/// Configure is refused while the pair is parked in TRANSITION_FAILED.
#[test]
fn test_configure_refused_after_failed_transition() {
    let (_tmp, sim, orchestrator) = setup();
    sim.set_role(Site::Standby, ReplicationRole::Primary);
    assert!(!orchestrator.failover().unwrap().success);

    let err = orchestrator.configure(pair_config()).unwrap_err();
    assert!(matches!(
        err,
        HaError::ConfigurationConflict(TransitionState::TransitionFailed)
    ));
}

// =============================================================================
// Cross-Process State
// =============================================================================

/// A second orchestrator over the same data dir sees the first one's state.
#[test]
fn test_state_shared_through_data_dir() {
    let (tmp, sim, first) = setup();
    sim.set_role(Site::Standby, ReplicationRole::Primary);
    assert!(!first.failover().unwrap().success);

    let second = Orchestrator::open(tmp.path(), sim.clone(), fast_options()).unwrap();
    let err = second.switchback().unwrap_err();
    assert!(matches!(
        err,
        HaError::TransitionAlreadyInProgress(TransitionState::TransitionFailed)
    ));

    let ledger = FileLedger::open(tmp.path()).unwrap();
    let (start, end) = today().bounds().unwrap();
    assert_eq!(ledger.query(start, end).unwrap().len(), 1);
}
