//! Transition Orchestrator
//!
//! Drives failover and switchback end to end:
//! 1. Compare-and-swap the state from STEADY to *_IN_PROGRESS
//! 2. Re-read status and check the precondition
//! 3. Invoke the role-change protocol
//! 4. Poll status until the swap is confirmed or the poll budget runs out
//! 5. Append exactly one ledger entry, then resolve the state
//!
//! Only a rejected compare-and-swap skips the ledger. Every failure after
//! step 1 leaves TRANSITION_FAILED until an operator reset.
//!
//! Failover and switchback block for the whole protocol and confirmation
//! window and are not cancellable once the protocol has been invoked.

mod outcome;

pub use outcome::{ConfirmationPolicy, OperationOutcome, OrchestratorOptions};

use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::backend::{PairBackend, RoleChangeProtocol};
use crate::errors::{HaError, HaResult};
use crate::ledger::{FileLedger, NewOperation, OperationLedger, OperationLogEntry};
use crate::observability::{Event, HaMetrics, MetricsSnapshot};
use crate::pair::{PairConfig, PairConfigManager};
use crate::report::{AvailabilityReport, AvailabilityReporter, DateRange};
use crate::status::{PairStatus, StatusReader};
use crate::transition::{
    is_confirmed, AttemptMarker, PersistedState, StateStore, TransitionKind, TransitionState,
};

/// The HA orchestrator. Share it behind an `Arc`.
pub struct Orchestrator {
    store: StateStore,
    ledger: Arc<dyn OperationLedger>,
    protocol: Arc<dyn RoleChangeProtocol>,
    reader: StatusReader,
    config_manager: PairConfigManager,
    reporter: AvailabilityReporter,
    options: OrchestratorOptions,
    metrics: HaMetrics,
    backend_name: &'static str,
}

impl Orchestrator {
    /// Open the durable state and ledger under `data_dir`, then reconcile
    /// any transition a previous process left in flight.
    pub fn open<B: PairBackend + 'static>(
        data_dir: &Path,
        backend: Arc<B>,
        options: OrchestratorOptions,
    ) -> HaResult<Self> {
        let store = StateStore::open(data_dir)?;
        let ledger: Arc<dyn OperationLedger> = Arc::new(FileLedger::open(data_dir)?);
        let orchestrator = Self::with_parts(store, ledger, backend, options);
        orchestrator.reconcile_after_restart()?;
        Ok(orchestrator)
    }

    /// Assemble from explicit parts. No reconciliation is run.
    pub fn with_parts<B: PairBackend + 'static>(
        store: StateStore,
        ledger: Arc<dyn OperationLedger>,
        backend: Arc<B>,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            store,
            reporter: AvailabilityReporter::new(Arc::clone(&ledger)),
            ledger,
            protocol: backend.clone(),
            reader: StatusReader::new(backend.clone()),
            config_manager: PairConfigManager::new(backend.clone()),
            options,
            metrics: HaMetrics::new(),
            backend_name: backend.name(),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend_name
    }

    // =========================================================================
    // READ OPERATIONS
    // =========================================================================

    /// Live status of the configured pair.
    pub fn status(&self) -> HaResult<PairStatus> {
        let pair = self.config_manager.active(&self.store)?;
        self.metrics.increment_status_reads();
        self.reader.read_status(&pair).inspect_err(|e| {
            if matches!(e, HaError::StatusUnavailable) {
                self.metrics.increment_status_unavailable();
            }
        })
    }

    /// Durable state: transition state, in-flight attempt, pair config.
    pub fn state(&self) -> HaResult<PersistedState> {
        self.store.snapshot()
    }

    pub fn availability_report(&self, range: DateRange) -> HaResult<AvailabilityReport> {
        self.reporter.generate_report(range)
    }

    /// Ledger entries in the range, ascending by start time.
    pub fn operations(&self, range: DateRange) -> HaResult<Vec<OperationLogEntry>> {
        self.reporter.entries(range)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    // =========================================================================
    // MUTATING OPERATIONS
    // =========================================================================

    /// Validate, apply and persist a new pair configuration.
    pub fn configure(&self, config: PairConfig) -> HaResult<PairConfig> {
        let result = self.config_manager.configure(&self.store, config);
        match result {
            Ok(_) => self.metrics.increment_configure_applied(),
            Err(_) => self.metrics.increment_configure_rejected(),
        }
        result
    }

    pub fn failover(&self) -> HaResult<OperationOutcome> {
        self.run_transition(TransitionKind::Failover)
    }

    pub fn switchback(&self) -> HaResult<OperationOutcome> {
        self.run_transition(TransitionKind::Switchback)
    }

    /// TRANSITION_FAILED → STEADY after manual remediation.
    pub fn reset(&self) -> HaResult<TransitionState> {
        let state = self.store.update(|s| {
            s.transition_state = s.transition_state.reset()?;
            s.attempt = None;
            Ok(s.transition_state)
        })?;
        self.metrics.increment_resets();
        info!(event = %Event::OperatorReset, "transition state reset to STEADY");
        Ok(state)
    }

    // =========================================================================
    // TRANSITION DRIVER
    // =========================================================================

    fn run_transition(&self, kind: TransitionKind) -> HaResult<OperationOutcome> {
        let marker = AttemptMarker::new(kind);
        let begun = self.store.update(|s| {
            let pair = s.pair_config.clone().ok_or(HaError::NotConfigured)?;
            s.transition_state = s.transition_state.begin(kind)?;
            s.attempt = Some(marker.clone());
            Ok(pair)
        });
        let pair = match begun {
            Ok(pair) => pair,
            Err(e) => {
                if let HaError::TransitionAlreadyInProgress(current) = &e {
                    self.metrics.increment_rejected();
                    warn!(
                        event = %Event::TransitionRejected,
                        kind = %kind,
                        current = %current,
                        "transition refused"
                    );
                }
                return Err(e);
            }
        };

        let clock = Instant::now();
        self.metrics.increment_started(kind);
        info!(
            event = %Event::TransitionBegin,
            kind = %kind,
            attempt_id = %marker.attempt_id,
            "transition started"
        );

        let result = self.drive(kind, &pair);
        let duration_millis = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX);

        let op = match &result {
            Ok(()) => NewOperation::succeeded(kind, marker.started_at, duration_millis),
            Err(e) => NewOperation::failed(kind, marker.started_at, duration_millis, e.to_string()),
        }
        .with_attempt(marker.attempt_id);

        // Ledger first: a crash between the two writes is resolved on
        // restart by finding the attempt id in the ledger.
        let entry = match self.ledger.append(op) {
            Ok(entry) => entry,
            Err(e) => {
                error!(
                    event = %Event::LedgerAppendFailed,
                    kind = %kind,
                    attempt_id = %marker.attempt_id,
                    error = %e,
                    "transition attempt could not be recorded"
                );
                self.resolve(false)?;
                self.metrics.increment_failed();
                return Err(e);
            }
        };
        debug!(event = %Event::LedgerAppend, id = entry.id, "attempt recorded");

        let final_state = self.resolve(result.is_ok())?;
        match &result {
            Ok(()) => {
                self.metrics.increment_succeeded();
                info!(
                    event = %Event::TransitionComplete,
                    kind = %kind,
                    duration_ms = duration_millis,
                    "transition confirmed"
                );
            }
            Err(e) => {
                self.metrics.increment_failed();
                error!(
                    event = %Event::TransitionFailed,
                    kind = %kind,
                    duration_ms = duration_millis,
                    code = e.code(),
                    error = %e,
                    "transition failed; operator reset required"
                );
            }
        }

        Ok(OperationOutcome::new(
            kind,
            &result,
            duration_millis,
            entry.id,
            final_state,
        ))
    }

    /// Steps 2 to 4. Every error returned is operational.
    fn drive(&self, kind: TransitionKind, pair: &PairConfig) -> HaResult<()> {
        let status = self.reader.read_status(pair).map_err(|e| match e {
            HaError::StatusUnavailable => {
                HaError::PreconditionNotMet("neither instance of the pair is reachable".into())
            }
            other => other,
        })?;
        if let Err(reason) = self.options.readiness.check(kind, &status) {
            warn!(
                event = %Event::PreconditionFailed,
                kind = %kind,
                reason = %reason,
                "precondition not met"
            );
            return Err(HaError::PreconditionNotMet(reason));
        }

        info!(
            event = %Event::ProtocolInvoked,
            kind = %kind,
            backend = self.backend_name,
            "invoking role-change protocol"
        );
        let invoked = match kind {
            TransitionKind::Failover => self.protocol.request_failover(pair),
            TransitionKind::Switchback => self.protocol.request_switchback(pair),
        };
        if let Err(e) = invoked {
            warn!(
                event = %Event::ProtocolFailed,
                kind = %kind,
                error = %e,
                "role-change protocol failed"
            );
            return Err(HaError::ProtocolError(e.0));
        }

        self.await_confirmation(kind, pair)
    }

    fn await_confirmation(&self, kind: TransitionKind, pair: &PairConfig) -> HaResult<()> {
        let policy = self.options.confirmation;
        for poll in 1..=policy.max_polls {
            match self.reader.read_status(pair) {
                Ok(status) if is_confirmed(kind, &status) => {
                    debug!(kind = %kind, poll, "role swap confirmed");
                    return Ok(());
                }
                Ok(status) => debug!(
                    kind = %kind,
                    poll,
                    primary_role = %status.primary_role,
                    standby_role = %status.standby_role,
                    "role swap not yet visible"
                ),
                Err(e) => debug!(kind = %kind, poll, error = %e, "confirmation poll failed"),
            }
            if poll < policy.max_polls {
                thread::sleep(Duration::from_millis(policy.poll_interval_ms));
            }
        }
        warn!(
            event = %Event::ConfirmationTimeout,
            kind = %kind,
            polls = policy.max_polls,
            "role swap not confirmed"
        );
        Err(HaError::ConfirmationTimeout {
            polls: policy.max_polls,
        })
    }

    /// *_IN_PROGRESS → STEADY or TRANSITION_FAILED, clearing the attempt.
    fn resolve(&self, success: bool) -> HaResult<TransitionState> {
        self.store.update(|s| {
            s.transition_state = if success {
                s.transition_state.complete()?
            } else {
                s.transition_state.fail()?
            };
            s.attempt = None;
            Ok(s.transition_state)
        })
    }

    // =========================================================================
    // RESTART RECONCILIATION
    // =========================================================================

    /// Resolve a transition that a previous process left *_IN_PROGRESS.
    ///
    /// The outcome comes from live status, never from assumption: a
    /// confirmed role swap resolves to STEADY, anything else (including an
    /// unreachable pair) to TRANSITION_FAILED. The attempt is recorded in
    /// the ledger unless its entry was already written before the crash.
    /// Returns the entry appended, if any.
    pub fn reconcile_after_restart(&self) -> HaResult<Option<OperationLogEntry>> {
        self.store.update(|s| {
            let Some(kind) = s.transition_state.in_progress_kind() else {
                return Ok(None);
            };
            if let Some(ref attempt) = s.attempt {
                if attempt.owner_alive() {
                    warn!(
                        attempt_id = %attempt.attempt_id,
                        owner_pid = attempt.owner_pid,
                        "in-flight transition owned by a live process; not reconciling"
                    );
                    return Ok(None);
                }
            }

            let recorded = match s.attempt {
                Some(ref attempt) => self.ledger.find_attempt(attempt.attempt_id)?,
                None => None,
            };

            let (success, appended) = match recorded {
                Some(entry) => (entry.success, None),
                None => {
                    let confirmed = s
                        .pair_config
                        .as_ref()
                        .and_then(|pair| self.reader.read_status(pair).ok())
                        .map(|status| is_confirmed(kind, &status))
                        .unwrap_or(false);
                    let started_at = s
                        .attempt
                        .as_ref()
                        .map(|a| a.started_at)
                        .unwrap_or(s.updated_at);
                    let duration_millis =
                        u64::try_from((Utc::now() - started_at).num_milliseconds()).unwrap_or(0);
                    let mut op = if confirmed {
                        NewOperation::succeeded(kind, started_at, duration_millis)
                    } else {
                        NewOperation::failed(
                            kind,
                            started_at,
                            duration_millis,
                            "interrupted by restart; role swap not confirmed",
                        )
                    };
                    if let Some(ref attempt) = s.attempt {
                        op = op.with_attempt(attempt.attempt_id);
                    }
                    (confirmed, Some(self.ledger.append(op)?))
                }
            };

            s.transition_state = if success {
                s.transition_state.complete()?
            } else {
                s.transition_state.fail()?
            };
            s.attempt = None;

            self.metrics.increment_reconciliations();
            info!(
                event = %Event::RestartReconciled,
                kind = %kind,
                resolved = %s.transition_state,
                "interrupted transition reconciled"
            );
            Ok(appended)
        })
    }
}
