//! Event-by-event validation of one log.
//!
//! # Plan
//!
//! Before anything is checked, every event is assigned its checks:
//!
//! - relationship checks (parent/child, adjacency, routing table) unless
//!   sampling skips the event
//! - balance checks after every JOIN or LEAVE, never skipped
//!
//! The final state gets every check. The plan is drawn from a seeded RNG
//! up front, so sequential and parallel runs check the same events and
//! report the same first failure.

use crate::{
    Advisory, EventFailure, JoinPlausibility, OracleConfig, OracleError, ValidationReport,
};
use minhton_oracle_log::{DataError, EventLog, EventRecord, EventRef, SnapshotReader};
use minhton_oracle_validators::{
    validate_height_balance, validate_relationships, validate_tree_structure, CheckOutcome,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::{debug, info, warn};

/// Checks assigned to one point of the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedCheck {
    pub event: EventRef,
    pub relationships: bool,
    pub balance: bool,
}

impl PlannedCheck {
    fn runs_anything(&self) -> bool {
        self.relationships || self.balance
    }
}

/// Every outcome produced at one planned point.
#[derive(Debug)]
struct EventVerdict {
    event: EventRef,
    outcomes: Vec<CheckOutcome>,
}

impl EventVerdict {
    fn failed(&self) -> bool {
        self.outcomes.iter().any(CheckOutcome::is_failure)
    }
}

/// Validates event logs against the topology invariants.
#[derive(Debug, Clone, Default)]
pub struct Orchestrator {
    config: OracleConfig,
}

impl Orchestrator {
    pub fn new(config: OracleConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    /// Assign checks to every event and the final state.
    pub fn plan(&self, events: &[EventRecord]) -> Vec<PlannedCheck> {
        let skip_probability = self.config.sampling.skip_probability(events.len());
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.sampling.seed);
        let balance = self.config.check_tree_balance || self.config.check_height_balance;

        if skip_probability > 0.0 {
            info!(
                events = events.len(),
                skip_probability, "Sampling relationship checks"
            );
        }

        let mut plan: Vec<PlannedCheck> = events
            .iter()
            .map(|event| PlannedCheck {
                event: EventRef::Id(event.event_id),
                relationships: skip_probability == 0.0 || !rng.gen_bool(skip_probability),
                balance: balance && event.event_type.changes_membership(),
            })
            .collect();
        plan.push(PlannedCheck {
            event: EventRef::Final,
            relationships: true,
            balance,
        });
        plan
    }

    /// Validate one log.
    ///
    /// Stops at the first event with a failing fatal check. Data errors
    /// abort the log; violated invariants never do.
    pub fn validate<L: EventLog + ?Sized>(
        &self,
        store: impl Into<String>,
        log: &L,
    ) -> Result<ValidationReport, OracleError> {
        self.config.validate()?;
        let store = store.into();
        let reader = SnapshotReader::load(log, self.config.position_scale)?;
        let mut report = ValidationReport::new(store, reader.events().len());

        if self.config.check_join_plausibility {
            report.plausibility = self.join_plausibility(&reader);
        }

        let plan = self.plan(reader.events());
        report.events_skipped = plan.iter().filter(|p| !p.relationships).count();

        let verdicts = if self.config.parallel {
            self.check_parallel(&reader, &plan)?
        } else {
            self.check_sequential(&reader, &plan)?
        };

        for verdict in verdicts {
            match verdict.event {
                EventRef::Final => report.final_state_checked = true,
                EventRef::Id(_) => report.events_checked += 1,
            }
            for outcome in &verdict.outcomes {
                if outcome.is_advisory_finding() {
                    warn!(
                        store = %report.store,
                        event = %verdict.event,
                        check = %outcome.check,
                        advisory = true,
                        counter_examples = outcome.counter_examples.len(),
                        "Advisory check violated"
                    );
                    report.advisories.push(Advisory {
                        event: verdict.event,
                        outcome: outcome.clone(),
                    });
                }
            }
            if verdict.failed() {
                report.first_failure = Some(EventFailure {
                    event: verdict.event,
                    outcomes: verdict
                        .outcomes
                        .into_iter()
                        .filter(CheckOutcome::is_failure)
                        .collect(),
                });
                break;
            }
        }

        if report.passed() {
            info!(
                store = %report.store,
                checked = report.events_checked,
                skipped = report.events_skipped,
                "Store passed"
            );
        } else {
            warn!(store = %report.store, "Store failed");
        }
        Ok(report)
    }

    fn join_plausibility(&self, reader: &SnapshotReader) -> Vec<CheckOutcome> {
        if reader.traffic().is_empty() {
            debug!("No traffic logged, skipping join plausibility");
            return Vec::new();
        }
        let plausibility = JoinPlausibility::new(
            reader.general().number_of_nodes,
            reader.events(),
            reader.node_state_records(),
            reader.traffic(),
        );
        let outcomes = plausibility.check();
        for outcome in outcomes.iter().filter(|o| o.is_failure()) {
            warn!(
                check = %outcome.check,
                counter_examples = outcome.counter_examples.len(),
                "Join plausibility check failed"
            );
        }
        outcomes
    }

    /// Verdicts in plan order, up to and including the first failure.
    fn check_sequential(
        &self,
        reader: &SnapshotReader,
        plan: &[PlannedCheck],
    ) -> Result<Vec<EventVerdict>, DataError> {
        let mut verdicts = Vec::new();
        for planned in plan.iter().filter(|p| p.runs_anything()) {
            let verdict = self.check_event(reader, planned)?;
            let failed = verdict.failed();
            verdicts.push(verdict);
            if failed {
                break;
            }
        }
        Ok(verdicts)
    }

    /// Like [`Self::check_sequential`], with events checked on the rayon
    /// pool. Every event is checked; the result is cut after the lowest
    /// failing one.
    fn check_parallel(
        &self,
        reader: &SnapshotReader,
        plan: &[PlannedCheck],
    ) -> Result<Vec<EventVerdict>, DataError> {
        let planned: Vec<&PlannedCheck> = plan.iter().filter(|p| p.runs_anything()).collect();
        let mut verdicts = planned
            .par_iter()
            .map(|planned| self.check_event(reader, planned))
            .collect::<Result<Vec<_>, DataError>>()?;

        if let Some(first) = verdicts.iter().position(EventVerdict::failed) {
            verdicts.truncate(first + 1);
        }
        Ok(verdicts)
    }

    fn check_event(
        &self,
        reader: &SnapshotReader,
        planned: &PlannedCheck,
    ) -> Result<EventVerdict, DataError> {
        let snapshot = reader.snapshot(planned.event)?;
        let mut outcomes = Vec::new();

        if planned.relationships {
            outcomes.extend(validate_relationships(&snapshot));
        }
        if planned.balance {
            if self.config.check_tree_balance {
                outcomes.push(validate_tree_structure(&snapshot));
            }
            if self.config.check_height_balance {
                outcomes.push(validate_height_balance(&snapshot));
            }
        }

        for outcome in outcomes.iter().filter(|o| o.is_failure()) {
            warn!(
                event = %planned.event,
                check = %outcome.check,
                counter_examples = outcome.counter_examples.len(),
                "Check failed"
            );
        }
        debug!(
            event = %planned.event,
            nodes = snapshot.network_size(),
            checks = outcomes.len(),
            "Checked event"
        );

        Ok(EventVerdict {
            event: planned.event,
            outcomes,
        })
    }
}
