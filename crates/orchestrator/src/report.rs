//! Validation results.

use minhton_oracle_log::EventRef;
use minhton_oracle_validators::CheckOutcome;
use std::fmt;

/// The first event at which a fatal check failed.
#[derive(Debug, Clone)]
pub struct EventFailure {
    pub event: EventRef,
    /// Failing checks only.
    pub outcomes: Vec<CheckOutcome>,
}

impl fmt::Display for EventFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.event)?;
        for outcome in &self.outcomes {
            write!(f, "\n  {}", indent(&outcome.to_string()))?;
        }
        Ok(())
    }
}

/// A violated advisory check.
#[derive(Debug, Clone)]
pub struct Advisory {
    pub event: EventRef,
    pub outcome: CheckOutcome,
}

/// Result of validating one store.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    /// Human-readable name of the store, usually its path.
    pub store: String,
    pub events_total: usize,
    /// Logged events with at least one check run. The final state is
    /// counted separately.
    pub events_checked: usize,
    /// Events whose relationship checks were skipped by sampling.
    pub events_skipped: usize,
    /// Validation got past the last event and checked the final state.
    pub final_state_checked: bool,
    pub first_failure: Option<EventFailure>,
    pub advisories: Vec<Advisory>,
    /// Join/leave plausibility outcomes, empty if not run.
    pub plausibility: Vec<CheckOutcome>,
}

impl ValidationReport {
    pub fn new(store: impl Into<String>, events_total: usize) -> Self {
        Self {
            store: store.into(),
            events_total,
            events_checked: 0,
            events_skipped: 0,
            final_state_checked: false,
            first_failure: None,
            advisories: Vec::new(),
            plausibility: Vec::new(),
        }
    }

    /// No fatal check failed.
    pub fn passed(&self) -> bool {
        self.first_failure.is_none() && !self.plausibility.iter().any(CheckOutcome::is_failure)
    }

    /// Every failing outcome, plausibility first.
    pub fn failures(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.plausibility
            .iter()
            .filter(|o| o.is_failure())
            .chain(self.first_failure.iter().flat_map(|f| f.outcomes.iter()))
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.passed() { "PASSED" } else { "FAILED" };
        write!(
            f,
            "{} {} ({} of {} events checked, {} skipped by sampling, final state {})",
            verdict,
            self.store,
            self.events_checked,
            self.events_total,
            self.events_skipped,
            if self.final_state_checked {
                "checked"
            } else {
                "not reached"
            }
        )?;

        let plausibility_failures: Vec<_> =
            self.plausibility.iter().filter(|o| o.is_failure()).collect();
        if !plausibility_failures.is_empty() {
            write!(f, "\njoin plausibility:")?;
            for outcome in plausibility_failures {
                write!(f, "\n  {}", indent(&outcome.to_string()))?;
            }
        }

        if let Some(failure) = &self.first_failure {
            write!(f, "\n{}", failure)?;
        }

        if !self.advisories.is_empty() {
            write!(f, "\n{} advisory finding(s):", self.advisories.len())?;
            for advisory in &self.advisories {
                write!(
                    f,
                    "\n  {}: {}",
                    advisory.event,
                    indent(&advisory.outcome.to_string())
                )?;
            }
        }
        Ok(())
    }
}

fn indent(text: &str) -> String {
    text.replace('\n', "\n  ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use minhton_oracle_validators::{CheckKind, CounterExample};

    #[test]
    fn test_failures_are_grouped_by_event() {
        let mut report = ValidationReport::new("run.db", 10);
        report.events_checked = 4;
        assert!(report.passed());
        assert!(report.to_string().starts_with(
            "PASSED run.db (4 of 10 events checked, 0 skipped by sampling, final state not reached)"
        ));

        report.first_failure = Some(EventFailure {
            event: EventRef::Id(7),
            outcomes: vec![CheckOutcome::from_violations(
                CheckKind::NullBalance,
                vec![CounterExample::Level {
                    level: 1,
                    expected: 2,
                    actual: 1,
                }],
            )],
        });
        report.plausibility = vec![CheckOutcome::from_violations(
            CheckKind::JoinEventCount,
            vec![CounterExample::Count {
                expected: 3,
                actual: 2,
            }],
        )];

        assert!(!report.passed());
        assert_eq!(report.failures().count(), 2);
        let rendered = report.to_string();
        assert!(rendered.starts_with("FAILED run.db"));
        assert!(rendered.contains("event 7:\n  null balance [FAILED]"));
        assert!(rendered.contains("level 1: expected 2 nodes, found 1"));
        assert!(rendered.contains("join event count [FAILED]"));
    }

    #[test]
    fn test_final_state_is_not_counted_as_an_event() {
        let mut report = ValidationReport::new("root.db", 0);
        report.final_state_checked = true;
        assert_eq!(
            report.to_string(),
            "PASSED root.db (0 of 0 events checked, 0 skipped by sampling, final state checked)"
        );
    }

    #[test]
    fn test_advisories_do_not_fail() {
        let mut report = ValidationReport::new("run.db", 1);
        report.advisories.push(Advisory {
            event: EventRef::Final,
            outcome: CheckOutcome::from_violations(
                CheckKind::ChildCount,
                vec![CounterExample::Note("0:0".into())],
            )
            .advisory(),
        });
        assert!(report.passed());
        assert!(report.to_string().contains("1 advisory finding(s)"));
    }
}
