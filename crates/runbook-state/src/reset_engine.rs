use runbook_core::ParsedArguments;
use runbook_metadata::ResetRule;
use tracing::debug;

use crate::PersistedRecord;

/// Bindings removed from the parsed arguments by [`apply_reset_rules`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResetReport {
    pub cascaded: Vec<String>,
    pub requested: Vec<String>,
}

impl ResetReport {
    pub fn is_empty(&self) -> bool {
        self.cascaded.is_empty() && self.requested.is_empty()
    }
}

/// Reverts stale values to unset before validation.
///
/// For each rule whose trigger was persisted with a value different from the
/// current one, every dependent still carrying its persisted value is removed,
/// unless it was supplied on this command line. Every binding in the reset
/// queue is then removed unconditionally.
pub fn apply_reset_rules(
    rules: &[ResetRule],
    record: &PersistedRecord,
    parsed: &mut ParsedArguments,
) -> ResetReport {
    let mut report = ResetReport::default();

    for rule in rules {
        let Some(previous) = record.get(&rule.trigger) else {
            continue;
        };
        if parsed.value(&rule.trigger) == Some(previous) {
            continue;
        }
        for dependent in &rule.dependents {
            let current = parsed.get(dependent);
            if current.is_explicit() {
                continue;
            }
            let stale = record.get(dependent).is_some() && current.value() == record.get(dependent);
            if stale && parsed.remove(dependent).is_some() {
                debug!(
                    trigger = rule.trigger.as_str(),
                    dependent = dependent.as_str(),
                    "reset stale dependent"
                );
                report.cascaded.push(dependent.clone());
            }
        }
    }

    let queue = parsed.reset_queue().to_vec();
    for name in queue {
        if parsed.remove(&name).is_some() {
            debug!(name = name.as_str(), "reset requested parameter");
            report.requested.push(name);
        }
    }

    report
}
