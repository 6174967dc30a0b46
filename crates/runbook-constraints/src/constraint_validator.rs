use runbook_core::{display_literal, ParsedArguments};
use runbook_metadata::{ConditionalConstraint, ConstraintSet, VariableCatalog};
use tracing::debug;

/// Renders names as a bracketed, single-quoted list: `['--a', '--b']`.
pub fn format_name_list<S: AsRef<str>>(names: &[S]) -> String {
    let quoted = names
        .iter()
        .map(|name| format!("'{}'", name.as_ref()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{quoted}]")
}

fn flag_list(catalog: &VariableCatalog, names: &[String]) -> String {
    let flags = names
        .iter()
        .map(|name| catalog.parameter_for(name))
        .collect::<Vec<_>>();
    format_name_list(&flags)
}

fn triggered(constraint: &ConditionalConstraint, parsed: &ParsedArguments) -> bool {
    parsed.value(&constraint.trigger) == Some(&constraint.value)
}

/// Checks every rule of `constraints` and returns one message per violation.
///
/// Rules are evaluated in a fixed order: required-together, required-one-of,
/// required-if, forbidden-if, then mutually-exclusive. An empty result means
/// the invocation may proceed.
pub fn validate_constraints(
    constraints: &ConstraintSet,
    parsed: &ParsedArguments,
    catalog: &VariableCatalog,
) -> Vec<String> {
    let mut errors = Vec::new();
    let present = |name: &String| parsed.is_present(name);

    for names in &constraints.required_together {
        let count = names.iter().filter(|name| present(*name)).count();
        if count > 0 && count < names.len() {
            errors.push(format!("{} are required together", flag_list(catalog, names)));
        }
    }

    for names in &constraints.required_one_of {
        if !names.iter().any(present) {
            errors.push(format!("one of {} is required", flag_list(catalog, names)));
        }
    }

    for constraint in &constraints.required_if {
        if triggered(constraint, parsed) && !constraint.names.iter().all(present) {
            errors.push(format!(
                "{} are required because {} is {}",
                flag_list(catalog, &constraint.names),
                catalog.parameter_for(&constraint.trigger),
                display_literal(&constraint.value)
            ));
        }
    }

    for constraint in &constraints.forbidden_if {
        if triggered(constraint, parsed) && constraint.names.iter().any(present) {
            errors.push(format!(
                "{} are forbidden because {} is {}",
                flag_list(catalog, &constraint.names),
                catalog.parameter_for(&constraint.trigger),
                display_literal(&constraint.value)
            ));
        }
    }

    for names in &constraints.mutually_exclusive {
        if names.iter().filter(|name| present(*name)).count() > 1 {
            errors.push(format!("{} are mutually exclusive", format_name_list(names)));
        }
    }

    debug!(
        task = parsed.task(),
        violations = errors.len(),
        "validated constraints"
    );
    errors
}
