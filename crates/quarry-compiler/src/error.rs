//! Compile error types.

use thiserror::Error;

/// Error produced while compiling a rule. Reported with the offending
/// variable name where one exists; the partial rule is dropped.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("rule has no terms")]
    NoTerms,

    #[error("rule contains only negated terms")]
    OnlyNegatedTerms,

    #[error("too many variables")]
    TooManyVariables,

    /// The variable is not reachable from the root through any term.
    #[error("unconstrained variable {0}")]
    UnconstrainedVariable(String),

    /// A Not term used a predicate variable no positive term declares.
    #[error("missing predicate variable {0} in Not term")]
    MissingPredicateVariable(String),

    /// A Not term used an object variable no positive term declares.
    #[error("missing object variable {0} in Not term")]
    MissingObjectVariable(String),
}
