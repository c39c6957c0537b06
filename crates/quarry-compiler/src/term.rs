//! The parsed term model.
//!
//! A term has three positions: predicate, subject, object. Each position
//! holds either a fixed entity or a named variable. The names `"."` and
//! `"This"` refer to the same implicit subject variable. A term is either
//! a pair `(pred, obj)` addressing components of the subject, or a single
//! component `pred` on the subject.

use quarry_core::Entity;
use serde::{Deserialize, Serialize};

/// One position of a term.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TermValue {
    Entity(Entity),
    Var(String),
}

impl TermValue {
    pub fn var(name: &str) -> Self {
        Self::Var(name.to_string())
    }

    /// Variable name, with `"This"` folded into `"."`.
    pub fn var_name(&self) -> Option<&str> {
        match self {
            Self::Var(name) if name == "This" => Some("."),
            Self::Var(name) => Some(name),
            Self::Entity(_) => None,
        }
    }
}

impl From<Entity> for TermValue {
    fn from(e: Entity) -> Self {
        Self::Entity(e)
    }
}

impl From<&str> for TermValue {
    fn from(name: &str) -> Self {
        Self::var(name)
    }
}

/// Term modifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TermOper {
    #[default]
    And,
    Not,
    Optional,
}

/// A single query term.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub pred: TermValue,
    /// Always set; the implicit subject `"."` when not given explicitly.
    pub subject: TermValue,
    pub object: Option<TermValue>,
    pub oper: TermOper,
}

impl Term {
    /// Single component `pred` on the implicit subject.
    pub fn with(pred: impl Into<TermValue>) -> Self {
        Self {
            pred: pred.into(),
            subject: TermValue::var("."),
            object: None,
            oper: TermOper::And,
        }
    }

    /// Pair `(pred, obj)` on the implicit subject.
    pub fn pair(pred: impl Into<TermValue>, obj: impl Into<TermValue>) -> Self {
        Self {
            pred: pred.into(),
            subject: TermValue::var("."),
            object: Some(obj.into()),
            oper: TermOper::And,
        }
    }

    /// Override the subject position.
    pub fn subject(mut self, subject: impl Into<TermValue>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Mark the term negated.
    pub fn not(mut self) -> Self {
        self.oper = TermOper::Not;
        self
    }

    /// Mark the term optional.
    pub fn optional(mut self) -> Self {
        self.oper = TermOper::Optional;
        self
    }

    /// Whether the object position is used.
    pub fn is_pair(&self) -> bool {
        self.object.is_some()
    }
}
