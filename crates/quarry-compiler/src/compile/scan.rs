//! Variable scan, depth assignment and ordering (phases 1-3).

use std::collections::HashMap;

use quarry_bytecode::{DEPTH_UNSET, MAX_VARIABLE_COUNT, VarId, VarKind, Variable};

use crate::error::RuleError;
use crate::term::{Term, TermOper};

use super::Compiler;

impl Compiler<'_> {
    /// Phase 1: discover variables and elect the root.
    pub(super) fn scan_variables(&mut self) -> Result<(), RuleError> {
        // Subjects first; every variable subject gets a Table record.
        let terms = self.terms;
        for term in terms {
            if let Some(name) = term.subject.var_name() {
                self.touch(name, VarKind::Table)?;
            }
        }
        self.elect_root();

        // Predicate and object variables of positive terms get Entity
        // records. Subject-only variables keep only their Table record.
        for term in terms.iter().filter(|t| t.oper != TermOper::Not) {
            if let Some(name) = term.pred.var_name() {
                self.touch(name, VarKind::Entity)?;
            }
            if let Some(name) = term.object.as_ref().and_then(|o| o.var_name()) {
                self.touch(name, VarKind::Entity)?;
            }
        }

        // Not terms cannot introduce variables: every variable position
        // must refer to one a positive term declared.
        for term in terms.iter().filter(|t| t.oper == TermOper::Not) {
            if let Some(name) = term.pred.var_name()
                && !self.declared(name)
            {
                return Err(RuleError::MissingPredicateVariable(name.to_string()));
            }
            if let Some(name) = term.object.as_ref().and_then(|o| o.var_name())
                && !self.declared(name)
            {
                return Err(RuleError::MissingObjectVariable(name.to_string()));
            }
        }
        Ok(())
    }

    /// Phase 2: assign dependency depths on the name level and copy them
    /// into both records of each name. Unreachable variables are a
    /// compile error.
    pub(super) fn assign_depths(&mut self) -> Result<(), RuleError> {
        let mut depth: HashMap<String, u32> = HashMap::new();
        let mut work: Vec<String> = Vec::new();

        // Predicate/object variables of literal-subject terms sit at
        // depth 0, as does the root.
        for term in self.terms {
            if term.subject.var_name().is_none() {
                for name in term_var_names(term) {
                    if depth.insert(name.to_string(), 0).is_none() {
                        work.push(name.to_string());
                    }
                }
            }
        }
        if let Some(root) = self.root.clone()
            && depth.insert(root.clone(), 0).is_none()
        {
            work.push(root);
        }

        // Worklist crawl: a variable's depth is one more than the smallest
        // depth among the variables it shares a term with.
        while let Some(name) = work.pop() {
            let d = depth[&name];
            for term in self.terms {
                let names: Vec<&str> = term_var_names(term).collect();
                if !names.contains(&name.as_str()) {
                    continue;
                }
                for other in names {
                    if other == name {
                        continue;
                    }
                    if depth.get(other).is_none_or(|&od| od > d + 1) {
                        depth.insert(other.to_string(), d + 1);
                        work.push(other.to_string());
                    }
                }
            }
        }

        for id in 0..self.vars.len() {
            let var = self.vars.get_mut(id as VarId);
            match depth.get(&var.name) {
                Some(&d) => var.depth = d,
                None => return Err(RuleError::UnconstrainedVariable(var.name.clone())),
            }
        }
        Ok(())
    }

    /// Phase 3: sort and reassign ids.
    pub(super) fn sort_vars(&mut self) {
        self.vars.sort_by(|a, b| {
            kind_rank(a.kind)
                .cmp(&kind_rank(b.kind))
                .then(a.depth.cmp(&b.depth))
                .then(b.occurs.cmp(&a.occurs))
                .then(b.id.cmp(&a.id))
        });
    }

    /// Find-or-create a record, counting the occurrence.
    fn touch(&mut self, name: &str, kind: VarKind) -> Result<VarId, RuleError> {
        if let Some(id) = self.vars.find(name, kind) {
            self.vars.get_mut(id).occurs += 1;
            return Ok(id);
        }
        if self.vars.len() >= MAX_VARIABLE_COUNT {
            return Err(RuleError::TooManyVariables);
        }
        Ok(self.vars.push(Variable {
            id: 0,
            name: name.to_string(),
            kind,
            occurs: 1,
            depth: DEPTH_UNSET,
            anonymous: false,
        }))
    }

    fn declared(&self, name: &str) -> bool {
        self.vars.find(name, VarKind::Entity).is_some()
            || self.vars.find(name, VarKind::Table).is_some()
    }

    /// The root is the variable named ".", or the subject variable with
    /// the most occurrences (later discovery wins ties, matching the
    /// descending-id sort order).
    fn elect_root(&mut self) {
        if self.vars.find(".", VarKind::Table).is_some() {
            self.root = Some(".".to_string());
            return;
        }
        let mut best: Option<(u32, String)> = None;
        for var in self.vars.iter().filter(|v| v.kind == VarKind::Table) {
            if best.as_ref().is_none_or(|(occ, _)| var.occurs >= *occ) {
                best = Some((var.occurs, var.name.clone()));
            }
        }
        self.root = best.map(|(_, name)| name);
    }
}

fn kind_rank(kind: VarKind) -> u8 {
    match kind {
        VarKind::Table => 0,
        VarKind::Entity => 1,
        VarKind::Unknown => 2,
    }
}

/// Variable names appearing in a term, in predicate, subject, object order.
fn term_var_names(term: &Term) -> impl Iterator<Item = &str> {
    term.pred
        .var_name()
        .into_iter()
        .chain(term.subject.var_name())
        .chain(term.object.as_ref().and_then(|o| o.var_name()))
}
