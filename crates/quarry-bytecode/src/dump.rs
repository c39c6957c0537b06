//! Human-readable program dump for diagnostics.
//!
//! One line per instruction: index, pass/fail labels, frame, mnemonic,
//! input/output register (prefixed `I:`/`O:`, with `t` for Table-kind
//! registers) and the filter expression. The format is stable for a given
//! program.

use std::fmt::Write as _;

use quarry_core::Entity;

use crate::ops::{Filter, FilterSlot, OpKind, VarId};
use crate::rule::Rule;
use crate::vars::VarKind;

/// Resolves entity names for the dump; returns `None` for unnamed entities.
pub type NameResolver<'a> = dyn Fn(Entity) -> Option<String> + 'a;

/// Render a compiled rule's program.
pub fn dump(rule: &Rule, names: &NameResolver<'_>) -> String {
    let mut out = String::new();
    for (index, op) in rule.program().ops().iter().enumerate() {
        let mut line = format!(
            "{index:>3}: [{:>3}, {:>3}] f{:<2} {:<8}",
            op.on_pass,
            op.on_fail,
            op.frame,
            op.kind.name()
        );
        if let Some(r) = op.r_in {
            write!(line, " I:{}", reg_name(rule, r)).unwrap();
        }
        if let Some(r) = op.r_out {
            write!(line, " O:{}", reg_name(rule, r)).unwrap();
        }
        if let Some(e) = op.subject
            && op.kind != OpKind::Jump
        {
            write!(line, " S:{}", entity_name(names, e)).unwrap();
        }
        if let Some(filter) = &op.filter {
            write!(line, " {}", filter_expr(rule, filter, names)).unwrap();
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

fn reg_name(rule: &Rule, id: VarId) -> String {
    let var = rule.vars().get(id);
    match var.kind {
        VarKind::Table => format!("t{}", var.name),
        _ => var.name.clone(),
    }
}

fn slot_name(rule: &Rule, slot: FilterSlot, names: &NameResolver<'_>) -> String {
    match slot {
        FilterSlot::Entity(e) => entity_name(names, e),
        FilterSlot::Var(v) => rule.vars().get(v).name.clone(),
    }
}

fn entity_name(names: &NameResolver<'_>, e: Entity) -> String {
    names(e).unwrap_or_else(|| format!("#{}", e.index()))
}

fn filter_expr(rule: &Rule, filter: &Filter, names: &NameResolver<'_>) -> String {
    match filter.obj {
        Some(obj) => format!(
            "({}, {})",
            slot_name(rule, filter.pred, names),
            slot_name(rule, obj, names)
        ),
        None => format!("({})", slot_name(rule, filter.pred, names)),
    }
}
