//! Instruction emission (phase 4).
//!
//! Every register read must have been written by a prior instruction; the
//! `written` bitmap enforces the discipline. Reads of a variable whose
//! Table register is bound but whose Entity register is not get an inline
//! Each inserted first. Unwritten filter variables are outputs: the
//! matching instruction reifies them from the matched column.

use quarry_bytecode::{
    Filter, FilterSlot, HALT, MAX_VARIABLE_COUNT, OpKind, VarId, VarKind, Variable,
};
use quarry_core::{Attributes, Entity, ISA, Id, WILDCARD};

use crate::error::RuleError;
use crate::term::{Term, TermOper, TermValue};

use super::{Compiler, SubjPos};

impl Compiler<'_> {
    pub(super) fn emit_program(&mut self) -> Result<(), RuleError> {
        let input = self.op(OpKind::Input);
        self.push_op(input);
        for t in 0..self.terms.len() {
            self.emit_term(t)?;
        }
        self.emit_epilogue();
        Ok(())
    }

    fn emit_term(&mut self, t: usize) -> Result<(), RuleError> {
        let terms = self.terms;
        let term = &terms[t];
        self.frame += 1;
        let group_start = self.ops.len();

        if term.oper == TermOper::Not {
            let pre = self.op(OpKind::Not);
            self.push_op(pre);
        }
        let inner_start = self.ops.len();

        // Predicate preparation: a non-final predicate entity is replaced
        // by a variable enumerating its IsA subsets, itself included.
        let mut pred_slot = self.filter_slot(&term.pred)?;
        let mut substituted = false;
        if let TermValue::Entity(p) = &term.pred
            && !self.store.has_attribute(*p, Attributes::FINAL)
        {
            let av = self.anon_var(VarKind::Table)?;
            self.emit_set_group(
                OpKind::SubSet,
                av,
                FilterSlot::Entity(ISA),
                FilterSlot::Entity(*p),
                true,
                -1,
            );
            self.written[av as usize] = true;
            pred_slot = FilterSlot::Var(av);
            substituted = true;
        }
        let obj_slot = match &term.object {
            Some(o) => Some(self.filter_slot(o)?),
            None => None,
        };

        let subj = self.subject_pos(term);
        let transitive = match (&term.pred, substituted, obj_slot) {
            (TermValue::Entity(p), false, Some(_))
                if self.store.has_attribute(*p, Attributes::TRANSITIVE) =>
            {
                Some(*p)
            }
            _ => None,
        };

        if let Some(p) = transitive {
            self.emit_transitive(t, p, subj, obj_slot.unwrap())?;
        } else {
            self.emit_regular(t, term, subj, pred_slot, obj_slot)?;
        }

        // Record the filter used to resolve this term's id on yield.
        self.filters.push(self.yield_filter(t, pred_slot, obj_slot));

        match term.oper {
            TermOper::And => {}
            TermOper::Not => self.wire_not(group_start, inner_start),
            TermOper::Optional => self.wire_optional(inner_start),
        }
        Ok(())
    }

    /// Emission matrix for transitive predicates, keyed on whether the
    /// subject and object carry a value.
    fn emit_transitive(
        &mut self,
        t: usize,
        p: Entity,
        subj: SubjPos,
        obj: FilterSlot,
    ) -> Result<(), RuleError> {
        let inclusive = self.store.has_attribute(p, Attributes::TRANSITIVE_SELF);
        let subj_written = self.subject_written(subj);
        let obj_written = match obj {
            FilterSlot::Entity(_) => true,
            FilterSlot::Var(v) => self.written[v as usize],
        };

        match (subj_written, obj_written) {
            // Both known: enumerate everything at or below the object and
            // require the subject to relate to one of them directly. The
            // object itself always belongs to the set, or direct facts
            // would not match.
            (true, true) => {
                let av = self.anon_var(VarKind::Table)?;
                self.emit_set_group(OpKind::SubSet, av, FilterSlot::Entity(p), obj, true, -1);
                self.written[av as usize] = true;
                let filter = Filter::pair(FilterSlot::Entity(p), FilterSlot::Var(av));
                self.emit_with(t, subj, filter);
            }
            // Subject known: walk its successor chain into the object.
            (true, false) => {
                let root = self.subject_entity_slot(subj)?;
                let FilterSlot::Var(o) = obj else {
                    unreachable!("unwritten object that is not a variable");
                };
                self.emit_set_group(OpKind::SuperSet, o, FilterSlot::Entity(p), root, inclusive, t as i32);
                self.written[o as usize] = true;
            }
            // Object known: walk its predecessors into the subject.
            (false, true) => {
                let SubjPos::Var { table, .. } = subj else {
                    unreachable!("literal subject is always written");
                };
                self.emit_set_group(OpKind::SubSet, table, FilterSlot::Entity(p), obj, inclusive, t as i32);
                self.written[table as usize] = true;
            }
            // Neither known: select every concrete occurrence, then expand
            // each matched object upwards.
            (false, false) => {
                let SubjPos::Var { table, .. } = subj else {
                    unreachable!("literal subject is always written");
                };
                let av = self.anon_var(VarKind::Entity)?;
                let mut select = self.op(OpKind::Select);
                select.filter = Some(Filter::pair(FilterSlot::Entity(p), FilterSlot::Var(av)));
                select.r_out = Some(table);
                select.term = t as i32;
                self.push_op(select);
                self.written[table as usize] = true;
                self.written[av as usize] = true;

                let FilterSlot::Var(o) = obj else {
                    unreachable!("unwritten object that is not a variable");
                };
                // The matched object is itself a valid binding, so this
                // expansion is always inclusive.
                self.emit_set_group(
                    OpKind::SuperSet,
                    o,
                    FilterSlot::Entity(p),
                    FilterSlot::Var(av),
                    true,
                    -1,
                );
                self.written[o as usize] = true;
            }
        }
        Ok(())
    }

    fn emit_regular(
        &mut self,
        t: usize,
        term: &Term,
        subj: SubjPos,
        pred_slot: FilterSlot,
        obj_slot: Option<FilterSlot>,
    ) -> Result<(), RuleError> {
        let filter = match obj_slot {
            Some(obj) => Filter::pair(pred_slot, obj),
            None => Filter::single(pred_slot),
        };
        match subj {
            SubjPos::Literal(e) => {
                if self.carries_filter(e, term) {
                    self.emit_with(t, subj, filter);
                } else {
                    // Search the subject's inheritance chain for the
                    // filter: implicit IsA expansion of the subject.
                    let av = self.anon_var(VarKind::Entity)?;
                    self.emit_set_group(
                        OpKind::SuperSet,
                        av,
                        FilterSlot::Entity(ISA),
                        FilterSlot::Entity(e),
                        true,
                        -1,
                    );
                    self.written[av as usize] = true;
                    let mut op = self.op(OpKind::With);
                    op.r_in = Some(av);
                    op.filter = Some(filter);
                    op.term = t as i32;
                    self.push_op(op);
                }
            }
            SubjPos::Var { table, entity } => {
                if self.subject_written(subj) {
                    let r_in = entity
                        .filter(|&v| self.written[v as usize])
                        .unwrap_or(table);
                    let mut op = self.op(OpKind::With);
                    op.r_in = Some(r_in);
                    op.filter = Some(filter);
                    op.term = t as i32;
                    self.push_op(op);
                } else {
                    let mut op = self.op(OpKind::Select);
                    op.r_out = Some(table);
                    op.filter = Some(filter);
                    op.term = t as i32;
                    self.push_op(op);
                    self.written[table as usize] = true;
                }
            }
        }
        // Unwritten filter variables are wildcard outputs; the matcher
        // reifies them from the matched column.
        for slot in [Some(pred_slot), obj_slot].into_iter().flatten() {
            if let FilterSlot::Var(v) = slot {
                self.written[v as usize] = true;
            }
        }
        Ok(())
    }

    /// Whether a literal subject's own table matches the term's filter,
    /// with variables treated as wildcards.
    fn carries_filter(&self, e: Entity, term: &Term) -> bool {
        let pred = match &term.pred {
            TermValue::Entity(p) => *p,
            TermValue::Var(_) => WILDCARD,
        };
        let pattern = match &term.object {
            Some(TermValue::Entity(o)) => Id::pair(pred, *o),
            Some(TermValue::Var(_)) => Id::pair(pred, WILDCARD),
            None => Id::entity(pred),
        };
        self.store
            .entity_record(e)
            .is_some_and(|rec| self.store.table(rec.table).search_from(pattern, 0).is_some())
    }

    // ------------------------------------------------------------------
    // Groups and wiring
    // ------------------------------------------------------------------

    /// Emit a SubSet/SuperSet, optionally wrapped in the inclusive prelude
    /// `SetJmp, Store, Set, Jump` that yields the root itself first.
    fn emit_set_group(
        &mut self,
        kind: OpKind,
        out: VarId,
        pred: FilterSlot,
        root: FilterSlot,
        inclusive: bool,
        term: i32,
    ) {
        let filter = Filter::pair(pred, root);
        if !inclusive {
            let mut set = self.op(kind);
            set.filter = Some(filter);
            set.r_out = Some(out);
            set.term = term;
            self.push_op(set);
            return;
        }

        let s = self.ops.len() as i32;
        let setjmp = self.op(OpKind::SetJmp);
        let i = self.push_op(setjmp);
        self.ops[i].on_fail = s + 2;

        let mut store_op = self.op(OpKind::Store);
        store_op.filter = Some(filter);
        store_op.r_out = Some(out);
        let i = self.push_op(store_op);
        self.ops[i].on_pass = s + 4;

        let mut set = self.op(kind);
        set.filter = Some(filter);
        set.r_out = Some(out);
        set.term = term;
        let i = self.push_op(set);
        self.ops[i].on_pass = s + 4;
        self.ops[i].on_fail = s - 1;

        // The Jump's pass label holds the SetJmp's index; the dispatcher
        // follows the label stashed there.
        let jump = self.op(OpKind::Jump);
        let i = self.push_op(jump);
        self.ops[i].on_pass = s;
        self.ops[i].on_fail = s;
    }

    /// Close a negated group. The post-Not routes an inner match back into
    /// the pre-Not, turning it into an overall fail; an inner fail escapes
    /// forward past the post-Not.
    fn wire_not(&mut self, group_start: usize, inner_start: usize) {
        let q = self.ops.len();
        for op in &mut self.ops[inner_start..q] {
            if op.on_fail < inner_start as i32 {
                op.on_fail = q as i32 + 1;
            }
        }
        let post = self.op(OpKind::Not);
        let i = self.push_op(post);
        self.ops[i].on_pass = group_start as i32;
        self.ops[i].on_fail = group_start as i32;
    }

    /// Close an optional group. Escaping fail edges land on the post op,
    /// which passes forward once whether or not the group matched; its
    /// redo falls through to the previous exit, so the optional is
    /// evaluated at most once per outer context.
    fn wire_optional(&mut self, inner_start: usize) {
        let n = self.ops.len();
        for op in &mut self.ops[inner_start..n] {
            if op.on_fail < inner_start as i32 {
                op.on_fail = n as i32;
            }
        }
        let post = self.op(OpKind::Not);
        let i = self.push_op(post);
        self.ops[i].on_fail = inner_start as i32 - 1;
    }

    fn emit_epilogue(&mut self) {
        // Entity variables nothing wrote enumerate their table twin.
        for id in 0..self.vars.len() {
            let id = id as VarId;
            let var = self.vars.get(id);
            if var.kind != VarKind::Entity || self.written[id as usize] {
                continue;
            }
            let name = var.name.clone();
            let Some(twin) = self.vars.find(&name, VarKind::Table) else {
                continue;
            };
            if self.written[twin as usize] {
                self.frame += 1;
                self.emit_each(twin, id);
                self.written[id as usize] = true;
            }
        }

        let r_in = self.root.clone().and_then(|name| {
            self.vars
                .find(&name, VarKind::Entity)
                .filter(|&v| self.written[v as usize])
                .or_else(|| self.vars.find(&name, VarKind::Table))
        });
        let mut yield_op = self.op(OpKind::Yield);
        yield_op.r_in = r_in;
        let i = self.push_op(yield_op);
        self.ops[i].on_pass = HALT;
    }

    // ------------------------------------------------------------------
    // Slots and registers
    // ------------------------------------------------------------------

    /// Filter slot for a predicate or object position, inserting an Each
    /// when the Entity register is unwritten but the Table twin is bound.
    fn filter_slot(&mut self, value: &TermValue) -> Result<FilterSlot, RuleError> {
        match value {
            TermValue::Entity(e) => Ok(FilterSlot::Entity(*e)),
            TermValue::Var(_) => {
                let name = value.var_name().unwrap().to_string();
                if let Some(id) = self.vars.find(&name, VarKind::Entity) {
                    self.ensure_entity_written(id, &name);
                    Ok(FilterSlot::Var(id))
                } else {
                    // Declared through a subject only; enumerate into an
                    // anonymous entity register.
                    let table = self
                        .vars
                        .find(&name, VarKind::Table)
                        .expect("undeclared filter variable");
                    let av = self.anon_var(VarKind::Entity)?;
                    self.emit_each(table, av);
                    self.written[av as usize] = true;
                    Ok(FilterSlot::Var(av))
                }
            }
        }
    }

    fn ensure_entity_written(&mut self, id: VarId, name: &str) {
        if self.written[id as usize] {
            return;
        }
        if let Some(twin) = self.vars.find(name, VarKind::Table)
            && self.written[twin as usize]
        {
            self.emit_each(twin, id);
            self.written[id as usize] = true;
        }
    }

    /// An entity-valued slot for the subject, for use as a set-walk root.
    fn subject_entity_slot(&mut self, subj: SubjPos) -> Result<FilterSlot, RuleError> {
        match subj {
            SubjPos::Literal(e) => Ok(FilterSlot::Entity(e)),
            SubjPos::Var { table, entity } => {
                if let Some(ev) = entity {
                    if !self.written[ev as usize] {
                        self.emit_each(table, ev);
                        self.written[ev as usize] = true;
                    }
                    Ok(FilterSlot::Var(ev))
                } else {
                    let av = self.anon_var(VarKind::Entity)?;
                    self.emit_each(table, av);
                    self.written[av as usize] = true;
                    Ok(FilterSlot::Var(av))
                }
            }
        }
    }

    fn subject_written(&self, subj: SubjPos) -> bool {
        match subj {
            SubjPos::Literal(_) => true,
            SubjPos::Var { table, entity } => {
                self.written[table as usize]
                    || entity.is_some_and(|v| self.written[v as usize])
            }
        }
    }

    fn emit_with(&mut self, t: usize, subj: SubjPos, filter: Filter) {
        let mut op = self.op(OpKind::With);
        match subj {
            SubjPos::Literal(e) => op.subject = Some(e),
            SubjPos::Var { table, entity } => {
                op.r_in = Some(
                    entity
                        .filter(|&v| self.written[v as usize])
                        .unwrap_or(table),
                );
            }
        }
        op.filter = Some(filter);
        op.term = t as i32;
        self.push_op(op);
    }

    fn emit_each(&mut self, table: VarId, entity: VarId) {
        let mut op = self.op(OpKind::Each);
        op.r_in = Some(table);
        op.r_out = Some(entity);
        self.push_op(op);
    }

    fn anon_var(&mut self, kind: VarKind) -> Result<VarId, RuleError> {
        if self.vars.len() >= MAX_VARIABLE_COUNT {
            return Err(RuleError::TooManyVariables);
        }
        let name = format!("*{}", self.anon);
        self.anon += 1;
        let id = self.vars.push(Variable {
            id: 0,
            name,
            kind,
            occurs: 1,
            depth: 0,
            anonymous: true,
        });
        self.written.push(false);
        Ok(id)
    }

    /// The filter whose resolved value is reported as this term's id.
    fn yield_filter(&self, t: usize, pred_slot: FilterSlot, obj_slot: Option<FilterSlot>) -> Filter {
        let term = &self.terms[t];
        let obj = term.object.as_ref().map(|o| match o.var_name() {
            Some(name) => self
                .vars
                .find(name, VarKind::Entity)
                .map(FilterSlot::Var)
                .unwrap_or_else(|| obj_slot.unwrap()),
            None => obj_slot.unwrap(),
        });
        match obj {
            Some(obj) => Filter::pair(pred_slot, obj),
            None => Filter::single(pred_slot),
        }
    }
}
