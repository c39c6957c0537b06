//! Instruction evaluators.
//!
//! Every evaluator takes a redo flag: false to start iterating, true to
//! produce the next result. Returning false routes the dispatch loop
//! along the instruction's fail edge. An entity that is no longer alive
//! is a local no-match, never an abort.

use quarry_bytecode::{Filter, Op, OpKind, VarId, VarKind};
use quarry_bytecode::FilterSlot;
use quarry_core::{Attributes, Table, TableRange, THIS, WILDCARD};
use quarry_core::Id;

use super::ctx::{EachCtx, OpCtx, Pattern, SelectCtx, SetJmpCtx, WithCtx};
use super::iter::RuleIter;
use super::reg::Reg;

impl<'r, 's> RuleIter<'r, 's> {
    pub(super) fn eval(&mut self, op_idx: usize, op: &Op, redo: bool) -> bool {
        match op.kind {
            OpKind::Input | OpKind::Not | OpKind::Jump => !redo,
            OpKind::Yield => false,
            OpKind::SetJmp => self.eval_setjmp(op_idx, op, redo),
            OpKind::Store => self.eval_store(op, redo),
            OpKind::Each => self.eval_each(op_idx, op, redo),
            OpKind::Select => self.eval_select(op_idx, op, redo),
            OpKind::With => self.eval_with(op_idx, op, redo),
            OpKind::SubSet => self.eval_subset(op_idx, op, redo),
            OpKind::SuperSet => self.eval_superset(op_idx, op, redo),
        }
    }

    /// First evaluation stashes the pass label, redo the fail label; the
    /// paired Jump reads whichever was stored last.
    fn eval_setjmp(&mut self, op_idx: usize, op: &Op, redo: bool) -> bool {
        let label = if redo { op.on_fail } else { op.on_pass };
        self.ctx[op_idx] = OpCtx::SetJmp(SetJmpCtx { label });
        !redo
    }

    /// Write the resolved filter object into the output register, once.
    fn eval_store(&mut self, op: &Op, redo: bool) -> bool {
        if redo {
            return false;
        }
        let filter = op.filter.expect("store without filter");
        let value = self.resolve_slot(op.frame, filter.obj.expect("store without value slot"));
        if value == WILDCARD || !self.store.is_alive(value) {
            return false;
        }
        let out = op.r_out.expect("store without output");
        let reg = match self.rule.vars().get(out).kind {
            VarKind::Table => match self.store.entity_record(value) {
                Some(rec) => Reg::Range(TableRange {
                    table: rec.table,
                    offset: rec.row,
                    count: 1,
                }),
                None => Reg::Entity(value),
            },
            _ => Reg::Entity(value),
        };
        self.set_reg(op.frame, out, reg);
        true
    }

    /// Forward each entity of the input table, skipping the builtin
    /// sentinels.
    fn eval_each(&mut self, op_idx: usize, op: &Op, redo: bool) -> bool {
        let out = op.r_out.expect("each without output");
        let frame = op.frame;
        let mut ctx = if redo {
            let OpCtx::Each(c) = &self.ctx[op_idx] else {
                unreachable!("each redo without context");
            };
            let mut c = *c;
            c.row += 1;
            c
        } else {
            let r = op.r_in.expect("each without input");
            let Some(range) = self.reg(frame, r).range(self.store) else {
                return false;
            };
            let end = if range.count == 0 {
                self.store.table(range.table).count() as u32
            } else {
                range.offset + range.count
            };
            EachCtx {
                table: range.table,
                row: range.offset,
                end,
            }
        };

        let entities = self.store.table(ctx.table).entities();
        let end = (ctx.end as usize).min(entities.len());
        let mut ok = false;
        while (ctx.row as usize) < end {
            let e = entities[ctx.row as usize];
            if e.index() != WILDCARD.index() && e.index() != THIS.index() {
                self.set_reg(frame, out, Reg::Entity(e));
                ok = true;
                break;
            }
            ctx.row += 1;
        }
        self.ctx[op_idx] = OpCtx::Each(ctx);
        ok
    }

    /// Find tables matching the filter through the id index; iterate
    /// tables, then (for wildcard filters) columns within a table.
    fn eval_select(&mut self, op_idx: usize, op: &Op, redo: bool) -> bool {
        let filter = op.filter.expect("select without filter");
        let out = op.r_out.expect("select without output");
        let frame = op.frame;

        let mut ctx = if redo {
            let OpCtx::Select(c) = &self.ctx[op_idx] else {
                unreachable!("select redo without context");
            };
            *c
        } else {
            let pattern = self.resolve_pattern(frame, &filter);
            // An output the caller pre-bound turns the select into a
            // constraint check on the bound table.
            let bound = self.reg(frame, out).range(self.store).map(|r| r.table);
            let records = match bound {
                Some(_) => &[][..],
                None => self.store.id_index(pattern.id),
            };
            SelectCtx {
                pattern,
                records,
                rec: 0,
                column: -1,
                bound,
            }
        };

        let ok = self.select_step(&filter, out, frame, op.term, &mut ctx, redo);
        self.ctx[op_idx] = OpCtx::Select(ctx);
        ok
    }

    fn select_step(
        &mut self,
        filter: &Filter,
        out: VarId,
        frame: u16,
        term: i32,
        ctx: &mut SelectCtx<'s>,
        redo: bool,
    ) -> bool {
        if let Some(table) = ctx.bound {
            let from = if redo {
                if !ctx.pattern.wildcard || ctx.column < 0 {
                    return false;
                }
                ctx.column as usize + 1
            } else {
                0
            };
            let pattern = ctx.pattern;
            let Some(col) = self.find_match(self.store.table(table), &pattern, from) else {
                return false;
            };
            ctx.column = col as i32;
            self.set_column(frame, term, col as i32);
            self.reify(frame, filter, &pattern, table, col);
            return true;
        }

        if redo {
            // Wildcard filters advance the column within the table first.
            if ctx.pattern.wildcard && ctx.column >= 0 {
                let rec = ctx.records[ctx.rec];
                let pattern = ctx.pattern;
                if let Some(col) =
                    self.find_match(self.store.table(rec.table), &pattern, ctx.column as usize + 1)
                {
                    ctx.column = col as i32;
                    self.set_column(frame, term, col as i32);
                    self.reify(frame, filter, &pattern, rec.table, col);
                    return true;
                }
            }
            ctx.rec += 1;
        }

        while ctx.rec < ctx.records.len() {
            let rec = ctx.records[ctx.rec];
            let table = self.store.table(rec.table);
            if table.count() == 0 {
                ctx.rec += 1;
                continue;
            }
            let pattern = ctx.pattern;
            let Some(col) = self.find_match(table, &pattern, rec.column as usize) else {
                ctx.rec += 1;
                continue;
            };
            ctx.column = col as i32;
            self.set_reg(
                frame,
                out,
                Reg::Range(TableRange {
                    table: rec.table,
                    offset: 0,
                    count: 0,
                }),
            );
            self.set_column(frame, term, col as i32);
            self.reify(frame, filter, &pattern, rec.table, col);
            return true;
        }
        false
    }

    /// Apply the filter to the table already bound to the subject.
    fn eval_with(&mut self, op_idx: usize, op: &Op, redo: bool) -> bool {
        let filter = op.filter.expect("with without filter");
        let frame = op.frame;

        let source = if let Some(e) = op.subject {
            self.store.entity_record(e).map(|rec| (rec.table, Some(e)))
        } else {
            let r = op.r_in.expect("with without subject register");
            match self.reg(frame, r) {
                Reg::Unbound => None,
                Reg::Entity(e) => self.store.entity_record(e).map(|rec| (rec.table, Some(e))),
                Reg::Range(rng) => {
                    let entity = (rng.count == 1)
                        .then(|| self.store.table(rng.table).entities()[rng.offset as usize]);
                    Some((rng.table, entity))
                }
            }
        };
        let Some((table, subject)) = source else {
            return false;
        };

        if redo {
            let OpCtx::With(c) = &self.ctx[op_idx] else {
                unreachable!("with redo without context");
            };
            let mut ctx = *c;
            if ctx.column < 0 || !ctx.pattern.wildcard {
                return false;
            }
            let pattern = ctx.pattern;
            let Some(col) =
                self.find_match(self.store.table(ctx.table), &pattern, ctx.column as usize + 1)
            else {
                return false;
            };
            ctx.column = col as i32;
            self.set_column(frame, op.term, col as i32);
            self.reify(frame, &filter, &pattern, ctx.table, col);
            self.ctx[op_idx] = OpCtx::With(ctx);
            return true;
        }

        let pattern = self.resolve_pattern(frame, &filter);
        let pred = self.resolve_slot(frame, filter.pred);

        // A subject relating to itself under a transitive-self predicate
        // succeeds reflexively, without consulting the table.
        if let Some(s) = subject
            && pattern.id.is_pair()
            && pattern.id.obj_index() == s.index()
            && self.store.has_attribute(pred, Attributes::TRANSITIVE_SELF)
        {
            self.set_column(frame, op.term, -1);
            self.ctx[op_idx] = OpCtx::With(WithCtx {
                pattern,
                table,
                column: -1,
            });
            return true;
        }

        let Some(col) = self.find_match(self.store.table(table), &pattern, 0) else {
            return false;
        };
        self.set_column(frame, op.term, col as i32);
        self.reify(frame, &filter, &pattern, table, col);
        self.ctx[op_idx] = OpCtx::With(WithCtx {
            pattern,
            table,
            column: col as i32,
        });
        true
    }

    // ------------------------------------------------------------------
    // Shared matching helpers
    // ------------------------------------------------------------------

    /// Resolve the filter against the registers once; the result is kept
    /// in the op context so reified registers do not change the pattern
    /// on redo.
    pub(super) fn resolve_pattern(&self, frame: u16, filter: &Filter) -> Pattern {
        let pred = self.resolve_slot(frame, filter.pred);
        let obj = filter.obj.map(|o| self.resolve_slot(frame, o));
        let id = match obj {
            Some(o) => Id::pair(pred, o),
            None => Id::entity(pred),
        };
        let same_pair = match (filter.pred, filter.obj) {
            (FilterSlot::Var(a), Some(FilterSlot::Var(b))) => a == b && pred == WILDCARD,
            _ => false,
        };
        Pattern {
            id,
            same_pair,
            wildcard: id.has_wildcard(),
        }
    }

    /// First column at or after `from` matching the pattern. A same-pair
    /// pattern keeps scanning until a column whose two halves are equal.
    pub(super) fn find_match(&self, table: &Table, pattern: &Pattern, from: usize) -> Option<usize> {
        let mut at = from;
        while let Some(col) = table.search_from(pattern.id, at) {
            if !pattern.same_pair {
                return Some(col);
            }
            let id = table.type_ids()[col];
            if id.is_pair() && id.pred_index() == id.obj_index() {
                return Some(col);
            }
            at = col + 1;
        }
        None
    }

    /// Fill wildcard filter registers from the matched column: the high
    /// half reifies the predicate, the low half the object.
    pub(super) fn reify(
        &mut self,
        frame: u16,
        filter: &Filter,
        pattern: &Pattern,
        table: quarry_core::TableId,
        col: usize,
    ) {
        if !pattern.wildcard {
            return;
        }
        let actual = self.store.table(table).type_ids()[col];
        if pattern.id.pred_index() == WILDCARD.index()
            && let FilterSlot::Var(v) = filter.pred
            && let Some(e) = self.store.entity_from_index(actual.pred_index())
        {
            self.set_reg(frame, v, Reg::Entity(e));
        }
        if pattern.id.is_pair()
            && pattern.id.obj_index() == WILDCARD.index()
            && actual.is_pair()
            && let Some(FilterSlot::Var(v)) = filter.obj
            && let Some(e) = self.store.entity_from_index(actual.obj_index())
        {
            self.set_reg(frame, v, Reg::Entity(e));
        }
    }
}
