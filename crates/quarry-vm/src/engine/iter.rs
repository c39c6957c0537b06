//! The rule iterator: register frames, dispatch loop, yield snapshot.

use quarry_bytecode::{FilterSlot, HALT, Op, OpKind, Rule, SubjectRef, VarId, VarKind};
use quarry_core::{Entity, Id, Store, TableId, TableRange};

use super::ctx::{OpCtx, SetJmpCtx};
use super::reg::Reg;
use super::trace::{NoopTracer, Tracer};

/// Cursor over the matches of a compiled rule.
///
/// The iterator owns the register frames, match-column arrays and
/// per-instruction contexts; creating one never mutates the rule. The
/// store is borrowed for the iterator's lifetime, so structural store
/// mutation while iterating is rejected at compile time.
pub struct RuleIter<'r, 's> {
    pub(super) rule: &'r Rule,
    pub(super) store: &'s Store,
    /// `frame_count x var_count` register slots.
    pub(super) regs: Vec<Reg>,
    /// `frame_count x term_count` matched columns.
    pub(super) columns: Vec<i32>,
    pub(super) ctx: Vec<OpCtx<'s>>,
    cur: i32,
    redo: bool,
    last_frame: i32,
    started: bool,
    // Snapshot of the last yield.
    range: Option<TableRange>,
    ids: Vec<Id>,
    subjects: Vec<Entity>,
    match_columns: Vec<i32>,
    var_values: Vec<Entity>,
}

impl<'r, 's> RuleIter<'r, 's> {
    pub fn new(rule: &'r Rule, store: &'s Store) -> Self {
        let frames = rule.program().frame_count();
        let var_count = rule.vars().len();
        let term_count = rule.term_count();
        Self {
            rule,
            store,
            regs: vec![Reg::Unbound; frames * var_count],
            columns: vec![-1; frames * term_count],
            ctx: vec![OpCtx::None; rule.program().len()],
            cur: 0,
            redo: false,
            last_frame: 0,
            started: false,
            range: None,
            ids: Vec::new(),
            subjects: Vec::new(),
            match_columns: Vec::new(),
            var_values: Vec::new(),
        }
    }

    /// Advance to the next match. Returns false once exhausted.
    pub fn next(&mut self) -> bool {
        self.next_with(&mut NoopTracer)
    }

    /// Advance with a tracer observing every dispatched instruction.
    pub fn next_with<T: Tracer>(&mut self, tracer: &mut T) -> bool {
        self.started = true;
        let ops = self.rule.program().ops();
        while self.cur != HALT {
            let op_idx = self.cur as usize;
            let op = ops[op_idx].clone();
            let control = matches!(op.kind, OpKind::SetJmp | OpKind::Jump);
            if !control {
                if !self.redo && op.frame > 0 && i32::from(op.frame) != self.last_frame {
                    self.copy_frame(op.frame as usize);
                }
                self.last_frame = i32::from(op.frame);
            }

            let redo = self.redo;
            tracer.trace_op(op_idx, &op, redo);
            let ok = self.eval(op_idx, &op, redo);
            tracer.trace_result(op_idx, ok);

            self.cur = if ok { op.on_pass } else { op.on_fail };
            if op.kind == OpKind::Yield {
                self.populate(&op);
                self.redo = true;
                tracer.trace_yield();
                return true;
            }
            if op.kind == OpKind::Jump {
                // The pass label of a Jump holds its SetJmp's index.
                let OpCtx::SetJmp(SetJmpCtx { label }) = &self.ctx[op.on_pass as usize] else {
                    unreachable!("jump dispatched before its setjmp");
                };
                self.cur = *label;
            }
            self.redo = self.cur <= op_idx as i32;
        }
        tracer.trace_done();
        false
    }

    // ------------------------------------------------------------------
    // Variables
    // ------------------------------------------------------------------

    /// Bind a variable before iteration starts.
    pub fn set_var(&mut self, var: VarId, value: Entity) {
        assert!(!self.started, "set_var after iteration started");
        self.regs[var as usize] = Reg::Entity(value);
    }

    /// Value of a variable in the last yielded match; zero for table
    /// variables and unbound slots.
    pub fn get_var(&self, var: VarId) -> Entity {
        self.var_values.get(var as usize).copied().unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Snapshot accessors
    // ------------------------------------------------------------------

    /// Table of the current match, if the rule has a variable subject.
    pub fn table(&self) -> Option<TableId> {
        self.range.map(|r| r.table)
    }

    /// Row range of the current match.
    pub fn range(&self) -> Option<TableRange> {
        self.range
    }

    /// Entities of the current match.
    pub fn entities(&self) -> &'s [Entity] {
        match self.range {
            Some(r) => {
                let all = self.store.table(r.table).entities();
                &all[r.offset as usize..(r.offset + r.count) as usize]
            }
            None => &[],
        }
    }

    /// Resolved id per term, wildcards replaced by matched values.
    pub fn ids(&self) -> &[Id] {
        &self.ids
    }

    /// Subject entity per term; zero when the subject is the yielded
    /// table itself.
    pub fn subjects(&self) -> &[Entity] {
        &self.subjects
    }

    /// Matched column per term; -1 for reflexive matches.
    pub fn columns(&self) -> &[i32] {
        &self.match_columns
    }

    /// Entity values of all variables; zero for table variables.
    pub fn vars(&self) -> &[Entity] {
        &self.var_values
    }

    // ------------------------------------------------------------------
    // Registers and columns
    // ------------------------------------------------------------------

    pub(super) fn reg(&self, frame: u16, var: VarId) -> Reg {
        let vc = self.rule.vars().len();
        self.regs[frame as usize * vc + var as usize]
    }

    pub(super) fn set_reg(&mut self, frame: u16, var: VarId, value: Reg) {
        let vc = self.rule.vars().len();
        self.regs[frame as usize * vc + var as usize] = value;
    }

    pub(super) fn set_column(&mut self, frame: u16, term: i32, column: i32) {
        if term < 0 {
            return;
        }
        let tc = self.rule.term_count();
        self.columns[frame as usize * tc + term as usize] = column;
    }

    /// Snapshot the previous frame into `frame` when stepping forward.
    fn copy_frame(&mut self, frame: usize) {
        let vc = self.rule.vars().len();
        if vc > 0 {
            let (src, dst) = self.regs.split_at_mut(frame * vc);
            dst[..vc].copy_from_slice(&src[(frame - 1) * vc..]);
        }
        let tc = self.rule.term_count();
        if tc > 0 {
            let (src, dst) = self.columns.split_at_mut(frame * tc);
            dst[..tc].copy_from_slice(&src[(frame - 1) * tc..]);
        }
    }

    pub(super) fn resolve_slot(&self, frame: u16, slot: FilterSlot) -> Entity {
        match slot {
            FilterSlot::Entity(e) => e,
            FilterSlot::Var(v) => self.reg(frame, v).entity(self.store),
        }
    }

    // ------------------------------------------------------------------
    // Yield
    // ------------------------------------------------------------------

    fn populate(&mut self, yield_op: &Op) {
        let frame = yield_op.frame;

        self.range = yield_op.r_in.and_then(|r| match self.reg(frame, r) {
            Reg::Unbound => None,
            Reg::Entity(e) => self.store.entity_record(e).map(|rec| TableRange {
                table: rec.table,
                offset: rec.row,
                count: 1,
            }),
            Reg::Range(rng) => {
                let count = if rng.count == 0 {
                    self.store.table(rng.table).count() as u32 - rng.offset
                } else {
                    rng.count
                };
                Some(TableRange {
                    table: rng.table,
                    offset: rng.offset,
                    count,
                })
            }
        });

        self.ids.clear();
        for filter in self.rule.filters() {
            let pred = self.resolve_slot(frame, filter.pred);
            let id = match filter.obj {
                Some(obj) => Id::pair(pred, self.resolve_slot(frame, obj)),
                None => Id::entity(pred),
            };
            self.ids.push(id);
        }

        let root = self.rule.root();
        self.subjects.clear();
        for subject in self.rule.subjects() {
            let e = match subject {
                SubjectRef::Literal(e) => *e,
                SubjectRef::Var { table, entity } => {
                    if root == Some(*table) {
                        Entity::default()
                    } else {
                        let slot = entity
                            .map(|v| self.reg(frame, v))
                            .filter(|r| r.is_bound())
                            .unwrap_or_else(|| self.reg(frame, *table));
                        let e = slot.entity(self.store);
                        if e == quarry_core::WILDCARD {
                            Entity::default()
                        } else {
                            e
                        }
                    }
                }
            };
            self.subjects.push(e);
        }

        let tc = self.rule.term_count();
        self.match_columns.clear();
        self.match_columns
            .extend_from_slice(&self.columns[frame as usize * tc..frame as usize * tc + tc]);

        self.var_values.clear();
        for var in self.rule.vars().iter() {
            let value = if var.kind == VarKind::Entity {
                let e = self.reg(frame, var.id).entity(self.store);
                if e == quarry_core::WILDCARD {
                    Entity::default()
                } else {
                    e
                }
            } else {
                Entity::default()
            };
            self.var_values.push(value);
        }
    }
}
