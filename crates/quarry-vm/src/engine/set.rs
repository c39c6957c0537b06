//! Transitive closure engine: the SubSet and SuperSet walks.
//!
//! Both walks keep an explicit frame stack (inline capacity 16, heap
//! spill beyond). For the builtin IsA relation, plain components count as
//! inheritance edges: the sub-tree of a node includes the tables that
//! carry the node as a plain component, and the upward walk follows plain
//! component columns. Other transitive predicates use explicit pairs
//! only.

use quarry_bytecode::Op;
use quarry_core::{Entity, ISA, Id, TableId, TableRecord, THIS, WILDCARD};
use smallvec::SmallVec;

use super::ctx::{OpCtx, SubSetCtx, SubSetFrame, SuperSetCtx, SuperSetFrame};
use super::iter::RuleIter;
use super::reg::Reg;

impl<'r, 's> RuleIter<'r, 's> {
    /// Depth-first walk of everything below a root object. Each table of
    /// the current node yields all rows before any row is expanded into
    /// its own sub-tree.
    pub(super) fn eval_subset(&mut self, op_idx: usize, op: &Op, redo: bool) -> bool {
        let filter = op.filter.expect("subset without filter");
        let frame = op.frame;
        let pred = self.resolve_slot(frame, filter.pred);
        if pred == WILDCARD {
            return false;
        }

        let mut ctx = if redo {
            let OpCtx::SubSet(c) = std::mem::take(&mut self.ctx[op_idx]) else {
                unreachable!("subset redo without context");
            };
            c
        } else {
            let root = self.resolve_slot(frame, filter.obj.expect("subset without root"));
            let mut ctx = SubSetCtx::default();
            if root == WILDCARD || !self.store.is_alive(root) {
                self.ctx[op_idx] = OpCtx::SubSet(ctx);
                return false;
            }
            let records = self.lookup_down(pred, root);
            if let Some(rec) = first_populated(self, &records, 0) {
                ctx.stack.push(SubSetFrame {
                    records,
                    rec,
                    row: 0,
                    expanding: false,
                });
            }
            ctx
        };

        let ok = self.subset_step(op, &mut ctx, redo);
        self.ctx[op_idx] = OpCtx::SubSet(ctx);
        ok
    }

    fn subset_step(&mut self, op: &Op, ctx: &mut SubSetCtx, redo: bool) -> bool {
        let filter = op.filter.expect("subset without filter");
        let pred = self.resolve_slot(op.frame, filter.pred);

        if !redo {
            if ctx.stack.is_empty() {
                return false;
            }
            self.subset_emit(op, ctx);
            return true;
        }

        loop {
            let Some(top) = ctx.stack.last_mut() else {
                return false;
            };

            if !top.expanding {
                top.row += 1;
                let count = self.store.table(top.records[top.rec].table).count() as u32;
                if top.row < count {
                    self.subset_emit(op, ctx);
                    return true;
                }
                top.expanding = true;
                top.row = 0;
            }

            // Expand rows of the current table into their own sub-trees.
            let table = top.records[top.rec].table;
            let count = self.store.table(table).count() as u32;
            let mut pushed = false;
            while top.row < count {
                let e = self.store.table(table).entities()[top.row as usize];
                top.row += 1;
                if e.index() == WILDCARD.index() || e.index() == THIS.index() {
                    continue;
                }
                let child = self.lookup_down(pred, e);
                if let Some(rec) = first_populated(self, &child, 0) {
                    ctx.stack.push(SubSetFrame {
                        records: child,
                        rec,
                        row: 0,
                        expanding: false,
                    });
                    pushed = true;
                    break;
                }
            }
            if pushed {
                self.subset_emit(op, ctx);
                return true;
            }

            // Current table exhausted; advance to the next table of this
            // node, or pop back to the parent.
            let top = ctx.stack.last_mut().expect("frame vanished");
            match first_populated(self, &top.records, top.rec + 1) {
                Some(rec) => {
                    top.rec = rec;
                    top.row = 0;
                    top.expanding = false;
                    self.subset_emit(op, ctx);
                    return true;
                }
                None => {
                    ctx.stack.pop();
                }
            }
        }
    }

    /// Write the walk's current row into the output register.
    fn subset_emit(&mut self, op: &Op, ctx: &SubSetCtx) {
        let top = ctx.stack.last().expect("emit from empty subset stack");
        let rec = top.records[top.rec];
        self.set_reg(
            op.frame,
            op.r_out.expect("subset without output"),
            Reg::Range(quarry_core::TableRange {
                table: rec.table,
                offset: top.row,
                count: 1,
            }),
        );
        self.set_column(op.frame, op.term, rec.column as i32);
    }

    /// Walk of the successor chain above a subject: the first matching
    /// edge of its table, then that target's own edge, falling back to
    /// sibling columns on redo.
    pub(super) fn eval_superset(&mut self, op_idx: usize, op: &Op, redo: bool) -> bool {
        let filter = op.filter.expect("superset without filter");
        let frame = op.frame;
        let pred = self.resolve_slot(frame, filter.pred);
        if pred == WILDCARD {
            return false;
        }
        let out = op.r_out.expect("superset without output");

        let mut ctx = if redo {
            let OpCtx::SuperSet(c) = std::mem::take(&mut self.ctx[op_idx]) else {
                unreachable!("superset redo without context");
            };
            c
        } else {
            let root = self.resolve_slot(frame, filter.obj.expect("superset without root"));
            let mut ctx = SuperSetCtx::default();
            if root != WILDCARD
                && let Some(rec) = self.store.entity_record(root)
                && let Some((col, _)) = self.find_up(rec.table, pred, 0)
            {
                ctx.stack.push(SuperSetFrame {
                    table: rec.table,
                    column: col,
                });
            }
            ctx
        };

        let ok = self.superset_step(op, pred, out, &mut ctx, redo);
        self.ctx[op_idx] = OpCtx::SuperSet(ctx);
        ok
    }

    fn superset_step(
        &mut self,
        op: &Op,
        pred: Entity,
        out: quarry_bytecode::VarId,
        ctx: &mut SuperSetCtx,
        redo: bool,
    ) -> bool {
        if !redo {
            let Some(top) = ctx.stack.last() else {
                return false;
            };
            let (_, target) = self
                .find_up(top.table, pred, top.column as usize)
                .expect("superset frame lost its edge");
            self.set_reg(op.frame, out, Reg::Entity(target));
            self.set_column(op.frame, op.term, top.column as i32);
            return true;
        }

        // Descend: the last yielded target's own table may have an edge.
        if let Some(top) = ctx.stack.last()
            && let Some((_, target)) = self.find_up(top.table, pred, top.column as usize)
            && let Some(rec) = self.store.entity_record(target)
            && let Some((col, deeper)) = self.find_up(rec.table, pred, 0)
        {
            ctx.stack.push(SuperSetFrame {
                table: rec.table,
                column: col,
            });
            self.set_reg(op.frame, out, Reg::Entity(deeper));
            self.set_column(op.frame, op.term, col as i32);
            return true;
        }

        // Sibling edges, popping exhausted frames.
        loop {
            let Some(top) = ctx.stack.last_mut() else {
                return false;
            };
            let from = top.column as usize + 1;
            let table = top.table;
            match self.find_up(table, pred, from) {
                Some((col, target)) => {
                    top.column = col;
                    self.set_reg(op.frame, out, Reg::Entity(target));
                    self.set_column(op.frame, op.term, col as i32);
                    return true;
                }
                None => {
                    ctx.stack.pop();
                }
            }
        }
    }

    /// Tables directly below `node`: those registered under the pair
    /// `(pred, node)`, plus, for IsA, those carrying `node` as a plain
    /// component.
    fn lookup_down(&self, pred: Entity, node: Entity) -> SmallVec<[TableRecord; 4]> {
        let mut records: SmallVec<[TableRecord; 4]> = SmallVec::new();
        records.extend_from_slice(self.store.id_index(Id::pair(pred, node)));
        if pred == ISA {
            records.extend_from_slice(self.store.id_index(Id::entity(node)));
        }
        records
    }

    /// First upward edge of a table at or after `from`, with its target.
    fn find_up(&self, table: TableId, pred: Entity, from: usize) -> Option<(u32, Entity)> {
        let t = self.store.table(table);
        for (col, &id) in t.type_ids().iter().enumerate().skip(from) {
            let target_index = if id.is_pair() {
                (id.pred_index() == pred.index()).then(|| id.obj_index())
            } else if pred == ISA {
                Some(id.pred_index())
            } else {
                None
            };
            let Some(index) = target_index else {
                continue;
            };
            if index == WILDCARD.index() || index == THIS.index() {
                continue;
            }
            if let Some(e) = self.store.entity_from_index(index) {
                return Some((col as u32, e));
            }
        }
        None
    }
}

/// First record whose table has live rows, from `from`.
fn first_populated(
    iter: &RuleIter<'_, '_>,
    records: &SmallVec<[TableRecord; 4]>,
    from: usize,
) -> Option<usize> {
    records[from.min(records.len())..]
        .iter()
        .position(|r| iter.store.table(r.table).count() > 0)
        .map(|i| i + from)
}
