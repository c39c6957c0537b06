use insta::assert_snapshot;
use quarry_core::Entity;

use crate::dump::dump;
use crate::ops::{Filter, FilterSlot, Op, OpKind, Program};
use crate::rule::{Rule, SubjectRef};
use crate::vars::{VarKind, VarTable, Variable};

fn sample_rule() -> (Rule, Entity) {
    let home = Entity::from_bits(8);
    let mut vars = VarTable::new();
    vars.push(Variable {
        id: 0,
        name: ".".to_string(),
        kind: VarKind::Table,
        occurs: 1,
        depth: 0,
        anonymous: false,
    });
    let x = vars.push(Variable {
        id: 0,
        name: "_X".to_string(),
        kind: VarKind::Entity,
        occurs: 1,
        depth: 1,
        anonymous: false,
    });

    let mut input = Op::bare(OpKind::Input, 0);
    input.on_pass = 1;
    let select = Op {
        kind: OpKind::Select,
        filter: Some(Filter::pair(
            FilterSlot::Entity(home),
            FilterSlot::Var(x),
        )),
        subject: None,
        on_pass: 2,
        on_fail: 0,
        frame: 1,
        term: 0,
        r_in: None,
        r_out: Some(0),
    };
    let mut yield_op = Op::bare(OpKind::Yield, 1);
    yield_op.on_pass = -1;
    yield_op.on_fail = 1;
    yield_op.r_in = Some(0);

    let rule = Rule::new(
        Program::new(vec![input, select, yield_op]),
        vars,
        vec![SubjectRef::Var {
            table: 0,
            entity: None,
        }],
        vec![Filter::pair(FilterSlot::Entity(home), FilterSlot::Var(x))],
    );
    (rule, home)
}

#[test]
fn dump_is_stable() {
    let (rule, home) = sample_rule();
    let text = dump(&rule, &|e| (e == home).then(|| "HomePlanet".to_string()));
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "  0: [  1,  -1] f0  input");
    assert_snapshot!(
        lines[1].trim_start(),
        @"1: [  2,   0] f1  select   O:t. (HomePlanet, _X)"
    );
    assert_snapshot!(lines[2].trim_start(), @"2: [ -1,   1] f1  yield    I:t.");
}

#[test]
fn unnamed_entities_render_as_index() {
    let (rule, _) = sample_rule();
    let text = dump(&rule, &|_| None);
    assert!(text.contains("(#8, _X)"));
}

#[test]
fn frame_count_spans_the_program() {
    let (rule, _) = sample_rule();
    assert_eq!(rule.program().frame_count(), 2);
    assert_eq!(rule.root(), Some(0));
    assert_eq!(rule.term_count(), 1);
}
