use quarry_bytecode::VarKind;
use quarry_core::Store;

use crate::compile::compile;
use crate::error::RuleError;
use crate::term::Term;

#[test]
fn empty_rule_is_rejected() {
    let store = Store::new();
    assert_eq!(compile(&store, &[]).unwrap_err(), RuleError::NoTerms);
}

#[test]
fn only_negated_terms_is_rejected() {
    let mut store = Store::new();
    let likes = store.spawn_named("Likes");
    let han = store.spawn_named("HanSolo");
    let err = compile(&store, &[Term::pair(likes, han).not()]).unwrap_err();
    assert_eq!(err, RuleError::OnlyNegatedTerms);
}

#[test]
fn this_is_elected_root_and_sorts_first() {
    let mut store = Store::new();
    let likes = store.spawn_named("Likes");
    let rule = compile(
        &store,
        &[
            Term::pair(likes, "_X"),
            Term::pair(likes, "_Y").subject("_X"),
        ],
    )
    .unwrap();

    let vars = rule.vars();
    assert_eq!(vars.get(0).name, ".");
    assert_eq!(vars.get(0).kind, VarKind::Table);
    assert_eq!(vars.get(0).depth, 0);
    // Ids always equal positions after the sort.
    for (i, var) in vars.iter().enumerate() {
        assert_eq!(var.id as usize, i);
    }
    // Table records sort ahead of every Entity record.
    let first_entity = vars.iter().position(|v| v.kind == VarKind::Entity).unwrap();
    assert!(
        vars.iter()
            .skip(first_entity)
            .all(|v| v.kind == VarKind::Entity)
    );
}

#[test]
fn depth_orders_dependent_variables() {
    let mut store = Store::new();
    let likes = store.spawn_named("Likes");
    let rule = compile(
        &store,
        &[
            Term::pair(likes, "_X"),
            Term::pair(likes, "_Y").subject("_X"),
        ],
    )
    .unwrap();
    let vars = rule.vars();
    let x = vars.find("_X", VarKind::Entity).unwrap();
    let y = vars.find("_Y", VarKind::Entity).unwrap();
    assert_eq!(vars.get(x).depth, 1);
    assert_eq!(vars.get(y).depth, 2);
    assert!(x < y);
}

#[test]
fn unreachable_variable_is_a_compile_error() {
    let mut store = Store::new();
    let likes = store.spawn_named("Likes");
    let human = store.spawn_named("Human");
    let err = compile(
        &store,
        &[Term::pair(likes, "_X"), Term::with(human).subject("_Y")],
    )
    .unwrap_err();
    assert_eq!(err, RuleError::UnconstrainedVariable("_Y".to_string()));
}

#[test]
fn not_terms_cannot_introduce_variables() {
    let mut store = Store::new();
    let likes = store.spawn_named("Likes");
    let han = store.spawn_named("HanSolo");

    let err = compile(
        &store,
        &[Term::pair(likes, han), Term::pair("_P", han).not()],
    )
    .unwrap_err();
    assert_eq!(err, RuleError::MissingPredicateVariable("_P".to_string()));

    let err = compile(
        &store,
        &[Term::pair(likes, han), Term::pair(likes, "_O").not()],
    )
    .unwrap_err();
    assert_eq!(err, RuleError::MissingObjectVariable("_O".to_string()));
}

#[test]
fn not_terms_may_reuse_declared_variables() {
    let mut store = Store::new();
    let likes = store.spawn_named("Likes");
    let enemy = store.spawn_named("Enemy");
    let rule = compile(
        &store,
        &[Term::pair(likes, "_X"), Term::pair(enemy, "_X").not()],
    );
    assert!(rule.is_ok());
}

#[test]
fn variable_count_is_bounded() {
    let mut store = Store::new();
    let likes = store.spawn_named("Likes");
    let terms: Vec<Term> = (0..300)
        .map(|i| Term::pair(likes, format!("_V{i}").as_str()))
        .collect();
    assert_eq!(
        compile(&store, &terms).unwrap_err(),
        RuleError::TooManyVariables
    );
}

#[test]
fn this_aliases_are_folded() {
    let mut store = Store::new();
    let likes = store.spawn_named("Likes");
    let rule = compile(&store, &[Term::pair(likes, "_X").subject("This")]).unwrap();
    assert_eq!(rule.vars().get(0).name, ".");
    assert!(rule.vars().find("This", VarKind::Table).is_none());
}
