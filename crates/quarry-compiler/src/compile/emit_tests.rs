use quarry_bytecode::{OpKind, VarKind};
use quarry_core::{Attributes, Store};

use crate::compile::compile;
use crate::term::Term;

fn kinds(rule: &quarry_bytecode::Rule) -> Vec<OpKind> {
    rule.program().ops().iter().map(|op| op.kind).collect()
}

#[test]
fn non_final_predicate_gets_subset_prelude() {
    let mut store = Store::new();
    let home = store.spawn_named("HomePlanet");
    let tatooine = store.spawn_named("Tatooine");
    let rule = compile(&store, &[Term::pair(home, tatooine)]).unwrap();
    assert_eq!(
        kinds(&rule),
        [
            OpKind::Input,
            OpKind::SetJmp,
            OpKind::Store,
            OpKind::SubSet,
            OpKind::Jump,
            OpKind::Select,
            OpKind::Yield,
        ]
    );
    // Inclusive prelude wiring.
    let ops = rule.program().ops();
    assert_eq!(ops[1].on_fail, 3);
    assert_eq!(ops[2].on_pass, 5);
    assert_eq!(ops[2].on_fail, 1);
    assert_eq!(ops[3].on_pass, 5);
    assert_eq!(ops[3].on_fail, 0);
    assert_eq!(ops[4].on_pass, 1);
    // Select binds the root table register.
    assert_eq!(ops[5].r_out, Some(0));
    assert_eq!(ops[5].term, 0);
}

#[test]
fn final_predicate_compiles_to_a_bare_select() {
    let mut store = Store::new();
    let home = store.spawn_named("HomePlanet");
    let tatooine = store.spawn_named("Tatooine");
    store.add_attribute(home, Attributes::FINAL);
    let rule = compile(&store, &[Term::pair(home, tatooine)]).unwrap();
    assert_eq!(kinds(&rule), [OpKind::Input, OpKind::Select, OpKind::Yield]);
    let ops = rule.program().ops();
    assert_eq!(ops[0].on_fail, -1);
    assert_eq!(ops[1].on_fail, 0);
    assert_eq!(ops[2].on_fail, 1);
    assert_eq!(ops[2].on_pass, -1);
}

#[test]
fn transitive_with_known_object_walks_subsets_into_the_subject() {
    let mut store = Store::new();
    let character = store.spawn_named("Character");
    let rule = compile(
        &store,
        &[Term::pair(quarry_core::ISA, character)],
    )
    .unwrap();
    // IsA is transitive-self, so the walk is wrapped in the inclusive
    // prelude; the subject table register receives every match.
    assert_eq!(
        kinds(&rule),
        [
            OpKind::Input,
            OpKind::SetJmp,
            OpKind::Store,
            OpKind::SubSet,
            OpKind::Jump,
            OpKind::Yield,
        ]
    );
    let ops = rule.program().ops();
    assert_eq!(ops[3].term, 0);
    assert_eq!(ops[3].r_out, Some(0));
    assert_eq!(rule.vars().get(0).name, ".");
}

#[test]
fn not_group_is_wrapped_and_escapes_forward() {
    let mut store = Store::new();
    let likes = store.spawn_named("Likes");
    let enemy = store.spawn_named("Enemy");
    let han = store.spawn_named("HanSolo");
    let vader = store.spawn_named("Vader");
    store.add_attribute(likes, Attributes::FINAL);
    store.add_attribute(enemy, Attributes::FINAL);

    let rule = compile(
        &store,
        &[Term::pair(likes, han), Term::pair(enemy, vader).not()],
    )
    .unwrap();
    assert_eq!(
        kinds(&rule),
        [
            OpKind::Input,
            OpKind::Select,
            OpKind::Not,
            OpKind::With,
            OpKind::Not,
            OpKind::Yield,
        ]
    );
    let ops = rule.program().ops();
    // Pre-Not: into the group, back out on redo.
    assert_eq!(ops[2].on_pass, 3);
    assert_eq!(ops[2].on_fail, 1);
    // Inner escape jumps past the post-Not.
    assert_eq!(ops[3].on_fail, 5);
    // Post-Not routes a match back into the pre-Not.
    assert_eq!(ops[4].on_pass, 2);
    assert_eq!(ops[4].on_fail, 2);
}

#[test]
fn optional_group_passes_once_and_does_not_roll_back() {
    let mut store = Store::new();
    let home = store.spawn_named("HomePlanet");
    let enemy = store.spawn_named("Enemy");
    store.add_attribute(home, Attributes::FINAL);
    store.add_attribute(enemy, Attributes::FINAL);

    let rule = compile(
        &store,
        &[Term::pair(home, "_X"), Term::pair(enemy, "_Y").optional()],
    )
    .unwrap();
    assert_eq!(
        kinds(&rule),
        [
            OpKind::Input,
            OpKind::Select,
            OpKind::With,
            OpKind::Not,
            OpKind::Yield,
        ]
    );
    let ops = rule.program().ops();
    // The optional term's failure lands on the post op instead of
    // backtracking, so prior bindings survive.
    assert_eq!(ops[2].on_fail, 3);
    assert_eq!(ops[3].on_pass, 4);
    assert_eq!(ops[3].on_fail, 1);
}

#[test]
fn entity_reads_of_bound_tables_insert_each() {
    let mut store = Store::new();
    let likes = store.spawn_named("Likes");
    store.add_attribute(likes, Attributes::FINAL);

    let rule = compile(
        &store,
        &[
            Term::pair(likes, "_X"),
            Term::pair(likes, ".").subject("_X"),
        ],
    )
    .unwrap();
    assert_eq!(
        kinds(&rule),
        [
            OpKind::Input,
            OpKind::Select,
            OpKind::Each,
            OpKind::With,
            OpKind::Yield,
        ]
    );
    let ops = rule.program().ops();
    let vars = rule.vars();
    let this_table = vars.find(".", VarKind::Table).unwrap();
    let this_entity = vars.find(".", VarKind::Entity).unwrap();
    let x_entity = vars.find("_X", VarKind::Entity).unwrap();
    assert_eq!(ops[2].r_in, Some(this_table));
    assert_eq!(ops[2].r_out, Some(this_entity));
    // The second term reads the reified _X entity register.
    assert_eq!(ops[3].r_in, Some(x_entity));
    // The yield reports the per-entity binding of the root.
    assert_eq!(ops[4].r_in, Some(this_entity));
}

#[test]
fn literal_subject_without_the_filter_searches_its_supersets() {
    let mut store = Store::new();
    let home = store.spawn_named("HomePlanet");
    let alderaan = store.spawn_named("Alderaan");
    let luke = store.spawn_named("Luke");
    store.add_attribute(home, Attributes::FINAL);

    let rule = compile(
        &store,
        &[Term::pair(home, alderaan).subject(luke)],
    )
    .unwrap();
    assert_eq!(
        kinds(&rule),
        [
            OpKind::Input,
            OpKind::SetJmp,
            OpKind::Store,
            OpKind::SuperSet,
            OpKind::Jump,
            OpKind::With,
            OpKind::Yield,
        ]
    );
    // No subject variable: nothing for the yield to report as a table.
    assert_eq!(rule.program().ops()[6].r_in, None);
    assert_eq!(rule.root(), None);
}

#[test]
fn literal_subject_with_the_filter_tests_in_place() {
    let mut store = Store::new();
    let home = store.spawn_named("HomePlanet");
    let tatooine = store.spawn_named("Tatooine");
    let luke = store.spawn_named("Luke");
    store.add_attribute(home, Attributes::FINAL);
    store.add_pair(luke, home, tatooine);

    let rule = compile(&store, &[Term::pair(home, tatooine).subject(luke)]).unwrap();
    assert_eq!(kinds(&rule), [OpKind::Input, OpKind::With, OpKind::Yield]);
    assert_eq!(rule.program().ops()[1].subject, Some(luke));
}
