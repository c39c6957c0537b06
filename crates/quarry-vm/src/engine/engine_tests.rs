use quarry_bytecode::VarKind;
use quarry_compiler::{Term, compile};
use quarry_core::{Attributes, Entity, ISA, Store};

use super::iter::RuleIter;

fn this_entities(iter: &mut RuleIter<'_, '_>) -> Vec<Entity> {
    let mut out = Vec::new();
    while iter.next() {
        out.extend_from_slice(iter.entities());
    }
    out
}

/// Character hierarchy with both pair edges (IsA) and plain-component
/// membership (Luke carries Human).
fn character_store() -> (Store, Vec<Entity>) {
    let mut store = Store::new();
    let character = store.spawn_named("Character");
    let human = store.spawn_named("Human");
    let droid = store.spawn_named("Droid");
    store.add_pair(human, ISA, character);
    store.add_pair(droid, ISA, character);
    let luke = store.spawn_named("Luke");
    let leia = store.spawn_named("Leia");
    let r2d2 = store.spawn_named("R2D2");
    let c3po = store.spawn_named("C3PO");
    store.add(luke, human);
    store.add(leia, human);
    store.add(r2d2, droid);
    store.add(c3po, droid);
    let entities = vec![character, human, droid, luke, leia, r2d2, c3po];
    (store, entities)
}

#[test]
fn subset_yields_self_then_rows_then_expansions() {
    let (store, e) = character_store();
    let &[character, human, droid, luke, leia, r2d2, c3po] = &e[..] else {
        unreachable!()
    };
    let rule = compile(&store, &[Term::pair(ISA, character)]).unwrap();
    let mut iter = RuleIter::new(&rule, &store);
    assert_eq!(
        this_entities(&mut iter),
        [character, human, droid, luke, leia, r2d2, c3po]
    );
}

#[test]
fn superset_walks_the_chain_upwards() {
    let mut store = Store::new();
    let thing = store.spawn_named("Thing");
    let person = store.spawn_named("Person");
    let character = store.spawn_named("Character");
    let human = store.spawn_named("Human");
    let luke = store.spawn_named("Luke");
    store.add_pair(person, ISA, thing);
    store.add_pair(character, ISA, person);
    store.add_pair(human, ISA, character);
    store.add(luke, human);

    let rule = compile(&store, &[Term::pair(ISA, "_X").subject(luke)]).unwrap();
    let x = rule.vars().find("_X", VarKind::Entity).unwrap();
    let mut iter = RuleIter::new(&rule, &store);
    let mut supers = Vec::new();
    while iter.next() {
        supers.push(iter.get_var(x));
    }
    assert_eq!(supers, [luke, human, character, person, thing]);
}

#[test]
fn transitive_chains_include_the_direct_fact() {
    let mut store = Store::new();
    let located_in = store.spawn_named("LocatedIn");
    store.add_attribute(located_in, Attributes::TRANSITIVE | Attributes::FINAL);
    let planet = store.spawn_named("Naboo");
    let city = store.spawn_named("Theed");
    let district = store.spawn_named("Palace");
    store.add_pair(city, located_in, planet);
    store.add_pair(district, located_in, city);

    // Direct fact.
    let rule = compile(&store, &[Term::pair(located_in, city).subject(district)]).unwrap();
    let mut iter = RuleIter::new(&rule, &store);
    assert!(iter.next());
    assert!(!iter.next());

    // Two-step chain.
    let rule = compile(&store, &[Term::pair(located_in, planet).subject(district)]).unwrap();
    let mut iter = RuleIter::new(&rule, &store);
    assert!(iter.next());
    assert!(!iter.next());

    // Wrong direction.
    let rule = compile(&store, &[Term::pair(located_in, district).subject(planet)]).unwrap();
    assert!(!RuleIter::new(&rule, &store).next());

    // Not reflexive without the self attribute.
    let rule = compile(&store, &[Term::pair(located_in, city).subject(city)]).unwrap();
    assert!(!RuleIter::new(&rule, &store).next());
}

#[test]
fn transitive_self_matches_reflexively() {
    let mut store = Store::new();
    let located_in = store.spawn_named("LocatedIn");
    store.add_attribute(
        located_in,
        Attributes::TRANSITIVE | Attributes::TRANSITIVE_SELF | Attributes::FINAL,
    );
    let naboo = store.spawn_named("Naboo");
    let theed = store.spawn_named("Theed");
    store.add_pair(theed, located_in, naboo);

    // Nothing relates Theed to itself explicitly; the reflexive closure
    // still holds and reports no matched column.
    let rule = compile(&store, &[Term::pair(located_in, theed).subject(theed)]).unwrap();
    let mut iter = RuleIter::new(&rule, &store);
    assert!(iter.next());
    assert_eq!(iter.columns(), [-1]);
    assert!(!iter.next());
}

#[test]
fn wildcard_select_advances_columns_within_a_table() {
    let mut store = Store::new();
    let likes = store.spawn_named("Likes");
    store.add_attribute(likes, Attributes::FINAL);
    let a = store.spawn_named("A");
    let b = store.spawn_named("B");
    let fan = store.spawn_named("Fan");
    store.add_pair(fan, likes, a);
    store.add_pair(fan, likes, b);

    let rule = compile(&store, &[Term::pair(likes, "_X")]).unwrap();
    let x = rule.vars().find("_X", VarKind::Entity).unwrap();
    let mut iter = RuleIter::new(&rule, &store);
    let mut liked = Vec::new();
    while iter.next() {
        assert_eq!(iter.entities(), [fan]);
        liked.push(iter.get_var(x));
    }
    assert_eq!(liked, [a, b]);
}

#[test]
fn negated_terms_filter_matches_out() {
    let mut store = Store::new();
    let human = store.spawn_named("Human");
    let enemy = store.spawn_named("Enemy");
    let vader = store.spawn_named("Vader");
    store.add_attribute(enemy, Attributes::FINAL);
    let luke = store.spawn_named("Luke");
    let leia = store.spawn_named("Leia");
    store.add(luke, human);
    store.add_pair(luke, enemy, vader);
    store.add(leia, human);

    let rule = compile(
        &store,
        &[Term::with(human), Term::pair(enemy, vader).not()],
    )
    .unwrap();
    let mut iter = RuleIter::new(&rule, &store);
    assert_eq!(this_entities(&mut iter), [leia]);
}

#[test]
fn optional_terms_bind_when_they_match() {
    let mut store = Store::new();
    let human = store.spawn_named("Human");
    let enemy = store.spawn_named("Enemy");
    store.add_attribute(enemy, Attributes::FINAL);
    let vader = store.spawn_named("Vader");
    let luke = store.spawn_named("Luke");
    let leia = store.spawn_named("Leia");
    store.add(luke, human);
    store.add_pair(luke, enemy, vader);
    store.add(leia, human);

    let rule = compile(
        &store,
        &[Term::with(human), Term::pair(enemy, "_Y").optional()],
    )
    .unwrap();
    let y = rule.vars().find("_Y", VarKind::Entity).unwrap();
    let mut iter = RuleIter::new(&rule, &store);
    let mut results = Vec::new();
    while iter.next() {
        results.push((iter.entities()[0], iter.get_var(y)));
    }
    assert_eq!(
        results,
        [(leia, Entity::default()), (luke, vader)]
    );
}

#[test]
fn set_var_constrains_iteration() {
    let mut store = Store::new();
    let likes = store.spawn_named("Likes");
    store.add_attribute(likes, Attributes::FINAL);
    let a = store.spawn_named("A");
    let b = store.spawn_named("B");
    let fan = store.spawn_named("Fan");
    store.add_pair(fan, likes, a);
    store.add_pair(fan, likes, b);

    let rule = compile(&store, &[Term::pair(likes, "_X")]).unwrap();
    let x = rule.vars().find("_X", VarKind::Entity).unwrap();
    let mut iter = RuleIter::new(&rule, &store);
    iter.set_var(x, b);
    let mut liked = Vec::new();
    while iter.next() {
        liked.push(iter.get_var(x));
    }
    assert_eq!(liked, [b]);
}

#[test]
fn iteration_is_deterministic() {
    let (store, _) = character_store();
    let character = store.lookup("Character").unwrap();
    let rule = compile(&store, &[Term::pair(ISA, character)]).unwrap();
    let first = this_entities(&mut RuleIter::new(&rule, &store));
    let second = this_entities(&mut RuleIter::new(&rule, &store));
    assert_eq!(first, second);
    assert!(!first.is_empty());
}
