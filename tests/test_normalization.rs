//! Tests for construction-time constraint normalization

use qualsolve::lattice::Lattice;
use qualsolve::manager::SlotManager;
use qualsolve::model::{ComparisonOp, Constraint, ConstraintManager, Location};
use qualsolve::QualError;

fn diamond() -> Lattice {
    Lattice::builder()
        .qualifier("Top")
        .qualifier("A")
        .qualifier("B")
        .qualifier("Bottom")
        .edge("A", "Top")
        .edge("B", "Top")
        .edge("Bottom", "A")
        .edge("Bottom", "B")
        .top("Top")
        .bottom("Bottom")
        .build()
        .unwrap()
}

#[test]
fn constant_pairs_decide_subtype_immediately() {
    let lattice = diamond();
    let mut slots = SlotManager::new(lattice.clone());
    let constraints = ConstraintManager::new(lattice.clone());

    let a = slots.create_constant(lattice.qualifier("A").unwrap());
    let b = slots.create_constant(lattice.qualifier("B").unwrap());
    let bottom = slots.create_constant(lattice.bottom());

    assert_eq!(
        constraints.subtype(bottom.clone(), a.clone(), Location::missing()),
        Constraint::AlwaysTrue
    );
    assert_eq!(
        constraints.subtype(a.clone(), b.clone(), Location::missing()),
        Constraint::AlwaysFalse
    );
}

#[test]
fn constant_pairs_decide_comparability_in_either_direction() {
    let lattice = diamond();
    let mut slots = SlotManager::new(lattice.clone());
    let constraints = ConstraintManager::new(lattice.clone());
    let loc = Location::source("A.java", 8);

    let a = slots.create_constant(lattice.qualifier("A").unwrap());
    let b = slots.create_constant(lattice.qualifier("B").unwrap());
    let top = slots.create_constant(lattice.top());

    // subtype holds in one direction: comparable
    assert_eq!(
        constraints
            .comparable(ComparisonOp::LessThan, top.clone(), a.clone(), loc.clone())
            .unwrap(),
        Constraint::AlwaysTrue
    );
    // no relation in either direction: never comparable
    assert_eq!(
        constraints
            .comparable(ComparisonOp::LessThan, a, b, loc)
            .unwrap(),
        Constraint::AlwaysFalse
    );
}

#[test]
fn reflexive_relations_collapse_to_true() {
    let lattice = diamond();
    let mut slots = SlotManager::new(lattice.clone());
    let constraints = ConstraintManager::new(lattice);

    let v = slots.create_source_variable(Location::source("A.java", 1), "int", true);

    assert_eq!(
        constraints.subtype(v.clone(), v.clone(), Location::missing()),
        Constraint::AlwaysTrue
    );
    assert_eq!(
        constraints.equality(v.clone(), v.clone(), Location::missing()),
        Constraint::AlwaysTrue
    );
    assert_eq!(
        constraints.existential(v.clone(), v, Location::missing()),
        Constraint::AlwaysTrue
    );
}

#[test]
fn variable_relations_are_not_normalized_away() {
    let lattice = diamond();
    let mut slots = SlotManager::new(lattice.clone());
    let constraints = ConstraintManager::new(lattice.clone());

    let v = slots.create_source_variable(Location::source("A.java", 1), "int", true);
    let w = slots.create_source_variable(Location::source("A.java", 2), "int", true);
    let top = slots.create_constant(lattice.top());

    assert!(matches!(
        constraints.subtype(v.clone(), w.clone(), Location::missing()),
        Constraint::Subtype { .. }
    ));
    assert!(matches!(
        constraints.subtype(v.clone(), top, Location::missing()),
        Constraint::Subtype { .. }
    ));
    assert!(matches!(
        constraints.equality(v, w, Location::missing()),
        Constraint::Equality { .. }
    ));
}

#[test]
fn location_bound_factories_reject_missing_locations() {
    let lattice = diamond();
    let mut slots = SlotManager::new(lattice.clone());
    let constraints = ConstraintManager::new(lattice.clone());

    let v = slots.create_source_variable(Location::source("A.java", 1), "int", true);
    let w = slots.create_source_variable(Location::source("A.java", 2), "int", true);
    let loc = Location::source("A.java", 3);
    let result = slots
        .create_comparison_variable(loc.clone(), &v, qualsolve::model::Branch::Then)
        .unwrap();
    let arith = slots.create_arithmetic_variable(loc).unwrap();

    assert!(matches!(
        constraints.comparable(ComparisonOp::LessThan, v.clone(), w.clone(), Location::missing()),
        Err(QualError::MissingLocation(_))
    ));
    assert!(matches!(
        constraints.comparison(
            ComparisonOp::LessThan,
            v.clone(),
            w.clone(),
            result,
            Location::missing()
        ),
        Err(QualError::MissingLocation(_))
    ));
    assert!(matches!(
        constraints.arithmetic(
            qualsolve::model::ArithmeticOp::Plus,
            v,
            w,
            arith,
            Location::missing()
        ),
        Err(QualError::MissingLocation(_))
    ));
}

#[test]
fn comparison_keeps_its_result_slot() {
    let lattice = diamond();
    let mut slots = SlotManager::new(lattice.clone());
    let constraints = ConstraintManager::new(lattice);

    let v = slots.create_source_variable(Location::source("A.java", 1), "int", true);
    let w = slots.create_source_variable(Location::source("A.java", 2), "int", true);
    let loc = Location::source("A.java", 3);
    let result = slots
        .create_comparison_variable(loc.clone(), &v, qualsolve::model::Branch::Then)
        .unwrap();

    let c = constraints
        .comparison(ComparisonOp::GreaterThan, v, w, result.clone(), loc)
        .unwrap();
    match c {
        Constraint::Comparison { result: r, op, .. } => {
            assert_eq!(r.id(), result.id());
            assert_eq!(op, ComparisonOp::GreaterThan);
        }
        other => panic!("expected a comparison constraint, got {}", other),
    }
}
