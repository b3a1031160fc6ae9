use criterion::{black_box, criterion_group, criterion_main, Criterion};
use qualsolve::backend::sat::SatBackend;
use qualsolve::lattice::Lattice;
use qualsolve::manager::SlotManager;
use qualsolve::model::{Constraint, ConstraintManager, Location};

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

/// A chain x0 <: x1 <: ... <: x(n-1) <: A
fn chain_problem(n: usize) -> (Lattice, SlotManager, Vec<Constraint>) {
    let lattice = diamond();
    let mut slots = SlotManager::new(lattice.clone());
    let constraints = ConstraintManager::new(lattice.clone());

    let vars: Vec<_> = (0..n)
        .map(|i| slots.create_source_variable(Location::source("Chain.java", i as u32), "int", true))
        .collect();
    let a = slots.create_constant(lattice.qualifier("A").unwrap());

    let mut set = Vec::new();
    for pair in vars.windows(2) {
        set.push(constraints.subtype(pair[0].clone(), pair[1].clone(), Location::missing()));
    }
    set.push(constraints.subtype(vars[n - 1].clone(), a, Location::missing()));

    (lattice, slots, set)
}

fn bench_slot_interning(c: &mut Criterion) {
    let lattice = diamond();
    c.bench_function("intern_1000_source_variables", |b| {
        b.iter(|| {
            let mut slots = SlotManager::new(lattice.clone());
            for i in 0..1000u32 {
                // every location is requested twice; the second hit is cached
                slots.create_source_variable(Location::source("Big.java", i), "int", true);
                slots.create_source_variable(Location::source("Big.java", i), "int", true);
            }
            black_box(slots.num_slots())
        })
    });
}

fn bench_sat_solve(c: &mut Criterion) {
    let (lattice, slots, set) = chain_problem(100);
    c.bench_function("sat_solve_chain_100", |b| {
        b.iter(|| {
            let backend = SatBackend::new(lattice.clone());
            black_box(backend.solve(&slots, &set).unwrap())
        })
    });
}

fn bench_sat_explain(c: &mut Criterion) {
    // contradictory tail makes the chain unsatisfiable
    let lattice = Lattice::builder()
        .qualifier("Top")
        .qualifier("A")
        .qualifier("B")
        .edge("A", "Top")
        .edge("B", "Top")
        .top("Top")
        .bottom("A")
        .build()
        .unwrap();
    let mut slots = SlotManager::new(lattice.clone());
    let constraints = ConstraintManager::new(lattice.clone());

    let x = slots.create_source_variable(Location::source("Conflict.java", 1), "int", true);
    let a = slots.create_constant(lattice.qualifier("A").unwrap());
    let b = slots.create_constant(lattice.qualifier("B").unwrap());
    let set = vec![
        constraints.subtype(x.clone(), a, Location::missing()),
        constraints.subtype(x, b, Location::missing()),
    ];

    c.bench_function("sat_explain_conflict", |bencher| {
        bencher.iter(|| {
            let backend = SatBackend::new(lattice.clone());
            black_box(backend.explain_unsatisfiable(&slots, &set).unwrap())
        })
    });
}

criterion_group!(
    benches,
    bench_slot_interning,
    bench_sat_solve,
    bench_sat_explain
);
criterion_main!(benches);
