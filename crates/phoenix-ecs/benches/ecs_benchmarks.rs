use criterion::{criterion_group, criterion_main, Criterion};

use phoenix_core::Name;
use phoenix_ecs::prelude::*;

#[derive(Debug, Clone, Default)]
struct Position {
    x: i64,
    y: i64,
}

#[derive(Debug, Clone, Default)]
struct Velocity {
    dx: i64,
    dy: i64,
}

impl Component for Position {
    fn component_name() -> Name {
        Name::hashed("position")
    }
}

impl Component for Velocity {
    fn component_name() -> Name {
        Name::hashed("velocity")
    }
}

fn setup(entities: u32) -> ArchetypeManager {
    let mut manager = ArchetypeManager::new(ManagerConfig {
        max_components: 8,
        max_archetypes: 8,
        list_capacity: entities.max(1024) as usize,
    });
    manager.register_component::<Position>();
    manager.register_component::<Velocity>();
    manager
        .register_archetype(
            Name::hashed("mover"),
            &[Name::hashed("position"), Name::hashed("velocity")],
        )
        .unwrap();
    for i in 1..=entities {
        let handle = manager.acquire(EntityId(i), Name::hashed("mover"));
        manager.get_component_mut::<Velocity>(handle).unwrap().dx = i as i64;
    }
    manager
}

fn bench_query_iteration(c: &mut Criterion) {
    let mut manager = setup(10_000);
    let filter = filter_for::<(&mut Position, &Velocity)>();

    c.bench_function("query_iter_10k", |b| {
        b.iter(|| {
            manager.for_each::<(&mut Position, &Velocity)>(&filter, |_, (pos, vel)| {
                pos.x += vel.dx;
                pos.y += vel.dy;
            });
        })
    });
}

fn bench_acquire_release(c: &mut Criterion) {
    c.bench_function("acquire_release_1k", |b| {
        b.iter(|| {
            let mut manager = setup(0);
            let mut handles = Vec::with_capacity(1000);
            for i in 1..=1000 {
                handles.push(manager.acquire(EntityId(i), Name::hashed("mover")));
            }
            for handle in handles {
                manager.release(handle);
            }
        })
    });
}

criterion_group!(benches, bench_query_iteration, bench_acquire_release);
criterion_main!(benches);
