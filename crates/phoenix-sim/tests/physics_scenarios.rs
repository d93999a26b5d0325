//! Solver behavior scenarios: collision response, sleep, broad-phase
//! soundness, range actions.

use phoenix_core::Name;
use phoenix_ecs::prelude::EntityId;
use phoenix_fixed::{Distance, Value, Vec2};
use phoenix_sim::features::ecs::EcsWorldBlock;
use phoenix_sim::prelude::*;

fn session() -> Session {
    let mut session = Session::new(SessionArgs {
        features: core_features(),
        num_workers: Some(2),
        on_post_world_update: None,
    });
    session.initialize();
    session.world_manager_mut().new_world(Name::new("main"));
    session
}

fn spawn(session: &Session, position: Vec2, velocity: Vec2) {
    session.queue_action(
        Action::new(Name::new("spawn_entity"))
            .with(0, Name::new("unit"))
            .with(1, position)
            .with(2, velocity),
    );
}

/// Read `(position, velocity, awake, sleep_timer)` of every entity, in
/// entity-id order.
fn body_states(session: &Session) -> Vec<(EntityId, Vec2, Vec2, bool, u8)> {
    let world = session.world_manager().primary_world().unwrap();
    let block = world.get_block::<EcsWorldBlock>().unwrap();
    let mut out = Vec::new();
    for entity in block.entities.iter() {
        let handle = entity.archetype;
        let t = block
            .manager
            .get_component::<TransformComponent>(handle)
            .unwrap();
        let b = block.manager.get_component::<BodyComponent>(handle).unwrap();
        out.push((
            entity.id,
            t.transform.position,
            b.linear_velocity,
            b.is_awake(),
            b.sleep_timer,
        ));
    }
    out.sort_by_key(|(id, ..)| *id);
    out
}

#[test]
fn approaching_circles_stop_approaching() {
    // Scenario 2: radius-1 bodies at (0,0) and (1.5,0) with closing
    // velocities. After one tick the contact is derived and solved; the
    // relative velocity along the contact normal must not be negative
    // (no further penetration growth).
    let mut s = session();
    spawn(&s, Vec2::from_int(0, 0), Vec2::from_int(1, 0));
    spawn(&s, Vec2::from_f64(1.5, 0.0), Vec2::from_int(-1, 0));
    s.step(60);

    let states = body_states(&s);
    assert_eq!(states.len(), 2);
    let (a, b) = (&states[0], &states[1]);
    // Normal points from the left body to the right body.
    let normal = (b.1 - a.1).normalized();
    let rel_vel = Vec2::dot(normal, b.2 - a.2);
    assert!(
        rel_vel >= Value::from_f64(-0.01),
        "bodies still approaching after solve: {rel_vel:?}"
    );
}

#[test]
fn solver_separates_overlapping_bodies_over_time() {
    let mut s = session();
    spawn(&s, Vec2::from_int(0, 0), Vec2::ZERO);
    spawn(&s, Vec2::from_f64(0.5, 0.0), Vec2::ZERO);
    for _ in 0..120 {
        s.step(60);
    }

    let states = body_states(&s);
    let gap = Vec2::distance(states[0].1, states[1].1);
    assert!(
        gap > Distance::from_f64(1.5),
        "overlap not separated: distance {gap:?}"
    );
}

#[test]
fn resting_body_falls_asleep() {
    // Scenario 3: a body at rest with zero force loses its awake flag and
    // keeps zero velocity.
    let mut s = session();
    spawn(&s, Vec2::from_int(0, 0), Vec2::ZERO);
    for _ in 0..60 {
        s.step(60);
    }

    let states = body_states(&s);
    assert_eq!(states.len(), 1);
    let (_, _, velocity, awake, _) = states[0];
    assert!(!awake, "resting body still awake after 60 ticks");
    assert_eq!(velocity, Vec2::ZERO);
}

#[test]
fn sleep_can_be_disabled_by_action() {
    let mut s = session();
    spawn(&s, Vec2::from_int(0, 0), Vec2::ZERO);
    s.queue_action(Action::new(Name::new("set_allow_sleep")).with(0, false));
    for _ in 0..60 {
        s.step(60);
    }
    let states = body_states(&s);
    assert!(states[0].3, "sleep disabled, body must stay awake");
}

#[test]
fn moving_body_integrates_position() {
    let mut s = session();
    spawn(&s, Vec2::from_int(0, 0), Vec2::from_int(60, 0));
    s.step(60);

    let states = body_states(&s);
    // 60 units/s over one 60 Hz step is one unit.
    assert!(Vec2::approx_eq(
        states[0].1,
        Vec2::from_int(1, 0),
        Distance::from_f64(0.01)
    ));
}

#[test]
fn broad_phase_is_a_superset_of_exact_overlaps() {
    // Scenario 6: for a populated world, the Morton range query never
    // misses an entity whose circle intersects the query circle.
    let mut s = session();
    // Deterministic pseudo-random scatter.
    let mut x: i64 = 0x12345;
    let mut next = || {
        x = x.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((x >> 33) % 200 - 100) as i32
    };
    for _ in 0..500 {
        spawn(&s, Vec2::from_int(next(), next()), Vec2::ZERO);
    }
    s.step(60);

    let center = Vec2::from_int(10, -5);
    let range = Distance::from_int(32);

    let world = s.world_manager().primary_world().unwrap();
    let reported = PhysicsFeature::query_entities_in_range(world, center, range);

    // Brute force ground truth.
    let mut expected = Vec::new();
    for (id, position, _, _, _) in body_states(&s) {
        if Vec2::distance(center, position) < range + Distance::ONE {
            expected.push(id);
        }
    }

    for id in &expected {
        assert!(
            reported.contains(id),
            "broad phase missed entity {id:?} (false negative)"
        );
    }
}

#[test]
fn release_entities_in_range_action() {
    let mut s = session();
    spawn(&s, Vec2::from_int(0, 0), Vec2::ZERO);
    spawn(&s, Vec2::from_int(50, 50), Vec2::ZERO);
    s.step(60);

    s.queue_action(
        Action::new(Name::new("release_entities_in_range"))
            .with(0, Vec2::from_int(0, 0))
            .with(1, Distance::from_int(10)),
    );
    s.step(60);

    let states = body_states(&s);
    assert_eq!(states.len(), 1);
    assert_eq!(states[0].1, Vec2::from_int(50, 50));
}

#[test]
fn push_entities_in_range_wakes_and_accelerates() {
    let mut s = session();
    spawn(&s, Vec2::from_int(3, 0), Vec2::ZERO);
    // Let it fall asleep first.
    for _ in 0..30 {
        s.step(60);
    }
    assert!(!body_states(&s)[0].3);

    s.queue_action(
        Action::new(Name::new("push_entities_in_range"))
            .with(0, Vec2::from_int(0, 0))
            .with(1, Distance::from_int(10))
            .with(2, Value::from_int(8)),
    );
    s.step(60);

    let states = body_states(&s);
    assert!(states[0].3, "pushed body must wake");
    assert!(
        states[0].2.length() > Distance::ZERO,
        "pushed body must gain velocity"
    );
}

#[test]
fn static_bodies_do_not_move() {
    let mut s = session();
    spawn(&s, Vec2::from_int(0, 0), Vec2::from_int(2, 0));
    s.step(60);

    // Flag the body static with stored velocity; it must stop integrating
    // velocity changes from contacts but still follows its own velocity
    // integration -- so zero it and pin it.
    {
        let world = s.world_manager_mut().primary_world_mut();
        let block = world.get_block_mut::<EcsWorldBlock>().unwrap();
        let entity = block.entities.iter().next().unwrap().id;
        let handle = block.entities.get(entity).unwrap().archetype;
        let body = block
            .manager
            .get_component_mut::<BodyComponent>(handle)
            .unwrap();
        body.flags |= phoenix_sim::features::body_flags::STATIC;
        body.linear_velocity = Vec2::ZERO;
    }
    spawn(&s, Vec2::from_f64(1.2, 0.0), Vec2::from_int(-1, 0));

    for _ in 0..30 {
        s.step(60);
    }
    let states = body_states(&s);
    // The static body's velocity never changed despite contacts.
    assert_eq!(states[0].2, Vec2::ZERO);
}
