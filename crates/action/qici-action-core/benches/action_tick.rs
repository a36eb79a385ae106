use criterion::{black_box, criterion_group, criterion_main, Criterion};
use qici_action_core::{
    property_ids, Action, ActionManager, Condition, Config, MemoryHost, NodeId, PropertyRegistry,
};

const OBJECTS: usize = 64;

fn build_action(reg: &PropertyRegistry, cfg: &Config, target: &str, looping: bool) -> Action {
    let mut a = Action::new(target, cfg);
    a.set_loop(looping);
    a.add_property(reg, "", property_ids::POSITION).ok();
    a.add_property(reg, "", property_ids::ALPHA).ok();
    a.add_property(reg, "", property_ids::VISIBLE).ok();
    for (i, t) in [0.0, 15.0, 30.0, 45.0, 60.0].into_iter().enumerate() {
        let v = i as f64;
        a.add_key("", property_ids::POSITION, "x", t, v * 10.0).ok();
        a.add_key("", property_ids::POSITION, "y", t, -v).ok();
        a.add_key("", property_ids::ALPHA, "alpha", t, v / 4.0).ok();
        a.add_key("", property_ids::VISIBLE, "visible", t, i % 2 == 0).ok();
    }
    a.set_target(Some(target.to_string()));
    a
}

fn bench_action_tick(c: &mut Criterion) {
    let reg = PropertyRegistry::builtin();
    let cfg = Config::default();
    let mut host = MemoryHost::new();
    let mut actions: Vec<Action> = (0..OBJECTS)
        .map(|i| {
            let name = format!("obj{i}");
            host.add_object(name.clone());
            build_action(&reg, &cfg, &name, true)
        })
        .collect();
    for a in &mut actions {
        a.play_action(&mut host, None, true);
    }

    c.bench_function("action_tick_64_objects", |b| {
        b.iter(|| {
            host.advance(16.0);
            for a in &mut actions {
                black_box(a.update(&mut host, None, false, false, false));
            }
            host.writes.clear();
        })
    });
}

fn bench_manager_tick(c: &mut Criterion) {
    let reg = PropertyRegistry::builtin();
    let cfg = Config::default();
    let mut host = MemoryHost::new();
    host.add_object("hero");
    let mut m = ActionManager::new("hero", &cfg);
    // a ring of eight steps so the token never reaches Exit
    let ids: Vec<_> = (0..8)
        .map(|i| m.add_action(build_action(&reg, &cfg, &format!("step{i}"), false)))
        .collect();
    m.add_transition(NodeId::Entry, ids[0].into(), Condition::Finish).ok();
    for (i, id) in ids.iter().enumerate() {
        let next = ids[(i + 1) % ids.len()];
        m.add_transition((*id).into(), next.into(), Condition::Finish).ok();
    }
    m.play_action(&mut host, Some("hero".into()), true).ok();

    c.bench_function("manager_tick_chain", |b| {
        b.iter(|| {
            host.advance(16.0);
            black_box(m.update(&mut host, None));
            host.writes.clear();
        })
    });
}

criterion_group!(benches, bench_action_tick, bench_manager_tick);
criterion_main!(benches);
