use approx::assert_relative_eq;
use qici_action_core::{
    library_from_json, property_ids, restore, restore_action, ActionError, Condition, Config,
    MemoryHost, MemoryScript, NodeId, PropertyRegistry, Timeline, TimelineBundle, TransitionId,
    Trigger, Value,
};
use serde_json::json;

fn door_host() -> MemoryHost {
    let mut host = MemoryHost::new();
    host.add_object("door");
    host.add_object("door-hinge");
    host.add_child("door", "hinge", "door-hinge");
    host.set_attr("door-hinge", "rotation", 45.0);
    host
}

fn tick(tl: &mut Timeline, host: &mut MemoryHost) -> Option<Trigger> {
    host.advance(100.0);
    tl.update(host, None)
}

#[test]
fn fixture_manifest_lists_everything() {
    let mut actions = qici_test_fixtures::actions::keys();
    actions.sort();
    assert_eq!(actions, vec!["door-open".to_string()]);
    let mut libs = qici_test_fixtures::libraries::keys();
    libs.sort();
    assert_eq!(libs, vec!["cyclic".to_string(), "door-sequence".to_string()]);
    assert!(qici_test_fixtures::libraries::json("cyclic").unwrap().contains("loop-a"));
}

/// it should restore properties and events from an action bundle, skipping unknown properties
#[test]
fn restores_action_bundle() {
    let bundle: TimelineBundle = qici_test_fixtures::actions::load("door-open").unwrap();
    let TimelineBundle::Action(bundle) = bundle else {
        panic!("door-open should be an action bundle");
    };
    let reg = PropertyRegistry::builtin();
    let action = restore_action(&bundle, &reg, &Config::default());

    assert_eq!(action.name, "open");
    assert_eq!(action.uuid(), "act-open");
    assert_eq!(action.samples(), 10);
    assert_eq!(action.target_ref(), Some("door"));
    assert!(action.target().is_none());
    assert_eq!(action.properties().count(), 3);
    assert!(action.property("bad", 999).is_none());
    assert!(action.property("hinge", property_ids::ROTATION).is_some());

    let funcs: Vec<&str> = action.events().iter().map(|e| e.func.as_str()).collect();
    assert_eq!(funcs, vec!["onHalf", "onOpened"]);
    assert_eq!(action.events()[1].para, json!("door"));
    assert_eq!(action.duration(), 10.0);
}

#[test]
fn restored_action_plays_against_resolved_target() {
    let reg = PropertyRegistry::builtin();
    let mut host = door_host();
    let raw = format!("[{}]", qici_test_fixtures::actions::json("door-open").unwrap());
    let lib = library_from_json(&raw).unwrap();

    let mut tl = restore("act-open", &lib, &reg, &Config::default(), Some(&host)).unwrap();
    assert_eq!(tl.as_action().unwrap().target().map(String::as_str), Some("door"));

    assert_eq!(tl.play(&mut host, None, true).unwrap(), None);
    assert_eq!(host.number("door", "x"), Some(0.0));
    assert_eq!(host.attr("door", "visible"), Some(&Value::Bool(true)));
    assert_relative_eq!(host.number("door-hinge", "rotation").unwrap(), 45.0, epsilon = 1e-9);

    for _ in 0..10 {
        assert_eq!(tick(&mut tl, &mut host), None);
    }
    assert_relative_eq!(host.number("door", "x").unwrap(), 100.0, epsilon = 1e-9);
    assert_relative_eq!(host.number("door-hinge", "rotation").unwrap(), 135.0, epsilon = 1e-9);
    assert_eq!(tick(&mut tl, &mut host), Some(Trigger::Finish));
}

/// it should rebuild nested managers and keep going when a dependency is missing
#[test]
fn restores_manager_library() {
    let reg = PropertyRegistry::builtin();
    let lib = library_from_json(&qici_test_fixtures::libraries::json("door-sequence").unwrap())
        .unwrap();
    let root = qici_test_fixtures::libraries::root("door-sequence").unwrap();
    let mut host = door_host();
    host.attach_script(
        "door",
        MemoryScript::new("DoorScript").with_fn("onSwitch", |_| Value::Null),
    );

    let mut tl = restore(&root, &lib, &reg, &Config::default(), Some(&host)).unwrap();
    let m = tl.as_manager().unwrap();
    assert_eq!(m.name, "door");
    assert_eq!(m.target().map(String::as_str), Some("door"));
    assert_eq!(m.scripts, json!([{ "name": "DoorScript" }]));
    // act-missing is unresolved and transition 9 points at an unknown node
    assert_eq!(m.actions().count(), 3);
    assert_eq!(m.transitions().count(), 4);
    assert_eq!(m.transitions_from(NodeId::Entry).len(), 1);
    let glow = m
        .actions()
        .find(|(_, tl)| tl.uuid() == "act-glow")
        .and_then(|(_, tl)| tl.as_action())
        .unwrap();
    assert!(glow.events().is_empty());
    assert_eq!(glow.properties().count(), 1);

    tl.play(&mut host, None, true).unwrap();
    assert_eq!(tick(&mut tl, &mut host), None);
    assert_eq!(tick(&mut tl, &mut host), None);
    assert_eq!(tick(&mut tl, &mut host), None);
    assert_eq!(host.calls.len(), 1);
    assert_eq!(host.calls[0].args, vec![json!("fast")]);
    let active: Vec<&str> = {
        let m = tl.as_manager().unwrap();
        m.active_actions()
            .iter()
            .filter_map(|id| m.action(*id))
            .map(|t| t.uuid())
            .collect()
    };
    assert_eq!(active, vec!["mgr-inner"]);

    assert_eq!(tick(&mut tl, &mut host), None);
    assert_eq!(tick(&mut tl, &mut host), Some(Trigger::Finish));
    assert!(!tl.is_running());
}

#[test]
fn cyclic_references_are_cut() {
    let reg = PropertyRegistry::builtin();
    let lib = library_from_json(&qici_test_fixtures::libraries::json("cyclic").unwrap()).unwrap();
    let tl = restore("loop-a", &lib, &reg, &Config::default(), None).unwrap();
    let a = tl.as_manager().unwrap();
    assert_eq!(a.uuid(), "loop-a");
    assert_eq!(a.actions().count(), 2);
    let b = a
        .actions()
        .find_map(|(_, tl)| tl.as_manager())
        .unwrap();
    assert_eq!(b.uuid(), "loop-b");
    assert_eq!(b.actions().count(), 0);
}

#[test]
fn unknown_root_and_bad_documents() {
    let reg = PropertyRegistry::builtin();
    let lib = library_from_json("[]").unwrap();
    assert!(matches!(
        restore("nope", &lib, &reg, &Config::default(), None),
        Err(ActionError::UnresolvedDependency { .. })
    ));
    assert!(matches!(
        library_from_json("42"),
        Err(ActionError::Serialization { .. })
    ));
    assert!(library_from_json("[{").is_err());
    assert!(library_from_json(r#"[{"class": "Mystery"}]"#).unwrap().is_empty());
}

/// it should keep loading the rest of a library when single rows are malformed
#[test]
fn malformed_rows_are_skipped() {
    let raw = json!([
        {
            "class": "ActionManager",
            "uuid": "mgr",
            "name": "gate",
            "actionList": { "1": "act-a", "2": "act-b" },
            "transitionList": {
                "3": { "fromAction": 0, "toAction": 1, "condition": "FinishTrigger" },
                "4": { "fromAction": 1, "toAction": 2, "condition": "open" },
                "5": { "fromAction": 2, "toAction": -1, "condition": { "type": 42 } },
                "6": { "fromAction": "one", "toAction": 2, "condition": { "type": "finish" } },
                "7": { "fromAction": 2, "toAction": -1, "condition": { "type": "finish" } }
            }
        },
        {
            "class": "Action",
            "uuid": "act-a",
            "samples": "fast",
            "eventList": 7,
            "propertyList": { "": { "1": { "x": [[0, 0, 0, 0], [2, 20, 0, 0]] } } }
        },
        { "class": "Action", "uuid": "act-b", "samples": 10 },
        { "class": "Mystery", "uuid": "???" }
    ])
    .to_string();
    let reg = PropertyRegistry::builtin();
    let lib = library_from_json(&raw).unwrap();
    assert_eq!(lib.len(), 3);

    let tl = restore("mgr", &lib, &reg, &Config::default(), None).unwrap();
    let m = tl.as_manager().unwrap();
    assert_eq!(m.actions().count(), 2);
    assert_eq!(m.transitions().count(), 3);
    assert_eq!(m.transition(TransitionId(3)).unwrap().condition, Condition::Finish);
    assert_eq!(
        m.transition(TransitionId(4)).unwrap().condition,
        Condition::Event("open".into())
    );
    assert!(m.transition(TransitionId(5)).is_none());
    assert!(m.transition(TransitionId(6)).is_none());
    assert!(m.transition(TransitionId(7)).unwrap().is_exit());

    let a = m
        .actions()
        .find(|(_, tl)| tl.uuid() == "act-a")
        .and_then(|(_, tl)| tl.as_action())
        .unwrap();
    assert_eq!(a.samples(), Config::default().default_samples);
    assert!(a.events().is_empty());
    assert_eq!(a.properties().count(), 1);
}

/// it should export a restored graph into a library that restores to the same bundles
#[test]
fn export_round_trip() {
    let reg = PropertyRegistry::builtin();
    let cfg = Config::default();
    let lib = library_from_json(&qici_test_fixtures::libraries::json("door-sequence").unwrap())
        .unwrap();
    let tl = restore("mgr-door", &lib, &reg, &cfg, None).unwrap();

    let mut first = hashbrown::HashMap::new();
    tl.as_manager().unwrap().export(&mut first);
    assert_eq!(first.len(), 5);
    assert!(!first.contains_key("act-missing"));

    let again = restore("mgr-door", &first, &reg, &cfg, None).unwrap();
    let mut second = hashbrown::HashMap::new();
    again.as_manager().unwrap().export(&mut second);
    assert_eq!(first, second);

    let TimelineBundle::Manager(door) = &second["mgr-door"] else {
        panic!("mgr-door should be a manager bundle");
    };
    assert_eq!(door.transition_list["6"].func_name.as_deref(), Some("onSwitch"));
    assert_eq!(door.action_list["3"], "mgr-inner");
}
