use approx::assert_relative_eq;
use qici_action_core::{
    property_ids, ActionError, AnimatedProp, ColorLinearProp, CurveProp, CurveType, KeyProp,
    MemoryHost, Playhead, Prop, PropertyRegistry, TargetHandle, Value,
};
use serde_json::json;

fn setup() -> (PropertyRegistry, MemoryHost, TargetHandle) {
    let mut host = MemoryHost::new();
    host.add_object("hero");
    (PropertyRegistry::builtin(), host, "hero".to_string())
}

fn at(elapsed: f64, is_begin: bool) -> Playhead {
    Playhead {
        elapsed,
        is_begin,
        ..Playhead::default()
    }
}

/// it should visit every crossed step key in order on a single jump
#[test]
fn key_prop_applies_all_crossed_keys_in_order() {
    let (reg, mut host, hero) = setup();
    let mut prop = KeyProp::new(reg.get(property_ids::TEXT).unwrap().clone());
    prop.add_key("text", 10.0, "B".into()).unwrap();
    prop.add_key("text", 0.0, "A".into()).unwrap();
    prop.add_key("text", 20.0, "C".into()).unwrap();

    prop.update(&mut host, &hero, at(25.0, true));
    assert_eq!(
        host.writes_to("hero", "text"),
        vec![Value::from("A"), Value::from("B"), Value::from("C")]
    );
    assert_eq!(host.attr("hero", "text"), Some(&Value::from("C")));

    // nothing new crossed
    prop.update(&mut host, &hero, at(26.0, false));
    assert_eq!(host.writes_to("hero", "text").len(), 3);

    // time moved backward: only the latest key at or before it
    prop.update(&mut host, &hero, at(12.0, false));
    assert_eq!(host.writes_to("hero", "text").last(), Some(&Value::from("B")));
    assert_eq!(host.writes_to("hero", "text").len(), 4);
}

#[test]
fn key_prop_reapplies_in_editor_only_when_forced() {
    let (reg, mut host, hero) = setup();
    let editor = |elapsed| Playhead {
        elapsed,
        in_editor: true,
        ..Playhead::default()
    };

    // Visible is a force-update property
    let mut visible = KeyProp::new(reg.get(property_ids::VISIBLE).unwrap().clone());
    visible.add_key("visible", 0.0, true.into()).unwrap();
    visible.update(&mut host, &hero, at(5.0, true));
    visible.update(&mut host, &hero, editor(5.0));
    assert_eq!(host.writes_to("hero", "visible").len(), 2);

    // Animation is not, unless the caller forces it
    let mut anim = KeyProp::new(reg.get(property_ids::ANIMATION).unwrap().clone());
    anim.add_key("animation", 0.0, "run".into()).unwrap();
    anim.update(&mut host, &hero, at(5.0, true));
    anim.update(&mut host, &hero, editor(5.0));
    assert_eq!(host.writes_to("hero", "animation").len(), 1);
    anim.update(
        &mut host,
        &hero,
        Playhead {
            force_update: true,
            ..editor(5.0)
        },
    );
    assert_eq!(host.writes_to("hero", "animation").len(), 2);
}

/// it should capture the origin of a relative curve from the target at playback start
#[test]
fn relative_curve_captures_from_on_begin() {
    let (reg, mut host, hero) = setup();
    host.set_attr("hero", "x", 5.0);
    let mut prop = CurveProp::new(reg.get(property_ids::POSITION).unwrap().clone());
    prop.add_key("x", 0.0, 2.0.into()).unwrap();
    prop.add_key("x", 10.0, 4.0.into()).unwrap();
    prop.set_curve_type("x", CurveType::Relative).unwrap();

    prop.update(&mut host, &hero, at(0.0, true));
    assert_eq!(prop.attrib("x").unwrap().captured_from(), Some(5.0));
    assert_relative_eq!(host.number("hero", "x").unwrap(), 7.0, epsilon = 1e-9);

    // external writes do not move the captured origin mid-playback
    host.set_attr("hero", "x", 100.0);
    prop.update(&mut host, &hero, at(10.0, false));
    assert_relative_eq!(host.number("hero", "x").unwrap(), 9.0, epsilon = 1e-9);

    // a new begin recaptures
    prop.update(&mut host, &hero, at(0.0, true));
    assert_eq!(prop.attrib("x").unwrap().captured_from(), Some(9.0));
    assert_relative_eq!(host.number("hero", "x").unwrap(), 11.0, epsilon = 1e-9);

    // untouched attributes are never written
    assert!(host.writes_to("hero", "y").is_empty());
}

#[test]
fn tween_curves_map_between_from_and_to() {
    let (reg, mut host, hero) = setup();
    host.set_attr("hero", "x", 5.0);
    let mut prop = CurveProp::new(reg.get(property_ids::POSITION).unwrap().clone());
    prop.add_key("x", 0.0, 0.0.into()).unwrap();
    prop.add_key("x", 10.0, 1.0.into()).unwrap();

    prop.set_curve_type("x", CurveType::TweenAbsolute).unwrap();
    prop.set_range("x", Some(10.0), Some(20.0)).unwrap();
    prop.update(&mut host, &hero, at(5.0, true));
    assert_relative_eq!(host.number("hero", "x").unwrap(), 15.0, epsilon = 1e-9);

    host.set_attr("hero", "x", 5.0);
    prop.set_curve_type("x", CurveType::TweenRelative).unwrap();
    prop.set_range("x", None, Some(3.0)).unwrap();
    prop.update(&mut host, &hero, at(10.0, true));
    assert_relative_eq!(host.number("hero", "x").unwrap(), 8.0, epsilon = 1e-9);
}

#[test]
fn curve_output_is_clamped_to_attribute_range() {
    let (reg, mut host, hero) = setup();
    let mut prop = CurveProp::new(reg.get(property_ids::ALPHA).unwrap().clone());
    prop.add_key("alpha", 0.0, 2.5.into()).unwrap();
    prop.update(&mut host, &hero, at(0.0, true));
    assert_eq!(host.number("hero", "alpha"), Some(1.0));
}

#[test]
fn color_linear_blends_channels() {
    let (reg, mut host, hero) = setup();
    let mut prop = ColorLinearProp::new(reg.get(property_ids::COLOR_TINT).unwrap().clone());
    prop.add_key("colorTint", 0.0, Value::Color([1.0, 0.0, 0.0, 1.0])).unwrap();
    prop.add_key("colorTint", 10.0, Value::Color([0.0, 0.0, 1.0, 1.0])).unwrap();
    prop.update(&mut host, &hero, at(5.0, true));
    assert_eq!(host.attr("hero", "colorTint"), Some(&Value::Color([0.5, 0.0, 0.5, 1.0])));
    assert_eq!(prop.duration(), 10.0);
}

#[test]
fn editing_api() {
    let (reg, _, _) = setup();
    let mut prop = Prop::new(reg.get(property_ids::SCALE).unwrap());
    prop.add_key("scaleX", 0.0, 1.0.into()).unwrap();
    prop.add_key("scaleY", 5.0, 2.0.into()).unwrap();
    prop.add_key("scaleX", 8.0, 3.0.into()).unwrap();
    // same time overwrites
    assert_eq!(prop.add_key("scaleX", 8.0, 4.0.into()).unwrap(), 1);

    assert_eq!(prop.key_times(None), vec![0.0, 5.0, 8.0]);
    assert_eq!(prop.key_times(Some("scaleX")), vec![0.0, 8.0]);
    assert_eq!(prop.duration(), 8.0);
    assert!(prop.is_key("scaleY", 5.0));
    assert!(!prop.is_key("scaleY", 4.0));
    assert_eq!(prop.value_by_index("scaleX", 1), Some(Value::Number(4.0)));
    assert_eq!(prop.value_at("scaleX", 0.0), Some(Value::Number(1.0)));

    prop.set_value("scaleY", 9.0, 6.0.into()).unwrap();
    assert_eq!(prop.duration(), 9.0);
    assert!(prop.delete_key("scaleY", 9.0));
    assert!(!prop.delete_key("scaleY", 9.0));
    assert_eq!(prop.duration(), 8.0);

    assert!(matches!(
        prop.add_key("scaleZ", 0.0, 1.0.into()),
        Err(ActionError::UnknownAttribute { .. })
    ));
    assert!(matches!(
        prop.add_key("scaleX", 0.0, "big".into()),
        Err(ActionError::ValueTypeMismatch { .. })
    ));

    let mut text = Prop::new(reg.get(property_ids::TEXT).unwrap());
    assert!(matches!(
        text.add_key("text", 0.0, true.into()),
        Err(ActionError::ValueTypeMismatch { .. })
    ));
}

#[test]
fn prop_json_round_trip() {
    let (reg, _, _) = setup();
    let info = reg.get(property_ids::POSITION).unwrap();
    let src = json!({
        "x": { "curve": [[0, 0, 0, 0], [10, 5, 0, 0], [0, 0]], "curveType": 3, "from": 1, "to": 2 },
        "y": [[0, 1, 0, 0], [1, 0]],
        "z": [[0, 1, 0, 0]]
    });
    let prop = Prop::from_json(info, &src).expect("position prop");
    assert_eq!(prop.duration(), 10.0);
    let curve = prop.as_curve().unwrap();
    assert_eq!(curve.attrib("x").unwrap().curve_type, CurveType::TweenAbsolute);
    assert_eq!(curve.attrib("x").unwrap().from, Some(1.0));
    assert_eq!(curve.attrib("y").unwrap().curve_type, CurveType::Absolute);

    let back = Prop::from_json(info, &prop.to_json()).expect("round trip");
    assert_eq!(back, prop);

    let tex = reg.get(property_ids::TEXTURE).unwrap();
    let src = json!({ "texture": [[0.0, "hero", "idle"], [4.0, "hero", null]] });
    let prop = Prop::from_json(tex, &src).expect("texture prop");
    assert_eq!(prop.to_json(), src);
    assert_eq!(prop.dependencies(), vec!["hero".to_string()]);
}
