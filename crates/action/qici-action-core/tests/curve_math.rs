use approx::assert_relative_eq;
use qici_action_core::{BezierCurve, Keyframe, TangentMode, WrapMode};
use serde_json::json;

fn ramp() -> BezierCurve {
    let mut c = BezierCurve::new();
    c.add_key(0.0, 0.0, None, None);
    c.add_key(1.0, 1.0, None, None);
    c
}

/// it should hit every key value exactly at the key time
#[test]
fn evaluates_to_key_values_at_key_times() {
    let mut c = BezierCurve::new();
    c.add_key(0.0, 3.0, None, None);
    c.add_key(12.0, -4.0, Some(2.0), Some(-1.5));
    c.add_key(20.0, 8.0, None, None);
    c.add_key(31.0, 8.0, Some(0.0), Some(f64::INFINITY));
    c.add_key(40.0, 1.0, None, None);
    for k in c.keys() {
        assert_relative_eq!(c.evaluate(k.time), k.value, epsilon = 1e-9);
    }
}

#[test]
fn wrap_modes_remap_time_outside_the_key_range() {
    let mut c = ramp();
    c.post_wrap_mode = WrapMode::Loop;
    assert_relative_eq!(c.evaluate(1.25), c.evaluate(0.25), epsilon = 1e-12);

    c.post_wrap_mode = WrapMode::PingPong;
    assert_relative_eq!(c.evaluate(1.25), c.evaluate(0.75), epsilon = 1e-12);
    assert_relative_eq!(c.evaluate(2.25), c.evaluate(0.25), epsilon = 1e-12);

    c.post_wrap_mode = WrapMode::Clamp;
    assert_eq!(c.evaluate(5.0), 1.0);
    assert_eq!(c.evaluate(-5.0), 0.0);

    c.pre_wrap_mode = WrapMode::Loop;
    assert_relative_eq!(c.evaluate(-0.25), c.evaluate(0.75), epsilon = 1e-12);
}

#[test]
fn looping_evaluation_ignores_configured_wrap_modes() {
    let c = ramp();
    assert_relative_eq!(c.evaluate_looping(3.5), c.evaluate(0.5), epsilon = 1e-12);
}

#[test]
fn degenerate_curves() {
    let empty = BezierCurve::new();
    assert!(empty.evaluate(0.0).is_nan());
    assert!(empty.evaluate(100.0).is_nan());
    assert!(empty.evaluate_derivative(0.0).is_nan());

    let mut single = BezierCurve::new();
    single.add_key(4.0, 7.5, None, None);
    for t in [-10.0, 0.0, 4.0, 1e6] {
        assert_eq!(single.evaluate(t), 7.5);
    }
    assert_eq!(single.evaluate_derivative(4.0), 0.0);
}

#[test]
fn numerical_blowup_falls_back_to_segment_start() {
    let mut c = BezierCurve::new();
    c.add_key(0.0, 2.0, Some(0.0), Some(1e12));
    c.add_key(1.0, 5.0, Some(0.0), Some(0.0));
    assert_eq!(c.evaluate(0.5), 2.0);
    assert_eq!(c.evaluate(1.0), 5.0);
}

#[test]
fn derivative_is_not_wrapped() {
    let c = ramp();
    assert_relative_eq!(c.evaluate_derivative(0.5), 1.0, epsilon = 1e-9);
    assert_relative_eq!(c.evaluate_derivative(1.0), 1.0, epsilon = 1e-9);
    assert!(c.evaluate_derivative(1.5).is_nan());
    assert!(c.evaluate_derivative(-0.5).is_nan());
}

#[test]
fn tangent_policies() {
    let mut c = BezierCurve::new();
    c.add_key(0.0, 0.0, None, None);
    c.add_key(1.0, 1.0, None, None);
    c.add_key(2.0, 0.0, None, None);

    // auto: average of the two secants
    assert_eq!(c.key(1).unwrap().in_tangent, 0.0);
    assert_eq!(c.key(1).unwrap().mode, TangentMode::Auto);

    c.make_keyframe_linear(1);
    let k = c.key(1).unwrap();
    assert_eq!((k.in_tangent, k.out_tangent), (1.0, -1.0));
    assert_eq!(k.mode, TangentMode::Linear);

    c.make_keyframe_smooth(1);
    let k = c.key(1).unwrap();
    assert_eq!(k.in_tangent, k.out_tangent);

    c.make_keyframe_flat(0);
    assert_relative_eq!(c.evaluate_derivative(0.0), 0.0, epsilon = 1e-12);
}

#[test]
fn auto_neighbours_follow_inserted_keys() {
    let mut c = ramp();
    assert_eq!(c.key(0).unwrap().out_tangent, 1.0);
    c.add_key(0.5, 4.0, None, None);
    // first key now points at the new middle key
    assert_eq!(c.key(0).unwrap().out_tangent, 8.0);
    c.remove_key(1);
    assert_eq!(c.key(0).unwrap().out_tangent, 1.0);
}

/// it should restore keys, tangents (including infinite ones) and wrap modes
#[test]
fn json_round_trip() {
    let mut c = BezierCurve::new();
    c.add_key(0.0, 1.0, Some(0.0), Some(f64::INFINITY));
    c.add_key(10.0, 4.0, Some(f64::NEG_INFINITY), Some(2.5));
    c.add_key(20.0, -2.0, None, None);
    c.pre_wrap_mode = WrapMode::PingPong;
    c.post_wrap_mode = WrapMode::Loop;

    let j = c.to_json();
    assert_eq!(j[0][3], json!("Infinity"));
    assert_eq!(j[1][2], json!("-Infinity"));
    assert_eq!(j[3], json!([2, 1]));

    let back = BezierCurve::from_json(&j).expect("curve json");
    assert_eq!(back, c);
}

#[test]
fn four_element_rows_and_bad_rows() {
    let j = json!([[0, 0, 0, 1], "junk", [1, "x", 0, 0], [2, 2, 1, 1], [0, 1]]);
    let c = BezierCurve::from_json(&j).expect("curve json");
    assert_eq!(c.len(), 2);
    assert_eq!(c.key(0).unwrap().mode, TangentMode::FreeSmooth);
    assert_eq!(c.post_wrap_mode, WrapMode::Loop);
    assert!(BezierCurve::from_json(&json!({"not": "a curve"})).is_err());

    let k = Keyframe::with_tangents(0.0, 0.0, 0.0, f64::INFINITY);
    assert!(k.is_stepped());
}
