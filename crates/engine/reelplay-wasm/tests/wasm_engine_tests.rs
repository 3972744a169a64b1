#![cfg(target_arch = "wasm32")]
use js_sys::{Function, Reflect};
use reelplay_wasm::{abi_version, WasmEngine};
use serde_json::json;
use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

fn js(value: serde_json::Value) -> JsValue {
    let ser = serde_wasm_bindgen::Serializer::json_compatible();
    serde::Serialize::serialize(&value, &ser).unwrap()
}

fn fade_in() -> (JsValue, JsValue) {
    let timeline = json!({
        "duration": 2, "version": 1,
        "sequences": [{"elementId": "box", "keyframes": [
            {"time": 0, "properties": {"opacity": 0}},
            {"time": 2, "properties": {"opacity": 1}, "easing": "linear"}
        ]}]
    });
    let elements = json!([{
        "id": "box", "type": "shape", "name": "Box",
        "initialProps": {"x": 0, "y": 0, "width": 10, "height": 10, "fill": "#ff0000"}
    }]);
    (js(timeline), js(elements))
}

fn get(obj: &JsValue, key: &str) -> JsValue {
    Reflect::get(obj, &JsValue::from_str(key)).unwrap()
}

#[wasm_bindgen_test]
fn abi_is_1() {
    assert_eq!(abi_version(), 1);
}

/// it should reject an unknown backend name at construction
#[wasm_bindgen_test]
fn unknown_backend_errors() {
    assert!(WasmEngine::new(10, 10, Some("webgl".into()), JsValue::UNDEFINED).is_err());
}

/// it should load, seek and expose playback state as a plain object
#[wasm_bindgen_test]
fn load_and_seek() {
    let eng = WasmEngine::new(20, 20, Some("dom".into()), JsValue::NULL).unwrap();
    let (timeline, elements) = fade_in();
    eng.load_timeline(timeline, elements).unwrap();
    eng.seek(1.0);
    let state = eng.get_playback_state().unwrap();
    assert_eq!(get(&state, "currentTime").as_f64(), Some(1.0));
    assert_eq!(get(&state, "progress").as_f64(), Some(0.5));

    let snapshot = eng.node_snapshot().unwrap();
    let nodes = get(&snapshot, "nodes");
    assert_eq!(js_sys::Array::from(&nodes).length(), 1);
}

/// it should error cleanly on malformed timeline input
#[wasm_bindgen_test]
fn malformed_timeline_errors() {
    let eng = WasmEngine::new(20, 20, None, JsValue::NULL).unwrap();
    let res = eng.load_timeline(JsValue::from_str("nope"), js(json!([])));
    assert!(res.is_err());
}

/// it should isolate callbacks that throw and keep calling the others
#[wasm_bindgen_test]
fn throwing_callback_is_isolated() {
    let eng = WasmEngine::new(20, 20, Some("raster".into()), JsValue::NULL).unwrap();
    let (timeline, elements) = fade_in();
    eng.load_timeline(timeline, elements).unwrap();

    let thrower = Function::new_with_args("state", "throw new Error('boom');");
    let counter = js_sys::Object::new();
    Reflect::set(&counter, &"n".into(), &JsValue::from_f64(0.0)).unwrap();
    let bump = Function::new_with_args("state", "this.n = this.n + 1;").bind(&counter);
    eng.on("update", thrower).unwrap();
    eng.on("update", bump.clone()).unwrap();
    eng.seek(0.5);
    assert_eq!(get(&counter, "n").as_f64(), Some(1.0));

    assert!(eng.off("update", bump.clone()));
    assert!(!eng.off("update", bump));
    eng.seek(1.0);
    assert_eq!(get(&counter, "n").as_f64(), Some(1.0));
}

/// it should expose raster pixels and swap backends
#[wasm_bindgen_test]
fn frame_readback_and_swap() {
    let eng = WasmEngine::new(16, 16, Some("canvas2d".into()), JsValue::NULL).unwrap();
    let (timeline, elements) = fade_in();
    eng.load_timeline(timeline, elements).unwrap();
    eng.seek(2.0);
    let rgba = eng.frame_rgba();
    assert_eq!(rgba.len(), 16 * 16 * 4);
    assert_eq!(&rgba[0..4], &[255, 0, 0, 255]);

    eng.set_rendering_target("dom").unwrap();
    assert!(eng.frame_rgba().is_empty());
    assert_eq!(eng.active_backend().as_deref(), Some("dom"));

    eng.destroy();
    eng.destroy();
    assert!(eng.get_playback_state().unwrap().is_null());
}
