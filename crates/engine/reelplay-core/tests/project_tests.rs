use approx::assert_abs_diff_eq;
use reelplay_core::{
    templates, BackendKind, Engine, EngineConfig, EngineError, PropKey, ProjectData,
    RenderingOptions, Stage,
};
use reelplay_test_fixtures::projects;

/// it should load a saved project and project its text and styles onto nodes
#[test]
fn title_card_project_on_live_nodes() {
    let project: ProjectData = projects::load("title-card").unwrap();
    assert_eq!(project.metadata.tags.as_deref(), Some(&["intro".to_string()][..]));

    let stage = Stage::new();
    let engine = Engine::new(Some(stage.clone()), BackendKind::Dom);
    engine.load_project(&project).unwrap();

    let title = stage.node("title").unwrap();
    assert_eq!(title.text.as_deref(), Some("Reelplay"));
    assert_eq!(title.style("color"), Some("#ffcc00"));
    assert_eq!(stage.node("panel").unwrap().style("width"), Some("0px"));

    engine.seek(1.5);
    assert_eq!(stage.node("panel").unwrap().style("width"), Some("120px"));
}

/// it should parse the raw project JSON through the model helper
#[test]
fn project_from_json_str() {
    let raw = projects::json("title-card").unwrap();
    let project = ProjectData::from_json_str(&raw).unwrap();
    assert_eq!(project.schema_version, 1);
    assert_eq!(project.elements.len(), 2);
    assert!(matches!(
        ProjectData::from_json_str("{ not json"),
        Err(EngineError::Serialization { .. })
    ));
}

/// it should play the built-in fade-in template on the raster backend
#[test]
fn fade_in_template_on_raster() {
    let project = templates::simple_fade_in();
    let stage = Stage::with_size(200, 200);
    let engine = Engine::new(Some(stage.clone()), BackendKind::Raster);
    engine.load_project(&project).unwrap();

    engine.seek(0.5);
    let opacity = engine
        .element_state("fade-target-1")
        .unwrap()
        .number(&PropKey::Opacity)
        .unwrap();
    assert_abs_diff_eq!(opacity, 0.5, epsilon = 1e-6);

    engine.play();
    engine.tick(1.0);
    let canvas = stage.canvas().unwrap();
    let pixmap = canvas.borrow();
    // centre of the 80x80 box at (50, 50), fully opaque at the end
    let px = pixmap.pixel(90, 90).unwrap().demultiply();
    assert_eq!(px.alpha(), 255);
    for (got, want) in [(px.red(), 0x34u8), (px.green(), 0x98), (px.blue(), 0xdb)] {
        assert!(got.abs_diff(want) <= 1, "channel {got:#x} vs {want:#x}");
    }
}

/// it should fold host rendering options into the engine config
#[test]
fn rendering_options_select_backend() {
    let options: RenderingOptions = serde_json::from_value(serde_json::json!({
        "target": "canvas2d",
        "backgroundColor": "#000000",
        "showPerformanceMonitor": true
    }))
    .unwrap();
    let config = EngineConfig::default().with_rendering_options(&options).unwrap();
    assert_eq!(config.default_backend, BackendKind::Raster);

    let stage = Stage::with_size(10, 10);
    let engine = Engine::with_config(Some(stage.clone()), config.default_backend, config);
    let project = templates::simple_fade_in();
    engine.load_project(&project).unwrap();
    let canvas = stage.canvas().unwrap();
    let px = canvas.borrow().pixel(1, 1).unwrap();
    assert_eq!(px.alpha(), 255);

    let webgl: RenderingOptions =
        serde_json::from_value(serde_json::json!({ "target": "webgl" })).unwrap();
    assert!(matches!(
        EngineConfig::default().with_rendering_options(&webgl),
        Err(EngineError::UnsupportedBackend { .. })
    ));
}

/// it should find the keyframe nearest to a scrub position in every sequence
#[test]
fn nearest_keyframes_for_scrubbing() {
    let project: ProjectData = projects::load("title-card").unwrap();
    let near = project.timeline.nearest_keyframes(1.0);
    assert_eq!(near.len(), 1);
    assert_eq!(near[0].element_id, "panel");
    assert_eq!(near[0].keyframe_index, 1);
}
