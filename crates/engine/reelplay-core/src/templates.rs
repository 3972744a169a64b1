//! Built-in starter projects.

use serde_json::json;

use crate::model::{
    AnimationElement, AnimationSequence, ElementType, Keyframe, ProjectData, ProjectMetadata,
    TimelineData,
};
use crate::props::PropertyBag;

/// One 80x80 box fading from opacity 0 to 1 over one second.
pub fn simple_fade_in() -> ProjectData {
    let element = AnimationElement::new("fade-target-1", ElementType::Shape, "Fading Box")
        .with_props(PropertyBag::from_json(json!({
            "x": 50,
            "y": 50,
            "width": 80,
            "height": 80,
            "backgroundColor": "#3498db",
            "opacity": 0,
            "borderRadius": "5px",
        })));

    let mut timeline = TimelineData::new(1.0);
    timeline.sequences.push(AnimationSequence {
        element_id: element.id.clone(),
        keyframes: vec![
            Keyframe {
                time: 0.0,
                properties: PropertyBag::from_json(json!({ "opacity": 0 })),
                easing: None,
            },
            Keyframe {
                time: 1.0,
                properties: PropertyBag::from_json(json!({ "opacity": 1 })),
                easing: Some("power1.inOut".to_string()),
            },
        ],
    });

    ProjectData {
        id: "template-simple-fade-in".to_string(),
        metadata: ProjectMetadata {
            name: "Simple Fade In".to_string(),
            created_at: String::new(),
            last_modified: String::new(),
            author: None,
            description: Some("A minimal fade-in animation.".to_string()),
            tags: Some(vec!["fade".to_string(), "starter".to_string()]),
        },
        elements: vec![element],
        timeline,
        schema_version: 1,
    }
}
