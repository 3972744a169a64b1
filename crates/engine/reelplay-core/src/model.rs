//! Canonical timeline data model exchanged with the host.
//!
//! Field names follow the host's camelCase JSON. Unknown fields on
//! [`TimelineData`] are kept in `extra` and written back untouched.

use serde::{Deserialize, Serialize};

use crate::props::PropertyBag;

/// Kind of scene element. Determines how the raster path draws it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Shape,
    Text,
    Image,
    Group,
    Audio,
    Camera,
    #[serde(other)]
    Unknown,
}

impl ElementType {
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Shape => "shape",
            Self::Text => "text",
            Self::Image => "image",
            Self::Group => "group",
            Self::Audio => "audio",
            Self::Camera => "camera",
            Self::Unknown => "unknown",
        }
    }
}

/// A visual or functional element of the scene.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationElement {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ElementType,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub initial_props: PropertyBag,
}

impl AnimationElement {
    pub fn new(id: impl Into<String>, kind: ElementType, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            name: name.into(),
            initial_props: PropertyBag::new(),
        }
    }

    pub fn with_props(mut self, props: PropertyBag) -> Self {
        self.initial_props = props;
        self
    }
}

/// A time-stamped target for one or more properties.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    /// Seconds from the start of the timeline.
    pub time: f64,
    #[serde(default)]
    pub properties: PropertyBag,
    /// Easing of the transition arriving at this keyframe.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub easing: Option<String>,
}

/// Keyframes animating a single element. Keyframes are expected sorted by time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationSequence {
    pub element_id: String,
    #[serde(default)]
    pub keyframes: Vec<Keyframe>,
}

/// The master timeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimelineData {
    /// Total duration in seconds.
    pub duration: f64,
    #[serde(default)]
    pub sequences: Vec<AnimationSequence>,
    #[serde(default)]
    pub version: i64,
    /// Extension data (markers, scroll triggers, ...). Preserved verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for TimelineData {
    fn default() -> Self {
        Self {
            duration: 0.0,
            sequences: Vec::new(),
            version: 1,
            extra: serde_json::Map::new(),
        }
    }
}

/// Keyframe closest to a given time within one sequence.
#[derive(Clone, Debug, PartialEq)]
pub struct NearestKeyframe<'a> {
    pub element_id: &'a str,
    pub keyframe_index: usize,
    pub keyframe: &'a Keyframe,
}

impl TimelineData {
    pub fn new(duration: f64) -> Self {
        Self {
            duration,
            ..Self::default()
        }
    }

    /// Duration usable for playback math (negative and NaN become 0).
    #[inline]
    pub fn effective_duration(&self) -> f64 {
        if self.duration.is_finite() && self.duration > 0.0 {
            self.duration
        } else {
            0.0
        }
    }

    /// For each sequence with keyframes, the keyframe nearest to `time`.
    /// The earliest keyframe wins a tie.
    pub fn nearest_keyframes(&self, time: f64) -> Vec<NearestKeyframe<'_>> {
        self.sequences
            .iter()
            .filter_map(|seq| {
                let (idx, kf) = seq.keyframes.iter().enumerate().fold(
                    None::<(usize, &Keyframe)>,
                    |best, (i, kf)| match best {
                        Some((_, b)) if (b.time - time).abs() <= (kf.time - time).abs() => best,
                        _ => Some((i, kf)),
                    },
                )?;
                Some(NearestKeyframe {
                    element_id: &seq.element_id,
                    keyframe_index: idx,
                    keyframe: kf,
                })
            })
            .collect()
    }
}

/// Project-level metadata edited by the user.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMetadata {
    pub name: String,
    pub created_at: String,
    pub last_modified: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

/// A complete saved project: elements plus their timeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectData {
    pub id: String,
    pub metadata: ProjectMetadata,
    pub elements: Vec<AnimationElement>,
    pub timeline: TimelineData,
    pub schema_version: u32,
}

impl ProjectData {
    pub fn from_json_str(s: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

/// Host-side rendering preferences.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderingOptions {
    /// `"dom"`, `"canvas2d"`, `"raster"` or `"webgl"`.
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_performance_monitor: Option<bool>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn timeline_extension_fields_round_trip() {
        let input = json!({
            "duration": 2.5,
            "version": 3,
            "sequences": [],
            "markers": [{"time": 1.0, "label": "beat"}],
            "scrollTrigger": {"trigger": "#hero", "start": "top 80%", "end": "bottom top"}
        });
        let timeline: TimelineData = serde_json::from_value(input.clone()).unwrap();
        assert_eq!(timeline.extra.len(), 2);
        assert_eq!(serde_json::to_value(&timeline).unwrap(), input);
    }

    #[test]
    fn element_types_parse_and_unknown_falls_back() {
        let el: AnimationElement = serde_json::from_value(json!({
            "id": "a", "type": "camera", "name": "Cam", "initialProps": {}
        }))
        .unwrap();
        assert_eq!(el.kind, ElementType::Camera);
        let odd: AnimationElement = serde_json::from_value(json!({
            "id": "b", "type": "particle", "name": "P", "initialProps": {"x": 1}
        }))
        .unwrap();
        assert_eq!(odd.kind, ElementType::Unknown);
    }

    #[test]
    fn nearest_keyframes_picks_closest_and_skips_empty() {
        let timeline: TimelineData = serde_json::from_value(json!({
            "duration": 4, "version": 1,
            "sequences": [
                {"elementId": "a", "keyframes": [
                    {"time": 0, "properties": {}},
                    {"time": 2, "properties": {}},
                    {"time": 4, "properties": {}}
                ]},
                {"elementId": "b", "keyframes": []}
            ]
        }))
        .unwrap();
        let near = timeline.nearest_keyframes(2.6);
        assert_eq!(near.len(), 1);
        assert_eq!(near[0].element_id, "a");
        assert_eq!(near[0].keyframe_index, 1);
        // tie between 0 and 2 goes to the earlier keyframe
        assert_eq!(timeline.nearest_keyframes(1.0)[0].keyframe_index, 0);
    }

    #[test]
    fn effective_duration_guards_bad_values() {
        assert_eq!(TimelineData::new(-1.0).effective_duration(), 0.0);
        assert_eq!(TimelineData::new(f64::NAN).effective_duration(), 0.0);
        assert_eq!(TimelineData::new(3.0).effective_duration(), 3.0);
    }
}
