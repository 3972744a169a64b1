//! Interpolation schedule built from a timeline, plus its playhead.

use hashbrown::HashMap;
use indexmap::IndexMap;

use crate::model::{AnimationElement, TimelineData};
use crate::props::{PropKey, PropertyBag};
use crate::tween::{Easing, PropertyTrack, Stop};

/// Tracks of one element, keyed by property.
#[derive(Clone, Debug, Default)]
pub struct ElementTracks {
    pub element_id: String,
    pub tracks: IndexMap<PropKey, PropertyTrack>,
}

/// Everything a backend needs to know "what value does property P of
/// element E have at time t".
#[derive(Clone, Debug)]
pub struct Schedule {
    elements: Vec<ElementTracks>,
    time: f64,
    duration: f64,
    time_scale: f64,
    active: bool,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            elements: Vec::new(),
            time: 0.0,
            duration: 0.0,
            time_scale: 1.0,
            active: false,
        }
    }
}

impl Schedule {
    /// Build tracks for every keyframe of every sequence.
    ///
    /// Sequences pointing at unknown elements and keyframes with non-finite
    /// times are skipped. Sequences for the same element are merged.
    pub fn build(
        timeline: &TimelineData,
        elements: &[AnimationElement],
        default_easing: Easing,
    ) -> Self {
        let by_id: HashMap<&str, &AnimationElement> =
            elements.iter().map(|e| (e.id.as_str(), e)).collect();

        let mut stops: IndexMap<String, IndexMap<PropKey, Vec<Stop>>> = IndexMap::new();
        for seq in &timeline.sequences {
            if !by_id.contains_key(seq.element_id.as_str()) {
                log::warn!(
                    "sequence references unknown element '{}', skipping",
                    seq.element_id
                );
                continue;
            }
            let per_element = stops.entry(seq.element_id.clone()).or_default();
            for kf in &seq.keyframes {
                if !kf.time.is_finite() {
                    log::warn!(
                        "keyframe with non-finite time on '{}', skipping",
                        seq.element_id
                    );
                    continue;
                }
                let easing = Easing::parse_or(kf.easing.as_deref(), default_easing);
                for (key, value) in kf.properties.iter() {
                    per_element.entry(key.clone()).or_default().push(Stop {
                        time: kf.time,
                        value: value.clone(),
                        easing,
                    });
                }
            }
        }

        let elements = stops
            .into_iter()
            .filter_map(|(element_id, props)| {
                let element = by_id.get(element_id.as_str())?;
                let tracks = props
                    .into_iter()
                    .map(|(key, stops)| {
                        let seed = element.initial_props.get(&key).cloned();
                        (key, PropertyTrack::with_seed(seed, stops))
                    })
                    .collect();
                Some(ElementTracks { element_id, tracks })
            })
            .collect();

        Self {
            elements,
            duration: timeline.effective_duration(),
            ..Self::default()
        }
    }

    #[inline]
    pub fn time(&self) -> f64 {
        self.time
    }

    #[inline]
    pub fn duration(&self) -> f64 {
        self.duration
    }

    #[inline]
    pub fn time_scale(&self) -> f64 {
        self.time_scale
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn set_time_scale(&mut self, scale: f64) {
        self.time_scale = scale;
    }

    /// Jump the playhead, clamped to [0, duration].
    pub fn seek(&mut self, time: f64) {
        self.time = time.clamp(0.0, self.duration);
    }

    /// Move the playhead by `dt * time_scale` while active.
    /// Returns true when this step reached the end.
    pub fn advance(&mut self, dt: f64) -> bool {
        if !self.active {
            return false;
        }
        self.time += dt * self.time_scale;
        if self.time >= self.duration {
            self.time = self.duration;
            self.active = false;
            return true;
        }
        false
    }

    pub fn element_tracks(&self) -> &[ElementTracks] {
        &self.elements
    }

    /// Write every track's value at the current time into `states`.
    pub fn apply(&self, states: &mut HashMap<String, PropertyBag>) {
        for el in &self.elements {
            let Some(bag) = states.get_mut(&el.element_id) else {
                continue;
            };
            for (key, track) in &el.tracks {
                if let Some(value) = track.sample(self.time) {
                    bag.set(key.clone(), value);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ElementType;
    use approx::assert_abs_diff_eq;
    use serde_json::json;

    fn fade_timeline() -> (TimelineData, Vec<AnimationElement>) {
        let timeline: TimelineData = serde_json::from_value(json!({
            "duration": 2, "version": 1,
            "sequences": [
                {"elementId": "box", "keyframes": [
                    {"time": 0, "properties": {"opacity": 0}},
                    {"time": 2, "properties": {"opacity": 1}, "easing": "linear"}
                ]},
                {"elementId": "ghost", "keyframes": [
                    {"time": 0, "properties": {"x": 5}}
                ]}
            ]
        }))
        .unwrap();
        let el = AnimationElement::new("box", ElementType::Shape, "Box")
            .with_props(PropertyBag::from_json(json!({"x": 10, "opacity": 1})));
        (timeline, vec![el])
    }

    fn seeded(elements: &[AnimationElement]) -> HashMap<String, PropertyBag> {
        elements
            .iter()
            .map(|e| (e.id.clone(), e.initial_props.clone()))
            .collect()
    }

    #[test]
    fn skips_dangling_sequences() {
        let (timeline, elements) = fade_timeline();
        let schedule = Schedule::build(&timeline, &elements, Easing::default());
        assert_eq!(schedule.element_tracks().len(), 1);
        assert_eq!(schedule.element_tracks()[0].element_id, "box");
    }

    #[test]
    fn apply_writes_sampled_values_and_keeps_untracked_props() {
        let (timeline, elements) = fade_timeline();
        let mut schedule = Schedule::build(&timeline, &elements, Easing::default());
        let mut states = seeded(&elements);
        schedule.seek(1.0);
        schedule.apply(&mut states);
        let bag = &states["box"];
        assert_abs_diff_eq!(bag.number(&PropKey::Opacity).unwrap(), 0.5);
        assert_eq!(bag.number(&PropKey::X), Some(10.0));
    }

    #[test]
    fn advance_respects_scale_and_completes() {
        let (timeline, elements) = fade_timeline();
        let mut schedule = Schedule::build(&timeline, &elements, Easing::default());
        assert!(!schedule.advance(1.0));
        assert_eq!(schedule.time(), 0.0);

        schedule.set_active(true);
        schedule.set_time_scale(2.0);
        assert!(!schedule.advance(0.5));
        assert_abs_diff_eq!(schedule.time(), 1.0);
        assert!(schedule.advance(1.0));
        assert_eq!(schedule.time(), 2.0);
        assert!(!schedule.is_active());
    }

    #[test]
    fn seek_clamps() {
        let (timeline, elements) = fade_timeline();
        let mut schedule = Schedule::build(&timeline, &elements, Easing::default());
        schedule.seek(-1.0);
        assert_eq!(schedule.time(), 0.0);
        schedule.seek(7.0);
        assert_eq!(schedule.time(), 2.0);
    }

    #[test]
    fn merges_sequences_for_one_element() {
        let timeline: TimelineData = serde_json::from_value(json!({
            "duration": 3, "version": 1,
            "sequences": [
                {"elementId": "a", "keyframes": [{"time": 2, "properties": {"x": 20}}]},
                {"elementId": "a", "keyframes": [{"time": 1, "properties": {"x": 10}}]}
            ]
        }))
        .unwrap();
        let el = AnimationElement::new("a", ElementType::Shape, "A");
        let schedule = Schedule::build(&timeline, &[el], Easing::Linear);
        let track = &schedule.element_tracks()[0].tracks[&PropKey::X];
        let times: Vec<f64> = track.stops().iter().map(|s| s.time).collect();
        assert_eq!(times, vec![1.0, 2.0]);
    }
}
