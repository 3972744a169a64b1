//! Keyframe stops for one property of one element and their sampling.
//!
//! Model:
//! - Stops are ordered by time (seconds on the timeline clock).
//! - The segment [Si -> S(i+1)] uses the easing of S(i+1), i.e. the easing
//!   attached to the keyframe the transition arrives at.
//! - Numbers, measures and colours blend; every other value holds the left
//!   stop until the right stop's time is reached.

use serde_json::Value;

use crate::props::{PropValue, Rgba};
use crate::tween::easing::Easing;

/// One stop of a [`PropertyTrack`].
#[derive(Clone, Debug, PartialEq)]
pub struct Stop {
    pub time: f64,
    pub value: PropValue,
    /// Easing of the segment ending at this stop.
    pub easing: Easing,
}

/// Ordered stops for a single property.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PropertyTrack {
    stops: Vec<Stop>,
}

impl PropertyTrack {
    /// Build a track, seeding a stop at t=0 from `seed` when the first
    /// keyframe starts later than 0.
    pub fn with_seed(seed: Option<PropValue>, mut stops: Vec<Stop>) -> Self {
        stops.sort_by(|a, b| a.time.total_cmp(&b.time));
        if let Some(seed) = seed {
            let starts_late = stops.first().map(|s| s.time > 0.0).unwrap_or(true);
            if starts_late {
                stops.insert(
                    0,
                    Stop {
                        time: 0.0,
                        value: seed,
                        easing: Easing::Linear,
                    },
                );
            }
        }
        Self { stops }
    }

    #[inline]
    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    /// Value at time `t`. None only for an empty track.
    pub fn sample(&self, t: f64) -> Option<PropValue> {
        let n = self.stops.len();
        let first = self.stops.first()?;
        if n == 1 || t <= first.time {
            return Some(first.value.clone());
        }
        let last = &self.stops[n - 1];
        if t >= last.time {
            return Some(last.value.clone());
        }
        // index of the first stop strictly after t
        let right_idx = self.stops.partition_point(|s| s.time <= t);
        let left = &self.stops[right_idx - 1];
        let right = &self.stops[right_idx];
        let span = (right.time - left.time).max(f64::EPSILON);
        let local = ((t - left.time) / span).clamp(0.0, 1.0) as f32;
        let eased = right.easing.apply(local);
        Some(blend(&left.value, &right.value, eased))
    }
}

/// Blend two values at eased progress `e`. Non-blendable pairs hold `a`.
pub fn blend(a: &PropValue, b: &PropValue, e: f32) -> PropValue {
    if e <= 0.0 {
        return a.clone();
    }
    let t = e as f64;
    let lerp = |x: f64, y: f64| x + (y - x) * t;
    match (a, b) {
        (PropValue::Number(x), PropValue::Number(y)) => PropValue::Number(lerp(*x, *y)),
        (PropValue::Measure { value: x, .. }, PropValue::Measure { value: y, unit })
        | (PropValue::Number(x), PropValue::Measure { value: y, unit }) => PropValue::Measure {
            value: lerp(*x, *y),
            unit: unit.clone(),
        },
        (PropValue::Measure { value: x, unit }, PropValue::Number(y)) => PropValue::Measure {
            value: lerp(*x, *y),
            unit: unit.clone(),
        },
        (PropValue::Json(Value::Number(x)), PropValue::Json(Value::Number(y))) => {
            match (x.as_f64(), y.as_f64()) {
                (Some(x), Some(y)) => serde_json::Number::from_f64(lerp(x, y))
                    .map(|n| PropValue::Json(Value::Number(n)))
                    .unwrap_or_else(|| a.clone()),
                _ => a.clone(),
            }
        }
        _ => match (color_of(a), color_of(b)) {
            (Some(ca), Some(cb)) => PropValue::Color(ca.lerp(cb, e)),
            _ => a.clone(),
        },
    }
}

fn color_of(v: &PropValue) -> Option<Rgba> {
    match v {
        PropValue::Color(_) | PropValue::Json(Value::String(_)) => v.as_color(),
        _ => None,
    }
}
