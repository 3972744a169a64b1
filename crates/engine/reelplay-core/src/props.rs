//! Typed property bag for animatable element properties.
//!
//! The wire format is an open JSON object (`{ "x": 10, "fill": "#f00", ... }`).
//! Known keys are parsed into typed values so the tween and draw paths can
//! match on them; unknown keys and non-tweenable values are kept as-is so a
//! bag serializes back to an equivalent object.

use std::fmt;

use indexmap::IndexMap;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// RGBA colour with components in [0, 1].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba::new(0.0, 0.0, 0.0, 0.0);
    pub const BLACK: Rgba = Rgba::new(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Rgba = Rgba::new(1.0, 1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self::new(
            r as f32 / 255.0,
            g as f32 / 255.0,
            b as f32 / 255.0,
            a as f32 / 255.0,
        )
    }

    pub fn to_rgba8(self) -> [u8; 4] {
        let q = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }

    /// Component-wise linear blend.
    pub fn lerp(self, other: Rgba, t: f32) -> Rgba {
        let l = |a: f32, b: f32| a + (b - a) * t;
        Rgba::new(
            l(self.r, other.r),
            l(self.g, other.g),
            l(self.b, other.b),
            l(self.a, other.a),
        )
    }

    /// Parse a CSS colour: `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`, `rgb()`,
    /// `rgba()` or a handful of named colours.
    pub fn parse(input: &str) -> Option<Rgba> {
        let s = input.trim();
        if let Some(hex) = s.strip_prefix('#') {
            return parse_hex(hex);
        }
        let lower = s.to_ascii_lowercase();
        if let Some(body) = lower
            .strip_prefix("rgba(")
            .or_else(|| lower.strip_prefix("rgb("))
        {
            let body = body.strip_suffix(')')?;
            let parts: Vec<&str> = body.split(',').map(str::trim).collect();
            if parts.len() != 3 && parts.len() != 4 {
                return None;
            }
            let channel = |p: &str| p.parse::<f32>().ok().map(|v| (v / 255.0).clamp(0.0, 1.0));
            let a = match parts.get(3) {
                Some(p) => p.parse::<f32>().ok()?.clamp(0.0, 1.0),
                None => 1.0,
            };
            return Some(Rgba::new(
                channel(parts[0])?,
                channel(parts[1])?,
                channel(parts[2])?,
                a,
            ));
        }
        named_color(&lower)
    }

    /// CSS form: `#rrggbb` when opaque, `rgba(r, g, b, a)` otherwise.
    pub fn to_css(self) -> String {
        let [r, g, b, _] = self.to_rgba8();
        if self.a >= 1.0 {
            format!("#{r:02x}{g:02x}{b:02x}")
        } else {
            let a = (self.a.clamp(0.0, 1.0) * 1000.0).round() / 1000.0;
            format!("rgba({r}, {g}, {b}, {a})")
        }
    }
}

fn parse_hex(hex: &str) -> Option<Rgba> {
    let nibble = |c: u8| (c as char).to_digit(16).map(|d| d as u8);
    let bytes = hex.as_bytes();
    match bytes.len() {
        3 | 4 => {
            let mut out = [255u8; 4];
            for (i, c) in bytes.iter().enumerate() {
                let n = nibble(*c)?;
                out[i] = n * 17;
            }
            Some(Rgba::from_rgba8(out[0], out[1], out[2], out[3]))
        }
        6 | 8 => {
            let mut out = [255u8; 4];
            for i in 0..bytes.len() / 2 {
                let hi = nibble(bytes[2 * i])?;
                let lo = nibble(bytes[2 * i + 1])?;
                out[i] = hi * 16 + lo;
            }
            Some(Rgba::from_rgba8(out[0], out[1], out[2], out[3]))
        }
        _ => None,
    }
}

fn named_color(name: &str) -> Option<Rgba> {
    let rgb = match name {
        "transparent" => return Some(Rgba::TRANSPARENT),
        "black" => (0, 0, 0),
        "white" => (255, 255, 255),
        "red" => (255, 0, 0),
        "green" => (0, 128, 0),
        "lime" => (0, 255, 0),
        "blue" => (0, 0, 255),
        "yellow" => (255, 255, 0),
        "orange" => (255, 165, 0),
        "purple" => (128, 0, 128),
        "cyan" | "aqua" => (0, 255, 255),
        "magenta" | "fuchsia" => (255, 0, 255),
        "gray" | "grey" => (128, 128, 128),
        _ => return None,
    };
    Some(Rgba::from_rgba8(rgb.0, rgb.1, rgb.2, 255))
}

/// Known animatable properties, plus an escape hatch for everything else.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PropKey {
    X,
    Y,
    Width,
    Height,
    Opacity,
    Rotation,
    Scale,
    BorderRadius,
    Fill,
    BackgroundColor,
    Color,
    Text,
    Font,
    Src,
    Other(String),
}

impl PropKey {
    /// Wire name of this property
    #[inline]
    pub fn name(&self) -> &str {
        match self {
            Self::X => "x",
            Self::Y => "y",
            Self::Width => "width",
            Self::Height => "height",
            Self::Opacity => "opacity",
            Self::Rotation => "rotation",
            Self::Scale => "scale",
            Self::BorderRadius => "borderRadius",
            Self::Fill => "fill",
            Self::BackgroundColor => "backgroundColor",
            Self::Color => "color",
            Self::Text => "text",
            Self::Font => "font",
            Self::Src => "src",
            Self::Other(name) => name,
        }
    }

    #[inline]
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::X
                | Self::Y
                | Self::Width
                | Self::Height
                | Self::Opacity
                | Self::Rotation
                | Self::Scale
                | Self::BorderRadius
        )
    }

    #[inline]
    pub fn is_color(&self) -> bool {
        matches!(self, Self::Fill | Self::BackgroundColor | Self::Color)
    }
}

impl From<&str> for PropKey {
    fn from(s: &str) -> Self {
        match s {
            "x" => Self::X,
            "y" => Self::Y,
            "width" => Self::Width,
            "height" => Self::Height,
            "opacity" => Self::Opacity,
            "rotation" => Self::Rotation,
            "scale" => Self::Scale,
            "borderRadius" => Self::BorderRadius,
            "fill" => Self::Fill,
            "backgroundColor" => Self::BackgroundColor,
            "color" => Self::Color,
            "text" => Self::Text,
            "font" => Self::Font,
            "src" => Self::Src,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for PropKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single property value.
#[derive(Clone, Debug, PartialEq)]
pub enum PropValue {
    Number(f64),
    /// Number with a CSS unit suffix, e.g. `"5px"`.
    Measure {
        value: f64,
        unit: String,
    },
    Color(Rgba),
    Text(String),
    Bool(bool),
    /// Values of unknown keys, kept exactly as they arrived.
    Json(serde_json::Value),
}

impl PropValue {
    /// Parse a wire value, using the key to decide how strings are read.
    /// Unknown keys are never reinterpreted.
    pub fn from_json(key: &PropKey, value: serde_json::Value) -> Self {
        if let PropKey::Other(_) = key {
            return PropValue::Json(value);
        }
        match value {
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(v) => PropValue::Number(v),
                None => PropValue::Json(serde_json::Value::Number(n)),
            },
            serde_json::Value::Bool(b) => PropValue::Bool(b),
            serde_json::Value::String(s) => Self::from_str_for(key, s),
            other => PropValue::Json(other),
        }
    }

    fn from_str_for(key: &PropKey, s: String) -> Self {
        if key.is_color() {
            return match Rgba::parse(&s) {
                Some(c) => PropValue::Color(c),
                None => PropValue::Text(s),
            };
        }
        if key.is_numeric() {
            if let Some(v) = parse_measure(&s) {
                return v;
            }
        }
        PropValue::Text(s)
    }

    /// Numeric view (numbers and measures).
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropValue::Number(v) => Some(*v),
            PropValue::Measure { value, .. } => Some(*value),
            PropValue::Json(serde_json::Value::Number(n)) => n.as_f64(),
            _ => None,
        }
    }

    #[inline]
    pub fn as_f32(&self) -> Option<f32> {
        self.as_f64().map(|v| v as f32)
    }

    #[inline]
    pub fn as_color(&self) -> Option<Rgba> {
        match self {
            PropValue::Color(c) => Some(*c),
            PropValue::Text(s) | PropValue::Json(serde_json::Value::String(s)) => Rgba::parse(s),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Text(s) | PropValue::Json(serde_json::Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// String form used by node styling and text content.
    pub fn to_css(&self) -> String {
        match self {
            PropValue::Number(v) => format_number(*v),
            PropValue::Measure { value, unit } => format!("{}{}", format_number(*value), unit),
            PropValue::Color(c) => c.to_css(),
            PropValue::Text(s) => s.clone(),
            PropValue::Bool(b) => b.to_string(),
            PropValue::Json(serde_json::Value::String(s)) => s.clone(),
            PropValue::Json(v) => v.to_string(),
        }
    }
}

/// Largest magnitude below which every integer is exact in an `f64`.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < MAX_SAFE_INTEGER {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

/// `"12"`, `"-4.5px"`, `"90deg"` → numeric values. Returns None for plain words.
fn parse_measure(s: &str) -> Option<PropValue> {
    let t = s.trim();
    let split = t
        .char_indices()
        .find(|(i, c)| !(c.is_ascii_digit() || *c == '.' || ((*c == '-' || *c == '+') && *i == 0)))
        .map(|(i, _)| i)
        .unwrap_or(t.len());
    let (num, unit) = t.split_at(split);
    let value: f64 = num.parse().ok()?;
    if unit.is_empty() {
        Some(PropValue::Number(value))
    } else if unit.chars().all(|c| c.is_ascii_alphabetic() || c == '%') {
        Some(PropValue::Measure {
            value,
            unit: unit.to_string(),
        })
    } else {
        None
    }
}

impl Serialize for PropValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PropValue::Number(v) => {
                if v.fract() == 0.0 && v.abs() < MAX_SAFE_INTEGER {
                    serializer.serialize_i64(*v as i64)
                } else {
                    serializer.serialize_f64(*v)
                }
            }
            PropValue::Bool(b) => serializer.serialize_bool(*b),
            PropValue::Json(v) => v.serialize(serializer),
            other => serializer.serialize_str(&other.to_css()),
        }
    }
}

/// Ordered property map. Serializes as a plain JSON object.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PropertyBag {
    values: IndexMap<PropKey, PropValue>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a bag from a JSON object; non-object input yields an empty bag.
    pub fn from_json(value: serde_json::Value) -> Self {
        let mut bag = Self::new();
        if let serde_json::Value::Object(map) = value {
            for (k, v) in map {
                let key = PropKey::from(k.as_str());
                let parsed = PropValue::from_json(&key, v);
                bag.values.insert(key, parsed);
            }
        }
        bag
    }

    #[inline]
    pub fn get(&self, key: &PropKey) -> Option<&PropValue> {
        self.values.get(key)
    }

    #[inline]
    pub fn set(&mut self, key: PropKey, value: PropValue) {
        self.values.insert(key, value);
    }

    #[inline]
    pub fn remove(&mut self, key: &PropKey) -> Option<PropValue> {
        self.values.shift_remove(key)
    }

    #[inline]
    pub fn contains(&self, key: &PropKey) -> bool {
        self.values.contains_key(key)
    }

    #[inline]
    pub fn number(&self, key: &PropKey) -> Option<f32> {
        self.values.get(key).and_then(PropValue::as_f32)
    }

    #[inline]
    pub fn color(&self, key: &PropKey) -> Option<Rgba> {
        self.values.get(key).and_then(PropValue::as_color)
    }

    #[inline]
    pub fn text(&self, key: &PropKey) -> Option<&str> {
        self.values.get(key).and_then(PropValue::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PropKey, &PropValue)> {
        self.values.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl FromIterator<(PropKey, PropValue)> for PropertyBag {
    fn from_iter<I: IntoIterator<Item = (PropKey, PropValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl Serialize for PropertyBag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (k, v) in &self.values {
            map.serialize_entry(k.name(), v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for PropertyBag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct BagVisitor;

        impl<'de> Visitor<'de> for BagVisitor {
            type Value = PropertyBag;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a property object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<PropertyBag, A::Error> {
                let mut bag = PropertyBag::new();
                while let Some((k, v)) = access.next_entry::<String, serde_json::Value>()? {
                    let key = PropKey::from(k.as_str());
                    let value = PropValue::from_json(&key, v);
                    bag.values.insert(key, value);
                }
                Ok(bag)
            }
        }

        deserializer.deserialize_map(BagVisitor)
    }
}
