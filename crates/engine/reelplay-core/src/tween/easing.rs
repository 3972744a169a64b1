//! Easing curves addressed by identifier.
//!
//! Identifiers follow the common tweening vocabulary: `none`/`linear`,
//! `power2.out`, `back.inOut(2)`, `steps(4)`, CSS keywords and
//! `cubic-bezier(x1, y1, x2, y2)`. A bare family name (`"sine"`) means `.out`.

use std::f32::consts::PI;

/// Direction of an eased curve.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EaseDir {
    In,
    Out,
    InOut,
}

/// Curve families.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EaseFamily {
    /// Polynomial of the given degree (1 = quad-like power1, ...).
    Power(u8),
    Sine,
    Expo,
    Circ,
    Back(f32),
    Elastic,
    Bounce,
}

/// A parsed easing function.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Easing {
    Linear,
    Curve(EaseFamily, EaseDir),
    Steps(u32),
    /// Cubic-bezier timing with control points (x1, y1, x2, y2).
    Bezier([f32; 4]),
}

impl Default for Easing {
    /// `power1.out`, the usual tweening default.
    fn default() -> Self {
        Easing::Curve(EaseFamily::Power(1), EaseDir::Out)
    }
}

const DEFAULT_BACK: f32 = 1.70158;

impl Easing {
    /// Parse an identifier. Returns None when it is not recognised.
    pub fn parse(id: &str) -> Option<Easing> {
        let s = id.trim();
        let lower = s.to_ascii_lowercase();
        match lower.as_str() {
            "none" | "linear" | "power0" | "power0.in" | "power0.out" | "power0.inout" => {
                return Some(Easing::Linear)
            }
            "ease" => return Some(Easing::Bezier([0.25, 0.1, 0.25, 1.0])),
            "ease-in" => return Some(Easing::Bezier([0.42, 0.0, 1.0, 1.0])),
            "ease-out" => return Some(Easing::Bezier([0.0, 0.0, 0.58, 1.0])),
            "ease-in-out" => return Some(Easing::Bezier([0.42, 0.0, 0.58, 1.0])),
            _ => {}
        }
        if let Some(args) = call_args(&lower, "cubic-bezier") {
            if args.len() != 4 {
                return None;
            }
            let x1 = args[0].clamp(0.0, 1.0);
            let x2 = args[2].clamp(0.0, 1.0);
            return Some(Easing::Bezier([x1, args[1], x2, args[3]]));
        }
        if let Some(args) = call_args(&lower, "steps") {
            let n = args.first().copied().unwrap_or(1.0).max(1.0) as u32;
            return Some(Easing::Steps(n));
        }

        // family[.dir][(param)]
        let (head, param) = match lower.find('(') {
            Some(open) => {
                let inner = lower[open + 1..].strip_suffix(')')?;
                (&lower[..open], inner.trim().parse::<f32>().ok())
            }
            None => (lower.as_str(), None),
        };
        let (family, dir) = match head.split_once('.') {
            Some((f, d)) => (f, parse_dir(d)?),
            None => (head, EaseDir::Out),
        };
        let family = match family {
            "power1" | "quad" => EaseFamily::Power(1),
            "power2" | "cubic" => EaseFamily::Power(2),
            "power3" | "quart" => EaseFamily::Power(3),
            "power4" | "quint" | "strong" => EaseFamily::Power(4),
            "sine" => EaseFamily::Sine,
            "expo" => EaseFamily::Expo,
            "circ" => EaseFamily::Circ,
            "back" => EaseFamily::Back(param.unwrap_or(DEFAULT_BACK)),
            "elastic" => EaseFamily::Elastic,
            "bounce" => EaseFamily::Bounce,
            _ => return None,
        };
        Some(Easing::Curve(family, dir))
    }

    /// Parse, falling back to `fallback` for unknown identifiers.
    pub fn parse_or(id: Option<&str>, fallback: Easing) -> Easing {
        match id {
            None => fallback,
            Some(raw) => match Easing::parse(raw) {
                Some(e) => e,
                None => {
                    log::warn!("unknown easing '{raw}', using default");
                    fallback
                }
            },
        }
    }

    /// Map linear progress `t` in [0, 1] to eased progress.
    pub fn apply(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match *self {
            Easing::Linear => t,
            Easing::Steps(n) => {
                if t >= 1.0 {
                    1.0
                } else {
                    (t * n as f32).floor() / n as f32
                }
            }
            Easing::Bezier(c) => bezier_ease_t(t, c[0], c[1], c[2], c[3]),
            Easing::Curve(family, dir) => match dir {
                EaseDir::In => ease_in(family, t),
                EaseDir::Out => 1.0 - ease_in(family, 1.0 - t),
                EaseDir::InOut => {
                    if t < 0.5 {
                        ease_in(family, t * 2.0) / 2.0
                    } else {
                        1.0 - ease_in(family, (1.0 - t) * 2.0) / 2.0
                    }
                }
            },
        }
    }
}

fn parse_dir(d: &str) -> Option<EaseDir> {
    match d {
        "in" => Some(EaseDir::In),
        "out" => Some(EaseDir::Out),
        "inout" => Some(EaseDir::InOut),
        _ => None,
    }
}

fn call_args(s: &str, name: &str) -> Option<Vec<f32>> {
    let rest = s.strip_prefix(name)?.trim_start();
    let inner = rest.strip_prefix('(')?.strip_suffix(')')?;
    inner
        .split(',')
        .map(|p| p.trim().parse::<f32>().ok())
        .collect()
}

/// The "in" form of every family; out and inOut are derived by reflection.
fn ease_in(family: EaseFamily, t: f32) -> f32 {
    match family {
        EaseFamily::Power(p) => t.powi(p as i32 + 1),
        EaseFamily::Sine => 1.0 - (t * PI / 2.0).cos(),
        EaseFamily::Expo => {
            if t <= 0.0 {
                0.0
            } else {
                2f32.powf(10.0 * (t - 1.0))
            }
        }
        EaseFamily::Circ => 1.0 - (1.0 - t * t).max(0.0).sqrt(),
        EaseFamily::Back(s) => t * t * ((s + 1.0) * t - s),
        EaseFamily::Elastic => {
            if t <= 0.0 || t >= 1.0 {
                t
            } else {
                let p = 0.3;
                -(2f32.powf(10.0 * (t - 1.0))) * (((t - 1.0) - p / 4.0) * (2.0 * PI) / p).sin()
            }
        }
        EaseFamily::Bounce => 1.0 - bounce_out(1.0 - t),
    }
}

fn bounce_out(t: f32) -> f32 {
    const N: f32 = 7.5625;
    const D: f32 = 2.75;
    if t < 1.0 / D {
        N * t * t
    } else if t < 2.0 / D {
        let t = t - 1.5 / D;
        N * t * t + 0.75
    } else if t < 2.5 / D {
        let t = t - 2.25 / D;
        N * t * t + 0.9375
    } else {
        let t = t - 2.625 / D;
        N * t * t + 0.984375
    }
}

/// Cubic Bezier basis function
#[inline]
fn cubic_bezier(p0: f32, p1: f32, p2: f32, p3: f32, t: f32) -> f32 {
    let u = 1.0 - t;
    u * u * u * p0 + 3.0 * u * u * t * p1 + 3.0 * u * t * t * p2 + t * t * t * p3
}

/// Given control points (x1, y1, x2, y2) and an input t in [0,1],
/// compute the eased y by inverting the x bezier via binary search.
fn bezier_ease_t(t: f32, x1: f32, y1: f32, x2: f32, y2: f32) -> f32 {
    // Bezier(0,0,1,1) is exactly linear
    if x1 == 0.0 && y1 == 0.0 && x2 == 1.0 && y2 == 1.0 {
        return t;
    }
    let mut lo = 0.0f32;
    let mut hi = 1.0f32;
    let mut mid = t;
    for _ in 0..24 {
        let x = cubic_bezier(0.0, x1, x2, 1.0, mid);
        if (x - t).abs() < 1e-6 {
            break;
        }
        if x < t {
            lo = mid;
        } else {
            hi = mid;
        }
        mid = 0.5 * (lo + hi);
    }
    cubic_bezier(0.0, y1, y2, 1.0, mid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn parses_common_identifiers() {
        assert_eq!(Easing::parse("none"), Some(Easing::Linear));
        assert_eq!(Easing::parse("linear"), Some(Easing::Linear));
        assert_eq!(
            Easing::parse("power2.inOut"),
            Some(Easing::Curve(EaseFamily::Power(2), EaseDir::InOut))
        );
        assert_eq!(
            Easing::parse("sine"),
            Some(Easing::Curve(EaseFamily::Sine, EaseDir::Out))
        );
        assert_eq!(
            Easing::parse("back.out(2.5)"),
            Some(Easing::Curve(EaseFamily::Back(2.5), EaseDir::Out))
        );
        assert_eq!(Easing::parse("steps(4)"), Some(Easing::Steps(4)));
        assert_eq!(
            Easing::parse("cubic-bezier(0.4, 0, 0.2, 1)"),
            Some(Easing::Bezier([0.4, 0.0, 0.2, 1.0]))
        );
        assert_eq!(Easing::parse("wobble.sideways"), None);
    }

    #[test]
    fn unknown_identifier_falls_back() {
        let e = Easing::parse_or(Some("made-up"), Easing::Linear);
        assert_eq!(e, Easing::Linear);
        assert_eq!(Easing::parse_or(None, Easing::default()), Easing::default());
    }

    #[test]
    fn all_curves_hit_endpoints() {
        let ids = [
            "linear",
            "power1.in",
            "power3.out",
            "power4.inOut",
            "sine.inOut",
            "expo.in",
            "circ.out",
            "back.inOut",
            "elastic.out",
            "bounce.out",
            "ease-in-out",
            "steps(3)",
        ];
        for id in ids {
            let e = Easing::parse(id).unwrap();
            assert_abs_diff_eq!(e.apply(0.0), 0.0, epsilon = 1e-3);
            assert_abs_diff_eq!(e.apply(1.0), 1.0, epsilon = 1e-3);
        }
    }

    #[test]
    fn in_out_is_symmetric_at_midpoint() {
        let e = Easing::parse("power2.inOut").unwrap();
        assert_abs_diff_eq!(e.apply(0.5), 0.5, epsilon = 1e-6);
        let out = Easing::parse("power1.out").unwrap();
        assert_abs_diff_eq!(out.apply(0.5), 0.75, epsilon = 1e-6);
    }

    #[test]
    fn steps_quantize() {
        let e = Easing::Steps(4);
        assert_eq!(e.apply(0.3), 0.25);
        assert_eq!(e.apply(0.99), 0.75);
    }
}
