//! Declarative particle behaviour handed to the particle engine.
//!
//! A profile is built from an effect's resolved position, colour and timing and
//! never changes afterwards; an engine turns it into moving particles.

use crate::config::{Rgb, Vec2};
use serde::Serialize;

const WHITE: Rgb = (255, 255, 255);
const PARTICLE_TEXTURE: &str = "particle.png";

/// Values that can be blended along a curve.
pub trait Lerp: Copy {
    fn lerp(a: Self, b: Self, t: f64) -> Self;
}

impl Lerp for f64 {
    fn lerp(a: f64, b: f64, t: f64) -> f64 {
        a + (b - a) * t
    }
}

impl Lerp for Rgb {
    fn lerp(a: Rgb, b: Rgb, t: f64) -> Rgb {
        (
            (a.0 as f64 * (1.0 - t) + b.0 as f64 * t) as u8,
            (a.1 as f64 * (1.0 - t) + b.1 as f64 * t) as u8,
            (a.2 as f64 * (1.0 - t) + b.2 as f64 * t) as u8,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CurvePoint<T> {
    pub value: T,
    /// Normalized particle age, 0.0 at birth and 1.0 at death.
    pub time: f64,
}

/// A value over a particle's normalized lifetime.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Curve<T> {
    list: Vec<CurvePoint<T>>,
    is_stepped: bool,
}

impl<T: Lerp> Curve<T> {
    pub fn linear(from: T, to: T) -> Self {
        Self {
            list: vec![CurvePoint { value: from, time: 0.0 }, CurvePoint { value: to, time: 1.0 }],
            is_stepped: false,
        }
    }

    pub fn stepped(mut self) -> Self {
        self.is_stepped = true;
        self
    }

    pub fn sample(&self, t: f64) -> T {
        let t = t.clamp(0.0, 1.0);
        let mut prev = self.list[0];
        for next in &self.list[1..] {
            if t < next.time {
                if self.is_stepped || next.time <= prev.time {
                    return prev.value;
                }
                let local = (t - prev.time) / (next.time - prev.time);
                return T::lerp(prev.value, next.value, local);
            }
            prev = *next;
        }
        prev.value
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Span {
    pub min: f64,
    pub max: f64,
}

impl Span {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Picks a value in the span from a unit random number.
    pub fn pick(&self, unit: f64) -> f64 {
        self.min + (self.max - self.min) * unit
    }
}

/// Where new particles appear relative to the profile origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SpawnShape {
    Circle { radius: f64 },
    Torus { inner_radius: f64, radius: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmissionProfile {
    /// Particle lifetime in seconds.
    pub lifetime: Span,
    /// Seconds between spawn waves.
    pub frequency: f64,
    pub spawn_chance: f64,
    pub particles_per_wave: u32,
    pub max_particles: usize,
    /// How long the emitter spawns for after being (re)started, in seconds.
    /// `None` spawns until told to stop.
    pub emitter_lifetime: Option<f64>,
    pub origin: Vec2,
    pub add_at_back: bool,
    pub alpha: Curve<f64>,
    pub scale: Curve<f64>,
    pub color: Curve<Rgb>,
    /// Pixels per second.
    pub speed: Curve<f64>,
    /// Launch direction in degrees, 0 pointing right and -90 straight up.
    pub rotation: Span,
    pub spawn_shape: SpawnShape,
    pub texture: &'static str,
}

impl EmissionProfile {
    /// Continuous fountain spray at a fixed point, pointed upward.
    pub fn stream(position: Vec2, color: Rgb, duration_ms: f64) -> Self {
        Self {
            lifetime: Span::new(0.0, 0.4),
            frequency: 0.001,
            spawn_chance: 0.8,
            particles_per_wave: 1,
            max_particles: 200,
            emitter_lifetime: Some(duration_ms / 1000.0),
            origin: position,
            add_at_back: true,
            alpha: Curve::linear(0.8, 0.5),
            scale: Curve::linear(0.1, 0.6),
            color: Curve::linear(WHITE, color),
            speed: Curve::linear(500.0, 300.0),
            rotation: Span::new(-120.0, -60.0),
            spawn_shape: SpawnShape::Circle { radius: 5.0 },
            texture: PARTICLE_TEXTURE,
        }
    }

    /// Short all-directions burst where a rocket's flight ends.
    pub fn burst(position: Vec2, color: Rgb) -> Self {
        Self {
            lifetime: Span::new(0.1, 0.5),
            frequency: 0.0005,
            spawn_chance: 1.0,
            particles_per_wave: 1,
            max_particles: 200,
            emitter_lifetime: Some(0.2),
            origin: position,
            add_at_back: true,
            alpha: Curve::linear(0.8, 0.5),
            scale: Curve::linear(0.5, 0.6),
            color: Curve::linear(WHITE, color),
            speed: Curve::linear(500.0, 300.0),
            rotation: Span::new(0.0, 360.0),
            spawn_shape: SpawnShape::Torus { inner_radius: 0.0, radius: 30.0 },
            texture: PARTICLE_TEXTURE,
        }
    }

    /// Time for one emitter run plus its last particles to die out, in seconds.
    pub fn settle_secs(&self) -> f64 {
        self.emitter_lifetime.unwrap_or(0.0) + self.lifetime.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, 500.0)]
    #[case(0.5, 400.0)]
    #[case(1.0, 300.0)]
    #[case(2.0, 300.0)]
    #[case(-1.0, 500.0)]
    fn linear_speed(#[case] t: f64, #[case] expected: f64) {
        let speed = Curve::linear(500.0, 300.0);
        assert!((speed.sample(t) - expected).abs() < 1e-9);
    }

    #[test]
    fn stepped_holds_value() {
        let curve = Curve::linear(1.0, 0.0).stepped();
        assert_eq!(curve.sample(0.99), 1.0);
        assert_eq!(curve.sample(1.0), 0.0);
    }

    #[test]
    fn colour_fades_from_white() {
        let color = Curve::linear(WHITE, (255, 0, 0));
        assert_eq!(color.sample(0.0), WHITE);
        assert_eq!(color.sample(1.0), (255, 0, 0));
        assert_eq!(color.sample(0.5), (255, 127, 127));
    }

    #[test]
    fn stream_is_keyed_by_position_colour_and_duration() {
        let a = EmissionProfile::stream(Vec2::new(10.0, 20.0), (0, 255, 0), 3000.0);
        assert_eq!(a.origin, Vec2::new(10.0, 20.0));
        assert_eq!(a.emitter_lifetime, Some(3.0));
        assert_eq!(a.color.sample(1.0), (0, 255, 0));
        assert_ne!(a, EmissionProfile::stream(Vec2::new(10.0, 20.0), (0, 255, 0), 2000.0));
        assert_eq!(a, EmissionProfile::stream(Vec2::new(10.0, 20.0), (0, 255, 0), 3000.0));
    }

    #[test]
    fn burst_settles_after_lifetime_and_particles() {
        let burst = EmissionProfile::burst(Vec2::default(), (255, 255, 0));
        assert!((burst.settle_secs() - 0.7).abs() < 1e-9);
        assert_eq!(burst.spawn_shape, SpawnShape::Torus { inner_radius: 0.0, radius: 30.0 });
    }

    #[test]
    fn serializes_for_the_journal() {
        let burst = EmissionProfile::burst(Vec2::new(1.0, -2.0), (1, 2, 3));
        let json = serde_json::to_value(&burst).expect("profile serializes");
        assert_eq!(json["spawn_shape"]["type"], "torus");
        assert_eq!(json["origin"]["y"], -2.0);
        assert_eq!(json["emitter_lifetime"], 0.2);
    }
}
