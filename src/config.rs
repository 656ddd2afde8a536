use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul};
use std::str::FromStr;

/// Pause between the last effect finishing and the whole display restarting.
pub const DEFAULT_RESTART_GAP_MS: f64 = 2000.0;
pub const DEFAULT_FRAME_RATE: u32 = 60;

pub type Rgb = (u8, u8, u8);

/// Which motion model an effect uses.
///
/// Display files name these `Fountain` and `Rocket`; `Stream` and `Ballistic` are
/// accepted too. The loader and the factory both parse through [`FromStr`], so
/// they agree on what a valid kind is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::EnumString, strum::Display)]
#[strum(ascii_case_insensitive)]
pub enum EffectKind {
    #[strum(to_string = "Fountain", serialize = "Stream")]
    Stream,
    #[strum(to_string = "Rocket", serialize = "Ballistic")]
    Ballistic,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

/// A point as it came out of a display file, before validation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RawPoint {
    pub x: Option<f64>,
    pub y: Option<f64>,
}

impl RawPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x: Some(x), y: Some(y) }
    }
}

/// One firework as described by a display file.
///
/// Numbers that were present but unparseable are carried as NaN, absent ones as
/// `None`; both are rejected when the record is turned into an [`EffectConfig`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EffectRecord {
    pub kind: String,
    pub begin: Option<f64>,
    pub duration: Option<f64>,
    pub colour: Option<String>,
    pub position: Option<RawPoint>,
    pub velocity: Option<RawPoint>,
}

impl EffectRecord {
    pub fn fountain(begin: f64, duration: f64, colour: &str, position: (f64, f64)) -> Self {
        Self {
            kind: EffectKind::Stream.to_string(),
            begin: Some(begin),
            duration: Some(duration),
            colour: Some(colour.to_string()),
            position: Some(RawPoint::new(position.0, position.1)),
            velocity: None,
        }
    }

    pub fn rocket(
        begin: f64,
        duration: f64,
        colour: &str,
        position: (f64, f64),
        velocity: (f64, f64),
    ) -> Self {
        Self {
            kind: EffectKind::Ballistic.to_string(),
            velocity: Some(RawPoint::new(velocity.0, velocity.1)),
            ..Self::fountain(begin, duration, colour, position)
        }
    }
}

/// A validated effect description. Immutable once built; effects share it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectConfig {
    pub kind: EffectKind,
    pub begin_offset_ms: f64,
    pub duration_ms: f64,
    pub color: Rgb,
    pub position: Vec2,
    /// Only present for [`EffectKind::Ballistic`].
    pub velocity: Option<Vec2>,
}

impl EffectConfig {
    pub fn from_record(record: &EffectRecord) -> Result<Self, ConfigError> {
        let kind = EffectKind::from_str(record.kind.trim())
            .map_err(|_| ConfigError::UnknownKind(record.kind.clone()))?;

        let begin_offset_ms = require_number(record.begin, "begin")?;
        let duration_ms = require_number(record.duration, "duration")?;
        let colour = record.colour.as_deref().ok_or(ConfigError::Missing("colour"))?;
        let color = parse_colour(colour).ok_or_else(|| ConfigError::InvalidColour(colour.to_string()))?;
        let position = require_point(record.position, "position", "position.x", "position.y")?;

        // Velocity only means something for rockets; fountains ignore it.
        let velocity = match kind {
            EffectKind::Ballistic => Some(require_point(record.velocity, "velocity", "velocity.x", "velocity.y")?),
            EffectKind::Stream => None,
        };

        let config = Self {
            kind,
            begin_offset_ms,
            duration_ms,
            color,
            position,
            velocity,
        };
        config.validate()?;
        Ok(config)
    }

    /// Re-checks the numeric invariants. Effects call this before they start.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_finite(self.begin_offset_ms, "begin")?;
        check_finite(self.duration_ms, "duration")?;
        if self.begin_offset_ms < 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "begin",
                value: self.begin_offset_ms,
                reason: "must not be negative",
            });
        }
        if self.duration_ms <= 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "duration",
                value: self.duration_ms,
                reason: "must be greater than zero",
            });
        }
        check_finite(self.position.x, "position.x")?;
        check_finite(self.position.y, "position.y")?;
        match (self.kind, self.velocity) {
            (EffectKind::Ballistic, None) => Err(ConfigError::Missing("velocity")),
            (EffectKind::Ballistic, Some(v)) if !v.is_finite() => {
                check_finite(v.x, "velocity.x")?;
                check_finite(v.y, "velocity.y").map(|_| ())
            }
            _ => Ok(()),
        }
    }

    /// When this effect finishes, relative to display start.
    pub fn end_ms(&self) -> f64 {
        self.begin_offset_ms + self.duration_ms
    }
}

fn check_finite(value: f64, field: &'static str) -> Result<f64, ConfigError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ConfigError::NotNumeric { field, value })
    }
}

fn require_number(value: Option<f64>, field: &'static str) -> Result<f64, ConfigError> {
    let value = value.ok_or(ConfigError::Missing(field))?;
    check_finite(value, field)
}

fn require_point(
    point: Option<RawPoint>,
    field: &'static str,
    x_field: &'static str,
    y_field: &'static str,
) -> Result<Vec2, ConfigError> {
    let point = point.ok_or(ConfigError::Missing(field))?;
    Ok(Vec2::new(
        require_number(point.x, x_field)?,
        require_number(point.y, y_field)?,
    ))
}

/// Parses `RRGGBB`, `#RRGGBB` or `0xRRGGBB`.
pub fn parse_colour(hex: &str) -> Option<Rgb> {
    let hex = hex.trim();
    let hex = hex
        .strip_prefix("0x")
        .or_else(|| hex.strip_prefix("0X"))
        .or_else(|| hex.strip_prefix('#'))
        .unwrap_or(hex);
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;

    Some((r, g, b))
}

/// Runtime knobs for one display session.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub restart_gap_ms: f64,
    pub frame_rate: u32,
    pub bg_color: Rgb,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            restart_gap_ms: DEFAULT_RESTART_GAP_MS,
            frame_rate: DEFAULT_FRAME_RATE,
            bg_color: (0, 0, 0),
        }
    }
}

impl Settings {
    /// Minimum spacing between ticks for the configured frame rate.
    pub fn frame_interval_ms(&self) -> f64 {
        1000.0 / self.frame_rate.max(1) as f64
    }
}
