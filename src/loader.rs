//! Display file loading.
//!
//! Reads XML (`<FireworkDisplay>`) or JSON display descriptions into
//! [`EffectRecord`]s. The loader only checks structure; field validation happens
//! when each record is turned into an effect.

use crate::config::{EffectRecord, RawPoint};
use crate::error::LoadError;
use log::info;
use serde::Deserialize;
use std::path::Path;

// ─────────────────────────────────────────────────────────────────────────────
// XML Deserialization Types
// ─────────────────────────────────────────────────────────────────────────────

/// Root XML: `<FireworkDisplay>` → `<Firework>` elements
#[derive(Debug, Deserialize)]
struct XmlDisplay {
    #[serde(rename = "Firework", default)]
    fireworks: Vec<XmlFirework>,
}

#[derive(Debug, Deserialize)]
struct XmlFirework {
    #[serde(rename = "@type", default)]
    kind: Option<String>,
    #[serde(rename = "@begin", default)]
    begin: Option<String>,
    #[serde(rename = "@duration", default)]
    duration: Option<String>,
    #[serde(rename = "@colour", default)]
    colour: Option<String>,
    #[serde(rename = "Position", default)]
    position: Option<XmlPoint>,
    #[serde(rename = "Velocity", default)]
    velocity: Option<XmlPoint>,
}

#[derive(Debug, Deserialize)]
struct XmlPoint {
    #[serde(rename = "@x", default)]
    x: Option<String>,
    #[serde(rename = "@y", default)]
    y: Option<String>,
}

/// Present-but-unparseable numbers become NaN so validation can name the field.
fn parse_number(raw: Option<&str>) -> Option<f64> {
    raw.map(|s| s.trim().parse::<f64>().unwrap_or(f64::NAN))
}

impl From<XmlPoint> for RawPoint {
    fn from(point: XmlPoint) -> Self {
        RawPoint {
            x: parse_number(point.x.as_deref()),
            y: parse_number(point.y.as_deref()),
        }
    }
}

impl From<XmlFirework> for EffectRecord {
    fn from(firework: XmlFirework) -> Self {
        EffectRecord {
            kind: firework.kind.unwrap_or_default(),
            begin: parse_number(firework.begin.as_deref()),
            duration: parse_number(firework.duration.as_deref()),
            colour: firework.colour,
            position: firework.position.map(RawPoint::from),
            velocity: firework.velocity.map(RawPoint::from),
        }
    }
}

pub fn parse_xml(content: &str) -> Result<Vec<EffectRecord>, LoadError> {
    let display: XmlDisplay = quick_xml::de::from_str(content)?;
    non_empty(display.fireworks.into_iter().map(EffectRecord::from).collect())
}

// ─────────────────────────────────────────────────────────────────────────────
// JSON Deserialization Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct JsonDisplay {
    #[serde(default)]
    fireworks: Vec<JsonFirework>,
}

#[derive(Debug, Deserialize)]
struct JsonFirework {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    begin: Option<serde_json::Value>,
    #[serde(default)]
    duration: Option<serde_json::Value>,
    #[serde(default)]
    colour: Option<String>,
    #[serde(default)]
    position: Option<JsonPoint>,
    #[serde(default)]
    velocity: Option<JsonPoint>,
}

#[derive(Debug, Deserialize)]
struct JsonPoint {
    #[serde(default)]
    x: Option<serde_json::Value>,
    #[serde(default)]
    y: Option<serde_json::Value>,
}

fn json_number(value: Option<serde_json::Value>) -> Option<f64> {
    match value? {
        serde_json::Value::Null => None,
        serde_json::Value::Number(n) => Some(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => parse_number(Some(&s)),
        _ => Some(f64::NAN),
    }
}

impl From<JsonPoint> for RawPoint {
    fn from(point: JsonPoint) -> Self {
        RawPoint {
            x: json_number(point.x),
            y: json_number(point.y),
        }
    }
}

impl From<JsonFirework> for EffectRecord {
    fn from(firework: JsonFirework) -> Self {
        EffectRecord {
            kind: firework.kind.unwrap_or_default(),
            begin: json_number(firework.begin),
            duration: json_number(firework.duration),
            colour: firework.colour,
            position: firework.position.map(RawPoint::from),
            velocity: firework.velocity.map(RawPoint::from),
        }
    }
}

pub fn parse_json(content: &str) -> Result<Vec<EffectRecord>, LoadError> {
    let display: JsonDisplay = serde_json::from_str(content)?;
    non_empty(display.fireworks.into_iter().map(EffectRecord::from).collect())
}

fn non_empty(records: Vec<EffectRecord>) -> Result<Vec<EffectRecord>, LoadError> {
    if records.is_empty() {
        Err(LoadError::EmptyDisplay)
    } else {
        Ok(records)
    }
}

/// Loads a display file, picking the format from its extension.
pub fn load(path: &Path) -> Result<Vec<EffectRecord>, LoadError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let content = std::fs::read_to_string(path)?;
    let records = match extension.as_str() {
        "xml" => parse_xml(&content)?,
        "json" => parse_json(&content)?,
        other => return Err(LoadError::UnsupportedFormat(other.to_string())),
    };
    info!("Loaded {} fireworks from '{}'", records.len(), path.display());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DISPLAY_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<FireworkDisplay>
    <Firework begin="0" type="Fountain" colour="0x00FF00" duration="4000">
        <Position x="-300" y="250"/>
    </Firework>
    <Firework begin="1500" type="Rocket" colour="0xFF0000" duration="1200">
        <Position x="0" y="300"/>
        <Velocity x="40" y="-300"/>
    </Firework>
    <Firework begin="soon" type="Fountain" colour="0x0000FF">
        <Position x="10" y="abc"/>
    </Firework>
</FireworkDisplay>
"#;

    #[test]
    fn parses_xml_display() {
        let records = parse_xml(DISPLAY_XML).expect("valid XML");
        assert_eq!(records.len(), 3);
        assert_eq!(records[0], EffectRecord::fountain(0.0, 4000.0, "0x00FF00", (-300.0, 250.0)));
        assert_eq!(
            records[1],
            EffectRecord::rocket(1500.0, 1200.0, "0xFF0000", (0.0, 300.0), (40.0, -300.0))
        );
    }

    #[test]
    fn keeps_bad_values_for_validation() {
        let records = parse_xml(DISPLAY_XML).expect("valid XML");
        let broken = &records[2];
        assert!(broken.begin.is_some_and(f64::is_nan));
        assert_eq!(broken.duration, None);
        let position = broken.position.expect("position element present");
        assert_eq!(position.x, Some(10.0));
        assert!(position.y.is_some_and(f64::is_nan));
    }

    #[test]
    fn parses_json_display() {
        let json = r##"{
            "fireworks": [
                { "type": "Rocket", "begin": 0, "duration": "800", "colour": "#ffffff",
                  "position": { "x": 0, "y": 0 }, "velocity": { "x": 1.5, "y": -2 } },
                { "type": "Fountain", "begin": null, "duration": 100, "colour": "ffffff",
                  "position": { "x": "left", "y": 0 } }
            ]
        }"##;
        let records = parse_json(json).expect("valid JSON");
        assert_eq!(
            records[0],
            EffectRecord::rocket(0.0, 800.0, "#ffffff", (0.0, 0.0), (1.5, -2.0))
        );
        assert_eq!(records[1].begin, None);
        assert!(records[1].position.and_then(|p| p.x).is_some_and(f64::is_nan));
    }

    #[test]
    fn empty_display_is_an_error() {
        assert!(matches!(
            parse_xml("<FireworkDisplay></FireworkDisplay>"),
            Err(LoadError::EmptyDisplay)
        ));
        assert!(matches!(parse_json(r#"{"fireworks": []}"#), Err(LoadError::EmptyDisplay)));
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(matches!(
            parse_xml("<FireworkDisplay><Firework type=\"Fountain\""),
            Err(LoadError::Xml(_))
        ));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let path = std::env::temp_dir().join(format!("fireshow-{}.toml", std::process::id()));
        std::fs::write(&path, "fireworks = []").expect("temp dir is writable");
        let result = load(&path);
        let _ = std::fs::remove_file(&path);
        assert!(matches!(result, Err(LoadError::UnsupportedFormat(ext)) if ext == "toml"));
    }
}
