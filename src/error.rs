//! Error types for the display.
//!
//! A [`ConfigError`] or [`TickError`] only costs the effect it belongs to.
//! [`EngineUnavailable`] stops the whole display before it starts.

/// A display record that cannot become a running effect.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("unknown firework type: '{0}'")]
    UnknownKind(String),

    #[error("missing required field '{0}'")]
    Missing(&'static str),

    #[error("invalid value for {field}: {value} is not a finite number")]
    NotNumeric { field: &'static str, value: f64 },

    #[error("invalid value for {field}: {value} ({reason})")]
    OutOfRange {
        field: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("invalid colour '{0}', expected RRGGBB, #RRGGBB or 0xRRGGBB")]
    InvalidColour(String),
}

/// The particle engine is missing or cannot serve this display.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("particle engine unavailable: {0}")]
pub struct EngineUnavailable(pub String);

/// Raised by an emitter while it is being driven.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("emitter update failed: {0}")]
    UpdateFailed(String),

    #[error("emitter could not be created: {0}")]
    CreateFailed(String),
}

/// Why a single effect could not be brought up.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CreateError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// A failure while advancing a single effect.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TickError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("clock value {0} is not finite")]
    NonFiniteClock(f64),
}

/// Errors that can occur while loading a display file.
#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse display XML: {0}")]
    Xml(#[from] quick_xml::DeError),

    #[error("failed to parse display JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported display file format: '{0}'")]
    UnsupportedFormat(String),

    #[error("display file contains no fireworks")]
    EmptyDisplay,
}

/// Errors that abort the whole display.
#[derive(thiserror::Error, Debug)]
pub enum DisplayError {
    #[error(transparent)]
    EngineUnavailable(#[from] EngineUnavailable),

    #[error(transparent)]
    Load(#[from] LoadError),
}
