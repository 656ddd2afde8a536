use crate::config::{EffectConfig, EffectKind, EffectRecord};
use crate::effects::{BallisticEffect, Effect, Firework, StreamEffect};
use crate::engine::Stage;
use crate::error::CreateError;
use std::rc::Rc;

pub struct EffectFactory;

impl EffectFactory {
    /// Picks the variant for a validated config. The effect is not started yet.
    pub fn build(config: Rc<EffectConfig>) -> Effect {
        match config.kind {
            EffectKind::Stream => Effect::Stream(StreamEffect::new(config)),
            EffectKind::Ballistic => Effect::Ballistic(BallisticEffect::new(config)),
        }
    }

    /// Validates a display record, builds its effect and creates it on `stage`.
    ///
    /// Unknown kinds come back as [`ConfigError::UnknownKind`](crate::error::ConfigError::UnknownKind);
    /// nothing is skipped silently here.
    pub fn create(record: &EffectRecord, stage: Stage<'_>, now_ms: f64) -> Result<Effect, CreateError> {
        let config = Rc::new(EffectConfig::from_record(record)?);
        let mut effect = Self::build(config);
        effect.create(stage, now_ms)?;
        Ok(effect)
    }
}
