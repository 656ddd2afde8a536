use crate::config::{EffectConfig, EffectKind};
use crate::engine::Stage;
use crate::error::{CreateError, TickError};

pub mod ballistic;
pub mod stream;

pub use ballistic::BallisticEffect;
pub use stream::StreamEffect;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectState {
    /// Waiting for this cycle's begin offset.
    Pending,
    Active,
    /// Flight is over and the burst has fired this cycle.
    Bursting,
    /// Burst has played out; waiting for the next restart.
    Idle,
}

/// The operations the scheduler drives every effect through.
///
/// Timing state only changes inside these calls.
pub trait Firework {
    fn create(&mut self, stage: Stage<'_>, now_ms: f64) -> Result<(), CreateError>;
    fn advance(&mut self, stage: Stage<'_>, now_ms: f64) -> Result<(), TickError>;
    fn restart(&mut self, now_ms: f64);
    fn state(&self) -> EffectState;
    fn config(&self) -> &EffectConfig;
    /// Absolute time this cycle's animation begins.
    fn cycle_start_ms(&self) -> f64;
}

pub enum Effect {
    Stream(StreamEffect),
    Ballistic(BallisticEffect),
}

impl Effect {
    pub fn kind(&self) -> EffectKind {
        match self {
            Effect::Stream(_) => EffectKind::Stream,
            Effect::Ballistic(_) => EffectKind::Ballistic,
        }
    }

    fn inner(&self) -> &dyn Firework {
        match self {
            Effect::Stream(e) => e,
            Effect::Ballistic(e) => e,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Firework {
        match self {
            Effect::Stream(e) => e,
            Effect::Ballistic(e) => e,
        }
    }
}

impl Firework for Effect {
    fn create(&mut self, stage: Stage<'_>, now_ms: f64) -> Result<(), CreateError> {
        self.inner_mut().create(stage, now_ms)
    }

    fn advance(&mut self, stage: Stage<'_>, now_ms: f64) -> Result<(), TickError> {
        self.inner_mut().advance(stage, now_ms)
    }

    fn restart(&mut self, now_ms: f64) {
        self.inner_mut().restart(now_ms)
    }

    fn state(&self) -> EffectState {
        self.inner().state()
    }

    fn config(&self) -> &EffectConfig {
        self.inner().config()
    }

    fn cycle_start_ms(&self) -> f64 {
        self.inner().cycle_start_ms()
    }
}

fn check_clock(now_ms: f64) -> Result<(), TickError> {
    if now_ms.is_finite() {
        Ok(())
    } else {
        Err(TickError::NonFiniteClock(now_ms))
    }
}
