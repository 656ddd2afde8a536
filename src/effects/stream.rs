use super::{EffectState, Firework, check_clock};
use crate::config::EffectConfig;
use crate::engine::{Emitter, Stage};
use crate::error::{CreateError, TickError};
use crate::profile::EmissionProfile;
use std::rc::Rc;

/// Fountain: a fixed emitter that sprays for `duration_ms` each cycle.
pub struct StreamEffect {
    config: Rc<EffectConfig>,
    state: EffectState,
    cycle_start_ms: f64,
    last_tick_ms: Option<f64>,
    stopped: bool,
    /// Set by `restart`; the emitter is re-armed once the new cycle begins.
    rearm_at_start: bool,
    emitter: Option<Box<dyn Emitter>>,
}

impl StreamEffect {
    pub fn new(config: Rc<EffectConfig>) -> Self {
        Self {
            config,
            state: EffectState::Pending,
            cycle_start_ms: 0.0,
            last_tick_ms: None,
            stopped: false,
            rearm_at_start: false,
            emitter: None,
        }
    }

    /// Whether spawning has been cut off for this cycle.
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

impl Firework for StreamEffect {
    fn create(&mut self, stage: Stage<'_>, now_ms: f64) -> Result<(), CreateError> {
        self.config.validate()?;
        let profile = EmissionProfile::stream(self.config.position, self.config.color, self.config.duration_ms);
        self.emitter = Some(stage.create_emitter(&profile)?);
        self.cycle_start_ms = now_ms + self.config.begin_offset_ms;
        self.last_tick_ms = None;
        self.stopped = false;
        self.rearm_at_start = false;
        // There is no separate idle phase: the spray dies out on its own after stop
        self.state = EffectState::Active;
        Ok(())
    }

    fn advance(&mut self, _stage: Stage<'_>, now_ms: f64) -> Result<(), TickError> {
        check_clock(now_ms)?;
        let Some(emitter) = self.emitter.as_mut() else {
            return Ok(());
        };

        if now_ms < self.cycle_start_ms {
            // Sparks from the last cycle keep fading while this one waits to begin
            if let Some(last) = self.last_tick_ms {
                emitter.update((now_ms - last) / 1000.0)?;
                self.last_tick_ms = Some(now_ms);
            }
            return Ok(());
        }

        if self.rearm_at_start {
            if let Some(last) = self.last_tick_ms.filter(|&last| last < self.cycle_start_ms) {
                emitter.update((self.cycle_start_ms - last) / 1000.0)?;
            }
            // Same emitter, re-armed for one bounded run
            emitter.emit_once();
            self.rearm_at_start = false;
            self.last_tick_ms = None;
        }

        let elapsed = now_ms - self.last_tick_ms.unwrap_or(self.cycle_start_ms);
        emitter.update(elapsed / 1000.0)?;
        self.last_tick_ms = Some(now_ms);

        if !self.stopped && now_ms - self.cycle_start_ms >= self.config.duration_ms {
            emitter.stop();
            self.stopped = true;
        }
        Ok(())
    }

    fn restart(&mut self, now_ms: f64) {
        self.cycle_start_ms = now_ms + self.config.begin_offset_ms;
        self.stopped = false;
        self.rearm_at_start = self.emitter.is_some();
    }

    fn state(&self) -> EffectState {
        self.state
    }

    fn config(&self) -> &EffectConfig {
        &self.config
    }

    fn cycle_start_ms(&self) -> f64 {
        self.cycle_start_ms
    }
}
