//! Owns every live effect, advances them on each tick and restarts them together
//! once per display cycle.

use crate::config::{EffectRecord, Settings};
use crate::effects::{Effect, Firework};
use crate::engine::{ParticleEngine, Stage};
use crate::error::{CreateError, EngineUnavailable};
use crate::factory::EffectFactory;
use crate::scene::Container;
use log::{debug, error, info, warn};

/// Re-armable one-shot timer marking display cycle boundaries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleTimer {
    period_ms: f64,
    next_boundary_ms: Option<f64>,
}

impl CycleTimer {
    pub fn new(period_ms: f64) -> Self {
        Self {
            period_ms,
            next_boundary_ms: None,
        }
    }

    /// A zero-length cycle is never armed.
    pub fn arm(&mut self, now_ms: f64) {
        self.next_boundary_ms = (self.period_ms > 0.0).then_some(now_ms + self.period_ms);
    }

    pub fn is_due(&self, now_ms: f64) -> bool {
        self.next_boundary_ms.is_some_and(|boundary| now_ms >= boundary)
    }

    /// Schedules the next boundary one period after the one that just fired.
    ///
    /// Counting from the firing time means a late tick restarts once and moves on
    /// rather than replaying every missed boundary.
    pub fn rearm(&mut self, fired_at_ms: f64) {
        self.arm(fired_at_ms);
    }

    pub fn cancel(&mut self) {
        self.next_boundary_ms = None;
    }

    pub fn next_boundary_ms(&self) -> Option<f64> {
        self.next_boundary_ms
    }
}

/// Outcome of [`DisplayScheduler::create_all`].
#[derive(Debug, Default, PartialEq)]
pub struct CreateReport {
    pub created: usize,
    /// Record index and reason for every record that was skipped.
    pub failures: Vec<(usize, CreateError)>,
}

struct Entry {
    effect: Effect,
    /// Set when advancing failed; cleared by the next cycle restart.
    faulted: bool,
}

pub struct DisplayScheduler<E: ParticleEngine> {
    engine: E,
    container: Container,
    restart_gap_ms: f64,
    effects: Vec<Entry>,
    cycle_length_ms: f64,
    timer: CycleTimer,
    cycles_completed: u64,
}

impl<E: ParticleEngine> DisplayScheduler<E> {
    pub fn new(engine: E, container: Container, settings: &Settings) -> Self {
        let restart_gap_ms = if settings.restart_gap_ms.is_finite() && settings.restart_gap_ms >= 0.0 {
            settings.restart_gap_ms
        } else {
            warn!("Ignoring restart gap {}ms, using 0ms", settings.restart_gap_ms);
            0.0
        };
        Self {
            engine,
            container,
            restart_gap_ms,
            effects: Vec::new(),
            cycle_length_ms: restart_gap_ms,
            timer: CycleTimer::new(restart_gap_ms),
            cycles_completed: 0,
        }
    }

    /// Builds one effect per record, in record order.
    ///
    /// A bad record only loses its own effect: the reason is logged and returned in
    /// the report. An engine that fails its probe aborts the whole display.
    pub fn create_all(&mut self, records: &[EffectRecord], now_ms: f64) -> Result<CreateReport, EngineUnavailable> {
        self.engine.probe()?;
        self.timer.cancel();
        self.effects.clear();

        let stage = Stage::new(&self.engine, &self.container);
        let mut report = CreateReport::default();
        for (index, record) in records.iter().enumerate() {
            match EffectFactory::create(record, stage, now_ms) {
                Ok(effect) => self.effects.push(Entry { effect, faulted: false }),
                Err(e) => {
                    warn!("Skipping firework #{index} ('{}'): {e}", record.kind);
                    report.failures.push((index, e));
                }
            }
        }
        report.created = self.effects.len();

        let longest = self
            .effects
            .iter()
            .map(|entry| entry.effect.config().end_ms())
            .fold(0.0, f64::max);
        self.cycle_length_ms = longest + self.restart_gap_ms;
        self.timer = CycleTimer::new(self.cycle_length_ms);

        info!(
            "Created {} of {} fireworks, cycle length {}ms",
            report.created,
            records.len(),
            self.cycle_length_ms
        );
        Ok(report)
    }

    /// Starts the cycle clock. Effects restart every `cycle_length_ms` from here.
    pub fn start(&mut self, now_ms: f64) {
        self.timer.arm(now_ms);
        debug!("Display cycle armed, next restart at {:?}", self.timer.next_boundary_ms());
    }

    /// Advances every effect to `now_ms`.
    ///
    /// On a cycle boundary the effects are first advanced to it, then all restarted,
    /// then advanced again.
    pub fn tick(&mut self, now_ms: f64) {
        if !now_ms.is_finite() {
            warn!("Ignoring tick with non-finite clock value {now_ms}");
            return;
        }

        if self.timer.is_due(now_ms) {
            // Effects ending on the boundary finish this cycle before the restart
            self.advance_all(now_ms);
            self.restart_all(now_ms);
            self.timer.rearm(now_ms);
        }
        self.advance_all(now_ms);
    }

    fn advance_all(&mut self, now_ms: f64) {
        let stage = Stage::new(&self.engine, &self.container);
        for (index, entry) in self.effects.iter_mut().enumerate() {
            if entry.faulted {
                continue;
            }
            if let Err(e) = entry.effect.advance(stage, now_ms) {
                error!(
                    "Firework #{index} ({}) failed and is paused until the next cycle: {e}",
                    entry.effect.kind()
                );
                entry.faulted = true;
            }
        }
    }

    /// Resets every effect before any of them advances again.
    fn restart_all(&mut self, now_ms: f64) {
        for entry in &mut self.effects {
            entry.effect.restart(now_ms);
            entry.faulted = false;
        }
        self.cycles_completed += 1;
        debug!("Restarting display, cycle {}", self.cycles_completed + 1);
    }

    /// Stops the cycle clock and drops every effect with its emitters.
    pub fn teardown(self) {
        drop(self);
    }

    pub fn effects(&self) -> impl Iterator<Item = &Effect> {
        self.effects.iter().map(|entry| &entry.effect)
    }

    pub fn effect(&self, index: usize) -> Option<&Effect> {
        self.effects.get(index).map(|entry| &entry.effect)
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn is_faulted(&self, index: usize) -> bool {
        self.effects.get(index).is_some_and(|entry| entry.faulted)
    }

    pub fn cycle_length_ms(&self) -> f64 {
        self.cycle_length_ms
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed
    }

    pub fn next_restart_ms(&self) -> Option<f64> {
        self.timer.next_boundary_ms()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn container(&self) -> &Container {
        &self.container
    }
}

impl<E: ParticleEngine> Drop for DisplayScheduler<E> {
    fn drop(&mut self) {
        self.timer.cancel();
        self.effects.clear();
        debug!("Display torn down after {} restarts", self.cycles_completed);
    }
}
