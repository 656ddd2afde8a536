//! Rocket: a marker flies along its velocity, then bursts where the flight ends.

use super::{EffectState, Firework, check_clock};
use crate::config::{EffectConfig, Rgb, Vec2};
use crate::engine::{Emitter, Stage};
use crate::error::{ConfigError, CreateError, TickError};
use crate::profile::EmissionProfile;
use crate::scene::{Container, NodeId, Sprite};
use std::rc::Rc;

/// Normalized flight progress at `elapsed_ms`, clamped to `[0, 1]`.
pub fn flight_progress(elapsed_ms: f64, duration_ms: f64) -> f64 {
    (elapsed_ms / duration_ms).clamp(0.0, 1.0)
}

/// Marker position `elapsed_ms` into the flight.
///
/// Velocity is scaled by both progress and elapsed seconds, so the marker
/// accelerates along its path instead of moving uniformly.
pub fn marker_position(origin: Vec2, velocity: Vec2, elapsed_ms: f64, duration_ms: f64) -> Vec2 {
    let progress = flight_progress(elapsed_ms, duration_ms);
    origin + velocity * (progress * (elapsed_ms / 1000.0))
}

/// Where the burst goes off, from the configured duration.
pub fn burst_position(origin: Vec2, velocity: Vec2, duration_ms: f64) -> Vec2 {
    origin + velocity * (duration_ms / 1000.0)
}

/// The rocket body drawn during flight.
struct Marker {
    container: Container,
    node: NodeId,
    origin: Vec2,
    position: Vec2,
    alpha: f64,
}

impl Marker {
    fn new(container: &Container, origin: Vec2, tint: Rgb) -> Self {
        let node = container.add_sprite(Sprite::hidden(origin.x, origin.y, tint));
        Self {
            container: container.clone(),
            node,
            origin,
            position: origin,
            alpha: 0.0,
        }
    }

    fn fly_to(&mut self, position: Vec2, progress: f64) {
        self.position = position;
        self.alpha = progress;
        self.container.update_sprite(self.node, |sprite| {
            sprite.x = position.x;
            sprite.y = position.y;
            sprite.alpha = progress;
            sprite.blur = progress;
            sprite.visible = true;
        });
    }

    fn hide(&mut self) {
        self.alpha = 0.0;
        self.container.update_sprite(self.node, |sprite| {
            sprite.alpha = 0.0;
            sprite.visible = false;
        });
    }

    fn reset(&mut self) {
        let origin = self.origin;
        self.position = origin;
        self.alpha = 0.0;
        self.container.update_sprite(self.node, |sprite| {
            sprite.x = origin.x;
            sprite.y = origin.y;
            sprite.alpha = 0.0;
            sprite.blur = 0.0;
            sprite.visible = false;
        });
    }
}

impl Drop for Marker {
    fn drop(&mut self) {
        self.container.remove(self.node);
    }
}

struct Burst {
    profile: EmissionProfile,
    emitter: Box<dyn Emitter>,
    fired_at_ms: f64,
    /// Last update while the sparks are still playing out; `None` once settled.
    last_tick_ms: Option<f64>,
}

impl Burst {
    fn settle_ms(&self) -> f64 {
        self.profile.settle_secs() * 1000.0
    }

    /// Ages the sparks up to `now_ms`, across cycle restarts, until they have all died out.
    fn play_out(&mut self, now_ms: f64) -> Result<(), TickError> {
        let Some(last) = self.last_tick_ms else {
            return Ok(());
        };
        self.emitter.update((now_ms - last) / 1000.0)?;
        self.last_tick_ms = (now_ms - self.fired_at_ms < self.settle_ms()).then_some(now_ms);
        Ok(())
    }
}

pub struct BallisticEffect {
    config: Rc<EffectConfig>,
    velocity: Vec2,
    state: EffectState,
    cycle_start_ms: f64,
    burst_triggered: bool,
    bursts_fired: u32,
    marker: Option<Marker>,
    burst: Option<Burst>,
}

impl BallisticEffect {
    pub fn new(config: Rc<EffectConfig>) -> Self {
        Self {
            velocity: config.velocity.unwrap_or_default(),
            config,
            state: EffectState::Pending,
            cycle_start_ms: 0.0,
            burst_triggered: false,
            bursts_fired: 0,
            marker: None,
            burst: None,
        }
    }

    pub fn marker_position(&self) -> Option<Vec2> {
        self.marker.as_ref().map(|m| m.position)
    }

    pub fn marker_alpha(&self) -> Option<f64> {
        self.marker.as_ref().map(|m| m.alpha)
    }

    /// Bursts fired over the effect's whole life.
    pub fn bursts_fired(&self) -> u32 {
        self.bursts_fired
    }

    fn trigger_burst(&mut self, stage: Stage<'_>, now_ms: f64) -> Result<(), TickError> {
        let target = burst_position(self.config.position, self.velocity, self.config.duration_ms);
        let profile = EmissionProfile::burst(target, self.config.color);

        let reusable = self.burst.as_ref().is_some_and(|burst| burst.profile == profile);
        match self.burst.as_mut().filter(|_| reusable) {
            Some(burst) => {
                burst.emitter.emit_once();
                burst.fired_at_ms = now_ms;
                burst.last_tick_ms = Some(now_ms);
            }
            None => {
                // First cycle, or the burst must look different: start a fresh emitter
                let emitter = stage.create_emitter(&profile)?;
                self.burst = Some(Burst {
                    profile,
                    emitter,
                    fired_at_ms: now_ms,
                    last_tick_ms: Some(now_ms),
                });
            }
        }
        if let Some(marker) = self.marker.as_mut() {
            marker.hide();
        }

        self.burst_triggered = true;
        self.bursts_fired += 1;
        self.state = EffectState::Bursting;
        log::trace!("rocket burst at ({:.1}, {:.1})", target.x, target.y);
        Ok(())
    }
}

impl Firework for BallisticEffect {
    fn create(&mut self, stage: Stage<'_>, now_ms: f64) -> Result<(), CreateError> {
        self.config.validate()?;
        self.velocity = self.config.velocity.ok_or(ConfigError::Missing("velocity"))?;
        self.marker = Some(Marker::new(stage.container, self.config.position, self.config.color));
        self.cycle_start_ms = now_ms + self.config.begin_offset_ms;
        self.burst_triggered = false;
        self.state = EffectState::Pending;
        Ok(())
    }

    fn advance(&mut self, stage: Stage<'_>, now_ms: f64) -> Result<(), TickError> {
        check_clock(now_ms)?;
        // A burst from the last cycle may still be fading after a restart
        if let Some(burst) = self.burst.as_mut() {
            burst.play_out(now_ms)?;
        }

        if now_ms < self.cycle_start_ms {
            self.state = EffectState::Pending;
            return Ok(());
        }

        let elapsed = now_ms - self.cycle_start_ms;
        let duration = self.config.duration_ms;

        if elapsed < duration {
            let progress = flight_progress(elapsed, duration);
            let position = marker_position(self.config.position, self.velocity, elapsed, duration);
            if let Some(marker) = self.marker.as_mut() {
                marker.fly_to(position, progress);
            }
            self.state = EffectState::Active;
            return Ok(());
        }

        if !self.burst_triggered {
            self.trigger_burst(stage, now_ms)?;
            if let Some(burst) = self.burst.as_mut() {
                burst.play_out(now_ms)?;
            }
        }

        if self.state == EffectState::Bursting {
            let settle_ms = self.burst.as_ref().map_or(0.0, Burst::settle_ms);
            if elapsed >= duration + settle_ms {
                self.state = EffectState::Idle;
            }
        }
        Ok(())
    }

    fn restart(&mut self, now_ms: f64) {
        self.cycle_start_ms = now_ms + self.config.begin_offset_ms;
        self.burst_triggered = false;
        self.state = EffectState::Pending;
        if let Some(marker) = self.marker.as_mut() {
            marker.reset();
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EffectRecord;
    use crate::engine::{EngineCall, HeadlessEngine, TerminalEngine};
    use crate::scene::{Node, Scene};
    use rstest::rstest;

    fn rocket(begin: f64, duration: f64, velocity: (f64, f64)) -> BallisticEffect {
        let record = EffectRecord::rocket(begin, duration, "ff8800", (0.0, 0.0), velocity);
        BallisticEffect::new(Rc::new(EffectConfig::from_record(&record).expect("valid rocket")))
    }

    fn assert_close(actual: Vec2, expected: Vec2) {
        assert!(
            (actual.x - expected.x).abs() < 1e-9 && (actual.y - expected.y).abs() < 1e-9,
            "{actual:?} != {expected:?}"
        );
    }

    #[rstest]
    #[case(0.0, Vec2::new(0.0, 0.0))]
    #[case(500.0, Vec2::new(25.0, -12.5))]
    #[case(1000.0, Vec2::new(100.0, -50.0))]
    #[case(2000.0, Vec2::new(200.0, -100.0))]
    fn accelerating_trajectory(#[case] elapsed: f64, #[case] expected: Vec2) {
        let pos = marker_position(Vec2::default(), Vec2::new(100.0, -50.0), elapsed, 1000.0);
        assert_close(pos, expected);
    }

    #[test]
    fn halfway_marker() {
        let engine = HeadlessEngine::new();
        let container = Container::new();
        let stage = Stage::new(&engine, &container);

        let mut effect = rocket(0.0, 1000.0, (100.0, -50.0));
        effect.create(stage, 0.0).expect("created");
        effect.advance(stage, 500.0).expect("tick");

        assert_eq!(effect.state(), EffectState::Active);
        assert_close(effect.marker_position().expect("marker"), Vec2::new(25.0, -12.5));
        assert_eq!(effect.marker_alpha(), Some(0.5));
    }

    #[test]
    fn lifecycle_pending_active_bursting_idle() {
        let engine = HeadlessEngine::new();
        let container = Container::new();
        let stage = Stage::new(&engine, &container);
        let journal = engine.journal();

        let mut effect = rocket(100.0, 1000.0, (0.0, -200.0));
        effect.create(stage, 0.0).expect("created");

        effect.advance(stage, 50.0).expect("tick");
        assert_eq!(effect.state(), EffectState::Pending);

        effect.advance(stage, 600.0).expect("tick");
        assert_eq!(effect.state(), EffectState::Active);
        assert!(journal.is_empty(), "no emitter during flight");

        effect.advance(stage, 1100.0).expect("tick");
        assert_eq!(effect.state(), EffectState::Bursting);
        assert_eq!(effect.marker_alpha(), Some(0.0));
        let created = journal.created();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].1.origin, Vec2::new(0.0, -200.0));

        effect.advance(stage, 1500.0).expect("tick");
        assert_eq!(effect.state(), EffectState::Bursting);
        assert_eq!(journal.updates(0), vec![0.0, 0.4]);

        effect.advance(stage, 1850.0).expect("tick");
        assert_eq!(effect.state(), EffectState::Idle);

        effect.advance(stage, 1900.0).expect("tick");
        assert_eq!(journal.updates(0).len(), 3, "idle effects leave the emitter alone");
    }

    #[test]
    fn burst_uses_configured_endpoint() {
        let engine = HeadlessEngine::new();
        let container = Container::new();
        let stage = Stage::new(&engine, &container);
        let journal = engine.journal();

        let mut effect = rocket(0.0, 1000.0, (100.0, -50.0));
        effect.create(stage, 0.0).expect("created");
        effect.advance(stage, 999.0).expect("tick");
        effect.advance(stage, 5000.0).expect("tick");

        let created = journal.created();
        assert_eq!(created[0].1.origin, Vec2::new(100.0, -50.0));
        assert_eq!(effect.state(), EffectState::Idle);
    }

    #[test]
    fn later_cycles_reuse_the_burst_emitter() {
        let engine = HeadlessEngine::new();
        let container = Container::new();
        let stage = Stage::new(&engine, &container);
        let journal = engine.journal();

        let mut effect = rocket(0.0, 200.0, (0.0, -100.0));
        effect.create(stage, 0.0).expect("created");
        effect.advance(stage, 250.0).expect("tick");
        assert_eq!(journal.emit_onces(0), 0);

        effect.restart(3000.0);
        assert_eq!(effect.state(), EffectState::Pending);
        effect.advance(stage, 3100.0).expect("tick");
        assert_eq!(effect.state(), EffectState::Active);
        effect.advance(stage, 3250.0).expect("tick");

        assert_eq!(journal.created().len(), 1);
        assert_eq!(journal.emit_onces(0), 1);
        assert_eq!(effect.bursts_fired(), 2);
    }

    #[test]
    fn double_restart_does_not_double_burst() {
        let engine = HeadlessEngine::new();
        let container = Container::new();
        let stage = Stage::new(&engine, &container);
        let journal = engine.journal();

        let mut effect = rocket(0.0, 200.0, (0.0, -100.0));
        effect.create(stage, 0.0).expect("created");
        effect.advance(stage, 300.0).expect("tick");

        effect.restart(1000.0);
        effect.restart(1000.0);
        assert_eq!(effect.cycle_start_ms(), 1000.0);

        effect.advance(stage, 1250.0).expect("tick");
        effect.advance(stage, 1260.0).expect("tick");
        assert_eq!(effect.bursts_fired(), 2);
        assert_eq!(journal.emit_onces(0), 1);
        assert_eq!(journal.updates(0).last().copied(), Some(0.01));
    }

    #[test]
    fn restart_lets_the_last_burst_fade_out() {
        let engine = TerminalEngine::new(80, 24);
        let container = Container::new();
        let stage = Stage::new(&engine, &container);
        let sparks = || {
            container.with_scene(|scene| {
                scene
                    .draw_order()
                    .map(|node| match node {
                        Node::Layer { dots, .. } => dots.len(),
                        Node::Sprite(_) => 0,
                    })
                    .sum::<usize>()
            })
        };

        let mut effect = rocket(0.0, 100.0, (0.0, -100.0));
        effect.create(stage, 0.0).expect("created");
        effect.advance(stage, 100.0).expect("tick");
        effect.advance(stage, 150.0).expect("tick");
        assert!(sparks() > 0);

        effect.restart(1000.0);
        effect.advance(stage, 950.0).expect("tick");
        assert_eq!(effect.state(), EffectState::Pending);
        assert_eq!(sparks(), 0, "burst sparks live under 0.7s after firing");
    }

    #[test]
    fn burst_only_fires_once_per_cycle() {
        let engine = HeadlessEngine::new();
        let container = Container::new();
        let stage = Stage::new(&engine, &container);
        let journal = engine.journal();

        let mut effect = rocket(0.0, 100.0, (10.0, 10.0));
        effect.create(stage, 0.0).expect("created");
        for now in [100.0, 120.0, 140.0, 2000.0] {
            effect.advance(stage, now).expect("tick");
        }
        assert_eq!(effect.bursts_fired(), 1);
        assert_eq!(journal.count(|c| matches!(c, EngineCall::Created { .. })), 1);
    }

    #[test]
    fn marker_is_drawn_and_removed() {
        let engine = HeadlessEngine::new();
        let container = Container::new();
        let stage = Stage::new(&engine, &container);

        let mut effect = rocket(0.0, 1000.0, (0.0, -100.0));
        effect.create(stage, 0.0).expect("created");
        effect.advance(stage, 500.0).expect("tick");

        let visible = container.with_scene(|scene| {
            scene
                .draw_order()
                .any(|node| matches!(node, Node::Sprite(s) if s.visible && s.alpha == 0.5 && s.blur == 0.5))
        });
        assert!(visible);

        drop(effect);
        assert_eq!(container.with_scene(Scene::node_count), 0);
    }

    #[test]
    fn create_rejects_missing_velocity() {
        let engine = HeadlessEngine::new();
        let container = Container::new();
        let stage = Stage::new(&engine, &container);

        let record = EffectRecord::rocket(0.0, 100.0, "ffffff", (0.0, 0.0), (1.0, 1.0));
        let mut config = EffectConfig::from_record(&record).expect("valid rocket");
        config.velocity = None;
        let mut effect = BallisticEffect::new(Rc::new(config));
        assert_eq!(
            effect.create(stage, 0.0),
            Err(CreateError::Config(ConfigError::Missing("velocity")))
        );
        assert_eq!(container.with_scene(Scene::node_count), 0);
    }
}
