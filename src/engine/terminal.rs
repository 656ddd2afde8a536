use super::{Emitter, ParticleEngine};
use crate::error::{EngineError, EngineUnavailable};
use crate::profile::{EmissionProfile, SpawnShape};
use crate::scene::{Container, Dot, NodeId};

/// Simulates particles on the CPU and publishes them for the terminal renderer.
#[derive(Debug, Clone, Copy)]
pub struct TerminalEngine {
    cols: u16,
    rows: u16,
}

impl TerminalEngine {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }
}

impl ParticleEngine for TerminalEngine {
    fn probe(&self) -> Result<(), EngineUnavailable> {
        if self.cols == 0 || self.rows == 0 {
            return Err(EngineUnavailable(format!(
                "terminal viewport is {}x{}",
                self.cols, self.rows
            )));
        }
        Ok(())
    }

    fn create_emitter(
        &self,
        container: &Container,
        profile: &EmissionProfile,
    ) -> Result<Box<dyn Emitter>, EngineError> {
        if profile.frequency <= 0.0 || !profile.frequency.is_finite() {
            return Err(EngineError::CreateFailed(format!(
                "spawn frequency {} is not usable",
                profile.frequency
            )));
        }
        let layer = container.add_layer(profile.add_at_back);
        Ok(Box::new(TerminalEmitter {
            container: container.clone(),
            layer,
            profile: profile.clone(),
            particles: Vec::with_capacity(profile.max_particles),
            spawn_timer: 0.0,
            age: 0.0,
            emitting: true,
        }))
    }
}

struct Particle {
    x: f64,
    y: f64,
    // Unit direction of travel
    dx: f64,
    dy: f64,
    age: f64,
    lifetime: f64,
}

struct TerminalEmitter {
    container: Container,
    layer: NodeId,
    profile: EmissionProfile,
    particles: Vec<Particle>,
    spawn_timer: f64,
    age: f64,
    emitting: bool,
}

impl TerminalEmitter {
    fn spawn_wave(&mut self, born_ago: f64) {
        let profile = &self.profile;
        for _ in 0..profile.particles_per_wave {
            if self.particles.len() >= profile.max_particles {
                return;
            }
            if fastrand::f64() >= profile.spawn_chance {
                continue;
            }

            let lifetime = profile.lifetime.pick(fastrand::f64());
            if born_ago >= lifetime {
                continue;
            }

            let (offset_x, offset_y) = match profile.spawn_shape {
                SpawnShape::Circle { radius } => {
                    let angle = fastrand::f64() * std::f64::consts::TAU;
                    let r = radius * fastrand::f64().sqrt();
                    (angle.cos() * r, angle.sin() * r)
                }
                SpawnShape::Torus { inner_radius, radius } => {
                    let angle = fastrand::f64() * std::f64::consts::TAU;
                    let r = inner_radius + (radius - inner_radius) * fastrand::f64().sqrt();
                    (angle.cos() * r, angle.sin() * r)
                }
            };
            let heading = profile.rotation.pick(fastrand::f64()).to_radians();
            let (dx, dy) = (heading.cos(), heading.sin());

            // Waves that were due earlier in this update start part-way through their life
            let travelled = profile.speed.sample(0.0) * born_ago;
            self.particles.push(Particle {
                x: profile.origin.x + offset_x + dx * travelled,
                y: profile.origin.y + offset_y + dy * travelled,
                dx,
                dy,
                age: born_ago,
                lifetime,
            });
        }
    }

    fn publish(&self) {
        let profile = &self.profile;
        self.container.publish_layer(
            self.layer,
            self.particles.iter().map(|p| {
                let t = if p.lifetime > 0.0 { p.age / p.lifetime } else { 1.0 };
                Dot {
                    x: p.x as f32,
                    y: p.y as f32,
                    color: profile.color.sample(t),
                    alpha: profile.alpha.sample(t) as f32,
                    scale: profile.scale.sample(t) as f32,
                }
            }),
        );
    }
}

impl Emitter for TerminalEmitter {
    fn update(&mut self, delta_secs: f64) -> Result<(), EngineError> {
        if !delta_secs.is_finite() || delta_secs < 0.0 {
            return Err(EngineError::UpdateFailed(format!("invalid frame delta {delta_secs}")));
        }
        let dt = delta_secs;
        let speed = &self.profile.speed;

        self.particles.retain_mut(|p| {
            p.age += dt;
            if p.age >= p.lifetime {
                return false;
            }
            let v = speed.sample(p.age / p.lifetime);
            p.x += p.dx * v * dt;
            p.y += p.dy * v * dt;
            true
        });

        if self.emitting {
            let window = match self.profile.emitter_lifetime {
                Some(lifetime) => dt.min((lifetime - self.age).max(0.0)),
                None => dt,
            };
            // Time between the end of the spawn window and the end of this update
            let tail = dt - window;
            let frequency = self.profile.frequency;

            self.spawn_timer -= window;
            // Waves older than the longest particle lifetime would already be gone
            let stale = -self.spawn_timer + tail - self.profile.lifetime.max;
            if stale > 0.0 {
                self.spawn_timer += (stale / frequency).ceil() * frequency;
            }
            while self.spawn_timer <= 0.0 {
                let born_ago = -self.spawn_timer + tail;
                self.spawn_timer += frequency;
                self.spawn_wave(born_ago);
            }

            self.age += dt;
            if self
                .profile
                .emitter_lifetime
                .is_some_and(|lifetime| self.age >= lifetime)
            {
                self.emitting = false;
            }
        }

        self.publish();
        Ok(())
    }

    fn emit_once(&mut self) {
        self.emitting = true;
        self.age = 0.0;
        self.spawn_timer = 0.0;
    }

    fn stop(&mut self) {
        self.emitting = false;
    }

    fn is_emitting(&self) -> bool {
        self.emitting
    }
}

impl Drop for TerminalEmitter {
    fn drop(&mut self) {
        self.container.remove(self.layer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Vec2;
    use crate::scene::{Node, Scene};

    fn dots(container: &Container) -> usize {
        container.with_scene(|scene| {
            scene
                .draw_order()
                .map(|node| match node {
                    Node::Layer { dots, .. } => dots.len(),
                    Node::Sprite(_) => 0,
                })
                .sum()
        })
    }

    #[test]
    fn zero_sized_viewport_is_unavailable() {
        assert!(TerminalEngine::new(0, 40).probe().is_err());
        assert!(TerminalEngine::new(80, 24).probe().is_ok());
    }

    #[test]
    fn stream_spawns_and_stops() {
        let container = Container::new();
        let engine = TerminalEngine::new(80, 24);
        let mut emitter = engine
            .create_emitter(&container, &EmissionProfile::stream(Vec2::default(), (0, 255, 0), 1000.0))
            .expect("valid profile");

        emitter.update(0.05).expect("finite delta");
        assert!(dots(&container) > 0);

        emitter.stop();
        assert!(!emitter.is_emitting());
        emitter.update(0.5).expect("finite delta");
        assert_eq!(dots(&container), 0, "all stream particles live under 0.4s");
    }

    #[test]
    fn huge_gap_stays_bounded() {
        let container = Container::new();
        let engine = TerminalEngine::new(80, 24);
        let mut emitter = engine
            .create_emitter(&container, &EmissionProfile::stream(Vec2::default(), (0, 255, 0), 60_000.0))
            .expect("valid profile");

        emitter.update(10.0).expect("finite delta");
        assert!(dots(&container) <= 200);
        assert!(emitter.is_emitting());
    }

    #[test]
    fn burst_runs_out_on_its_own() {
        let container = Container::new();
        let engine = TerminalEngine::new(80, 24);
        let mut emitter = engine
            .create_emitter(&container, &EmissionProfile::burst(Vec2::new(5.0, 5.0), (255, 0, 0)))
            .expect("valid profile");

        emitter.update(0.25).expect("finite delta");
        assert!(!emitter.is_emitting());
        emitter.update(0.6).expect("finite delta");
        assert_eq!(dots(&container), 0);

        emitter.emit_once();
        emitter.update(0.05).expect("finite delta");
        assert!(dots(&container) > 0);
    }

    #[test]
    fn dropping_removes_the_layer() {
        let container = Container::new();
        let engine = TerminalEngine::new(80, 24);
        let emitter = engine
            .create_emitter(&container, &EmissionProfile::burst(Vec2::default(), (0, 0, 0)))
            .expect("valid profile");
        assert_eq!(container.with_scene(Scene::node_count), 1);
        drop(emitter);
        assert_eq!(container.with_scene(Scene::node_count), 0);
    }

    #[test]
    fn rejects_bad_deltas() {
        let container = Container::new();
        let mut emitter = TerminalEngine::new(80, 24)
            .create_emitter(&container, &EmissionProfile::burst(Vec2::default(), (0, 0, 0)))
            .expect("valid profile");
        assert!(emitter.update(f64::NAN).is_err());
        assert!(emitter.update(-1.0).is_err());
    }
}
