//! Particle engine seam.
//!
//! Effects never simulate particles themselves: they build an
//! [`EmissionProfile`] and drive an [`Emitter`] obtained from whichever
//! [`ParticleEngine`] the display was started with.

use crate::error::{EngineError, EngineUnavailable};
use crate::profile::EmissionProfile;
use crate::scene::Container;

pub mod headless;
pub mod terminal;

pub use headless::{EngineCall, HeadlessEngine, Journal};
pub use terminal::TerminalEngine;

pub trait ParticleEngine {
    /// Checks that the engine can serve a display at all.
    fn probe(&self) -> Result<(), EngineUnavailable>;

    fn create_emitter(
        &self,
        container: &Container,
        profile: &EmissionProfile,
    ) -> Result<Box<dyn Emitter>, EngineError>;
}

/// A live particle source. Dropping it removes its particles from the scene.
pub trait Emitter {
    /// Advances particles and spawning by `delta_secs`.
    fn update(&mut self, delta_secs: f64) -> Result<(), EngineError>;
    /// Re-arms spawning for one emitter lifetime.
    fn emit_once(&mut self);
    /// Stops spawning; live particles keep going until they expire.
    fn stop(&mut self);
    fn is_emitting(&self) -> bool;
}

/// What an effect needs from its surroundings to run.
#[derive(Clone, Copy)]
pub struct Stage<'a> {
    pub engine: &'a dyn ParticleEngine,
    pub container: &'a Container,
}

impl<'a> Stage<'a> {
    pub fn new(engine: &'a dyn ParticleEngine, container: &'a Container) -> Self {
        Self { engine, container }
    }

    pub fn create_emitter(&self, profile: &EmissionProfile) -> Result<Box<dyn Emitter>, EngineError> {
        self.engine.create_emitter(self.container, profile)
    }
}
