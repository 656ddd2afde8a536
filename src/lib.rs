//! Looping firework display.
//!
//! Fountains and rockets are described by [`EffectRecord`]s, turned into
//! self-advancing [`Effect`]s by the [`EffectFactory`], and driven by a
//! [`DisplayScheduler`] from an external clock. Particles themselves come from a
//! [`ParticleEngine`](engine::ParticleEngine).

pub mod config;
pub mod effects;
pub mod engine;
pub mod error;
pub mod factory;
pub mod loader;
pub mod profile;
pub mod render;
pub mod scene;
pub mod scheduler;

pub use config::{EffectConfig, EffectKind, EffectRecord, Settings, Vec2};
pub use effects::{Effect, EffectState, Firework};
pub use factory::EffectFactory;
pub use profile::EmissionProfile;
pub use scene::Container;
pub use scheduler::{CreateReport, DisplayScheduler};
