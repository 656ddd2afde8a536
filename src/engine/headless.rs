//! An engine that draws nothing and writes down every call it receives.
//!
//! Backs `--headless` runs and the test suite.

use super::{Emitter, ParticleEngine};
use crate::error::{EngineError, EngineUnavailable};
use crate::profile::EmissionProfile;
use crate::scene::Container;
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum EngineCall {
    Created { emitter: usize, profile: EmissionProfile },
    Updated { emitter: usize, delta_secs: f64 },
    EmitOnce { emitter: usize },
    Stopped { emitter: usize },
    Dropped { emitter: usize },
}

/// Shared, append-only record of engine calls.
#[derive(Debug, Clone, Default)]
pub struct Journal(Rc<RefCell<Vec<EngineCall>>>);

impl Journal {
    fn push(&self, call: EngineCall) {
        self.0.borrow_mut().push(call);
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.0.borrow().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn count(&self, matches: impl Fn(&EngineCall) -> bool) -> usize {
        self.0.borrow().iter().filter(|c| matches(c)).count()
    }

    pub fn created(&self) -> Vec<(usize, EmissionProfile)> {
        self.0
            .borrow()
            .iter()
            .filter_map(|c| match c {
                EngineCall::Created { emitter, profile } => Some((*emitter, profile.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn updates(&self, id: usize) -> Vec<f64> {
        self.0
            .borrow()
            .iter()
            .filter_map(|c| match c {
                EngineCall::Updated { emitter, delta_secs } if *emitter == id => Some(*delta_secs),
                _ => None,
            })
            .collect()
    }

    pub fn stops(&self, id: usize) -> usize {
        self.count(|c| matches!(c, EngineCall::Stopped { emitter } if *emitter == id))
    }

    pub fn emit_onces(&self, id: usize) -> usize {
        self.count(|c| matches!(c, EngineCall::EmitOnce { emitter } if *emitter == id))
    }
}

#[derive(Debug, Default)]
pub struct HeadlessEngine {
    journal: Journal,
    next_id: Cell<usize>,
    failing: Rc<RefCell<HashSet<usize>>>,
    unavailable: Option<String>,
}

impl HeadlessEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// An engine whose probe always fails.
    pub fn unavailable(reason: &str) -> Self {
        Self {
            unavailable: Some(reason.to_string()),
            ..Self::default()
        }
    }

    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    /// Makes every later `update` on this emitter fail.
    pub fn fail_updates_for(&self, emitter: usize) {
        self.failing.borrow_mut().insert(emitter);
    }

    pub fn heal(&self, emitter: usize) {
        self.failing.borrow_mut().remove(&emitter);
    }
}

impl ParticleEngine for HeadlessEngine {
    fn probe(&self) -> Result<(), EngineUnavailable> {
        match &self.unavailable {
            Some(reason) => Err(EngineUnavailable(reason.clone())),
            None => Ok(()),
        }
    }

    fn create_emitter(
        &self,
        _container: &Container,
        profile: &EmissionProfile,
    ) -> Result<Box<dyn Emitter>, EngineError> {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.journal.push(EngineCall::Created {
            emitter: id,
            profile: profile.clone(),
        });
        Ok(Box::new(HeadlessEmitter {
            id,
            journal: self.journal.clone(),
            failing: self.failing.clone(),
            lifetime: profile.emitter_lifetime,
            age: 0.0,
            emitting: true,
        }))
    }
}

struct HeadlessEmitter {
    id: usize,
    journal: Journal,
    failing: Rc<RefCell<HashSet<usize>>>,
    lifetime: Option<f64>,
    age: f64,
    emitting: bool,
}

impl Emitter for HeadlessEmitter {
    fn update(&mut self, delta_secs: f64) -> Result<(), EngineError> {
        if self.failing.borrow().contains(&self.id) {
            return Err(EngineError::UpdateFailed(format!("emitter {} is rigged to fail", self.id)));
        }
        self.journal.push(EngineCall::Updated {
            emitter: self.id,
            delta_secs,
        });
        if self.emitting {
            self.age += delta_secs;
            if self.lifetime.is_some_and(|lifetime| self.age >= lifetime) {
                self.emitting = false;
            }
        }
        Ok(())
    }

    fn emit_once(&mut self) {
        self.journal.push(EngineCall::EmitOnce { emitter: self.id });
        self.emitting = true;
        self.age = 0.0;
    }

    fn stop(&mut self) {
        self.journal.push(EngineCall::Stopped { emitter: self.id });
        self.emitting = false;
    }

    fn is_emitting(&self) -> bool {
        self.emitting
    }
}

impl Drop for HeadlessEmitter {
    fn drop(&mut self) {
        self.journal.push(EngineCall::Dropped { emitter: self.id });
    }
}
