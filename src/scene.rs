//! The shared stage every effect draws into.
//!
//! Effects and emitters only hold a [`Container`] and the [`NodeId`]s they added;
//! the renderer is the only reader of the scene contents.

use crate::config::Rgb;
use std::cell::RefCell;
use std::rc::Rc;

/// Logical stage size, with the origin in the middle.
pub const WORLD_WIDTH: f64 = 1024.0;
pub const WORLD_HEIGHT: f64 = 768.0;

/// A single particle as the renderer sees it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dot {
    pub x: f32,
    pub y: f32,
    pub color: Rgb,
    pub alpha: f32,
    pub scale: f32,
}

/// A standalone visual such as a rocket marker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sprite {
    pub x: f64,
    pub y: f64,
    pub tint: Rgb,
    pub alpha: f64,
    pub blur: f64,
    pub visible: bool,
}

impl Sprite {
    pub fn hidden(x: f64, y: f64, tint: Rgb) -> Self {
        Self {
            x,
            y,
            tint,
            alpha: 0.0,
            blur: 0.0,
            visible: false,
        }
    }
}

#[derive(Debug)]
pub enum Node {
    Sprite(Sprite),
    Layer { dots: Vec<Dot>, at_back: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Default)]
pub struct Scene {
    nodes: Vec<Option<Node>>,
}

impl Scene {
    fn insert(&mut self, node: Node) -> NodeId {
        if let Some(free) = self.nodes.iter().position(Option::is_none) {
            self.nodes[free] = Some(node);
            NodeId(free)
        } else {
            self.nodes.push(Some(node));
            NodeId(self.nodes.len() - 1)
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    /// Nodes in draw order: back layers first, then sprites and front layers.
    pub fn draw_order(&self) -> impl Iterator<Item = &Node> {
        let back = self
            .nodes
            .iter()
            .flatten()
            .filter(|n| matches!(n, Node::Layer { at_back: true, .. }));
        let front = self
            .nodes
            .iter()
            .flatten()
            .filter(|n| !matches!(n, Node::Layer { at_back: true, .. }));
        back.chain(front)
    }
}

/// Cheap shared handle to a [`Scene`].
#[derive(Debug, Clone, Default)]
pub struct Container(Rc<RefCell<Scene>>);

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sprite(&self, sprite: Sprite) -> NodeId {
        self.0.borrow_mut().insert(Node::Sprite(sprite))
    }

    pub fn update_sprite(&self, id: NodeId, update: impl FnOnce(&mut Sprite)) {
        if let Some(Some(Node::Sprite(sprite))) = self.0.borrow_mut().nodes.get_mut(id.0) {
            update(sprite);
        }
    }

    pub fn add_layer(&self, at_back: bool) -> NodeId {
        self.0.borrow_mut().insert(Node::Layer {
            dots: Vec::new(),
            at_back,
        })
    }

    /// Replaces the dots of a layer with this frame's particles.
    pub fn publish_layer(&self, id: NodeId, frame: impl IntoIterator<Item = Dot>) {
        if let Some(Some(Node::Layer { dots, .. })) = self.0.borrow_mut().nodes.get_mut(id.0) {
            dots.clear();
            dots.extend(frame);
        }
    }

    pub fn remove(&self, id: NodeId) {
        if let Some(slot) = self.0.borrow_mut().nodes.get_mut(id.0) {
            *slot = None;
        }
    }

    pub fn clear(&self) {
        self.0.borrow_mut().nodes.clear();
    }

    pub fn with_scene<R>(&self, read: impl FnOnce(&Scene) -> R) -> R {
        read(&self.0.borrow())
    }
}
