//! Pointer input translation
//!
//! Converts pointer and touch motion into splat commands. Input callbacks
//! never touch the simulation directly; they produce [`EngineCommand`]
//! values that the frame scheduler drains at the start of the frame, giving
//! deterministic ordering relative to the physics step.

use std::collections::VecDeque;

use glam::Vec2;
use rand::Rng;

use crate::color::generate_color;
use crate::sim::SPLAT_EPSILON;

/// Input contact classes. Touch contacts get a larger force multiplier
/// than mouse movement since touch lacks a hover-precision signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Mouse,
    Touch(u64),
}

impl PointerKind {
    /// Scale applied to displacement-derived force.
    pub fn force_multiplier(self) -> f32 {
        match self {
            PointerKind::Mouse => 0.5,
            PointerKind::Touch(_) => 2.0,
        }
    }

    /// Scale applied to the splat's dye color.
    pub fn intensity(self) -> f32 {
        match self {
            PointerKind::Mouse => 0.2,
            PointerKind::Touch(_) => 0.8,
        }
    }
}

/// One record per active contact. Reset on contact end, not destroyed, so
/// slots persist for reuse across frames.
#[derive(Debug, Clone)]
struct Pointer {
    kind: PointerKind,
    texcoord: Vec2,
    prev_texcoord: Vec2,
    delta: Vec2,
    down: bool,
    moved: bool,
    /// Set after enter/end; the next movement only records position, so a
    /// contact can not splat a huge jump from wherever it was before.
    needs_anchor: bool,
}

impl Pointer {
    fn new(kind: PointerKind) -> Self {
        Self {
            kind,
            texcoord: Vec2::ZERO,
            prev_texcoord: Vec2::ZERO,
            delta: Vec2::ZERO,
            down: false,
            moved: false,
            needs_anchor: true,
        }
    }

    fn reset(&mut self) {
        self.down = false;
        self.moved = false;
        self.delta = Vec2::ZERO;
        self.needs_anchor = true;
    }
}

/// A localized force and color injection request.
#[derive(Debug, Clone, PartialEq)]
pub struct SplatRequest {
    /// Normalized position in [0,1]^2, y up
    pub position: Vec2,
    /// Injected velocity
    pub force: Vec2,
    pub color: [f32; 3],
}

/// Commands produced outside the frame loop and drained at frame start.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    Splat(SplatRequest),
    Resize { width: u32, height: u32 },
}

/// Queue of pending commands, drained by the frame scheduler.
pub type CommandQueue = VecDeque<EngineCommand>;

/// Translates pointer motion into splat requests.
pub struct InputTranslator {
    pointers: Vec<Pointer>,
    splat_force: f32,
}

impl InputTranslator {
    /// `splat_force` is the configured force constant; a primary mouse slot
    /// always exists.
    pub fn new(splat_force: f32) -> Self {
        Self {
            pointers: vec![Pointer::new(PointerKind::Mouse)],
            splat_force,
        }
    }

    /// Contact start: mark down and re-arm the anchor rule.
    pub fn pointer_down(&mut self, kind: PointerKind) {
        let pointer = self.slot(kind);
        pointer.down = true;
        pointer.needs_anchor = true;
    }

    /// Contact enter (mouse entering the surface).
    pub fn pointer_enter(&mut self, kind: PointerKind) {
        self.slot(kind).needs_anchor = true;
    }

    /// Contact release: only the down flag clears. The record keeps its
    /// anchor, a mouse that releases without leaving continues to splat on
    /// hover.
    pub fn pointer_up(&mut self, kind: PointerKind) {
        self.slot(kind).down = false;
    }

    /// Contact end or leave: reset the record so the next contact re-arms
    /// jump prevention.
    pub fn pointer_leave(&mut self, kind: PointerKind) {
        self.slot(kind).reset();
    }

    /// Movement to a normalized position. Returns a splat request when the
    /// displacement since the previous position exceeds the epsilon in
    /// either axis; the first movement after enter/end only records.
    pub fn pointer_move<R: Rng>(&mut self, kind: PointerKind, position: Vec2, rng: &mut R) -> Option<SplatRequest> {
        let splat_force = self.splat_force;
        let pointer = self.slot(kind);

        // Touch contacts only report motion while down; a stray move event
        // after the contact ended must not splat.
        if matches!(kind, PointerKind::Touch(_)) && !pointer.down {
            return None;
        }

        if pointer.needs_anchor {
            pointer.texcoord = position;
            pointer.prev_texcoord = position;
            pointer.delta = Vec2::ZERO;
            pointer.needs_anchor = false;
            return None;
        }

        pointer.prev_texcoord = pointer.texcoord;
        pointer.texcoord = position;
        pointer.delta = pointer.texcoord - pointer.prev_texcoord;
        pointer.moved = pointer.delta.x.abs() > SPLAT_EPSILON || pointer.delta.y.abs() > SPLAT_EPSILON;
        if !pointer.moved {
            return None;
        }

        let force = pointer.delta * splat_force * kind.force_multiplier();
        let color = generate_color(rng).map(|c| c * kind.intensity());
        Some(SplatRequest {
            position,
            force,
            color,
        })
    }

    fn slot(&mut self, kind: PointerKind) -> &mut Pointer {
        let index = match self.pointers.iter().position(|p| p.kind == kind) {
            Some(index) => index,
            None => {
                self.pointers.push(Pointer::new(kind));
                self.pointers.len() - 1
            }
        };
        &mut self.pointers[index]
    }
}
