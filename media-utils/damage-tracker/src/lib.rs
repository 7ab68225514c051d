//! Watches the drawing-primitive stream that also flows to the [Drawable]
//! and records the union of damaged areas, without itself touching pixels.

use capture_drawable::{DrawPrimitive, GraphicsSink, Rect};

/// Accepts every drawing primitive the wire decoder produces and maintains
/// the union rectangle of damage since the last [DamageTracker::reset].
#[derive(Debug, Clone)]
pub struct DamageTracker {
    bounds: Rect,
    damage: Rect,
}

impl DamageTracker {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            bounds: Rect::new(0, 0, width, height),
            damage: Rect::empty(),
        }
    }

    pub fn has_damage(&self) -> bool {
        !self.damage.is_empty()
    }

    pub fn damage(&self) -> Rect {
        self.damage
    }

    pub fn reset(&mut self) {
        self.damage = Rect::empty();
    }

    /// Called on drawable resize; also resets accumulated damage, since the
    /// old damage rectangle may no longer make sense against new bounds.
    pub fn set_area(&mut self, width: u32, height: u32) {
        self.bounds = Rect::new(0, 0, width, height);
        self.reset();
    }

    /// Forces damage to the full image, used when the capture orchestrator
    /// needs the next frame to be a full-damage keyframe (e.g. after
    /// `set_cropping` or at the start of a new sequenced segment).
    pub fn force_full_damage(&mut self) {
        self.damage = self.bounds;
    }
}

impl GraphicsSink for DamageTracker {
    fn record(&mut self, primitive: DrawPrimitive) {
        if let Some(rect) = primitive.damage_rect(self.bounds) {
            self.damage = self.damage.union(&rect);
        }
    }
}
