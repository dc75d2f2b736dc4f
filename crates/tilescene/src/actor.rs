use std::fmt;

use crate::geometry::{BoundingBox, Rect, ScreenRect, Vec2};
use crate::scene::UpdateContext;
use crate::spatial::CellId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(pub u64);

#[derive(Debug, Default)]
pub struct ActorIdAllocator {
    next: u64,
}

impl ActorIdAllocator {
    pub fn allocate(&mut self) -> ActorId {
        let id = ActorId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

/// A sprite drawn at the actor's feet. `mask` is the source region inside the sprite image,
/// `feet_offset` the pixel inside that region that sits on the actor position.
#[derive(Debug, Clone, PartialEq)]
pub struct ActorSprite {
    pub key: String,
    pub mask: ScreenRect,
    pub feet_offset: Vec2,
}

/// Per-frame logic attached to an actor.
pub trait ActorBehavior {
    fn update(&mut self, actor: &mut Actor, dt_seconds: f32, ctx: &mut UpdateContext<'_>);
}

pub struct Actor {
    pub(crate) id: ActorId,
    resource: String,
    position: Vec2,
    elevation: f32,
    angle: f32,
    pending_destroy: bool,
    pub(crate) cell: Option<CellId>,
    bounding_boxes: Vec<BoundingBox>,
    sprites: Vec<ActorSprite>,
    behavior: Option<Box<dyn ActorBehavior>>,
}

impl fmt::Debug for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Actor")
            .field("id", &self.id)
            .field("resource", &self.resource)
            .field("position", &self.position)
            .field("elevation", &self.elevation)
            .field("angle", &self.angle)
            .field("pending_destroy", &self.pending_destroy)
            .field("cell", &self.cell)
            .field("bounding_boxes", &self.bounding_boxes)
            .field("sprites", &self.sprites)
            .field("has_behavior", &self.behavior.is_some())
            .finish()
    }
}

impl Actor {
    /// Builds an actor that has not been given an id yet; the lifecycle assigns one on admission.
    pub(crate) fn unregistered(resource: &str, position: Vec2, elevation: f32) -> Self {
        Self {
            id: ActorId(u64::MAX),
            resource: resource.to_string(),
            position,
            elevation,
            angle: 0.0,
            pending_destroy: false,
            cell: None,
            bounding_boxes: Vec::new(),
            sprites: Vec::new(),
            behavior: None,
        }
    }

    pub fn id(&self) -> ActorId {
        self.id
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec2) {
        self.position = position;
    }

    pub fn elevation(&self) -> f32 {
        self.elevation
    }

    pub fn set_elevation(&mut self, elevation: f32) {
        self.elevation = elevation;
    }

    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn set_angle(&mut self, angle: f32) {
        self.angle = angle;
    }

    pub fn is_pending_destroy(&self) -> bool {
        self.pending_destroy
    }

    /// Marks the actor for removal at the end of the current (or next) update pass.
    pub fn destroy(&mut self) {
        self.pending_destroy = true;
    }

    /// Spatial index cell the actor was placed in, or an ancestor of it after a subdivision.
    pub fn cell(&self) -> Option<CellId> {
        self.cell
    }

    pub fn bounding_boxes(&self) -> &[BoundingBox] {
        &self.bounding_boxes
    }

    pub fn add_bounding_box(&mut self, bounding_box: BoundingBox) {
        self.bounding_boxes.push(bounding_box);
    }

    pub fn sprites(&self) -> &[ActorSprite] {
        &self.sprites
    }

    pub fn add_sprite(&mut self, sprite: ActorSprite) {
        self.sprites.push(sprite);
    }

    pub fn set_behavior(&mut self, behavior: Box<dyn ActorBehavior>) {
        self.behavior = Some(behavior);
    }

    pub fn has_behavior(&self) -> bool {
        self.behavior.is_some()
    }

    pub fn world_bounding_boxes(&self) -> impl Iterator<Item = Rect> + '_ {
        self.bounding_boxes
            .iter()
            .map(move |bbox| bbox.world_rect(self.position))
    }

    /// Union of the world boxes, or a zero-sized rect at the position for actors without boxes.
    pub fn footprint(&self) -> Rect {
        self.world_bounding_boxes()
            .reduce(|acc, rect| acc.union(&rect))
            .unwrap_or(Rect::new(self.position.x, self.position.y, 0.0, 0.0))
    }

    pub(crate) fn run_behavior(&mut self, dt_seconds: f32, ctx: &mut UpdateContext<'_>) {
        if let Some(mut behavior) = self.behavior.take() {
            behavior.update(self, dt_seconds, ctx);
            if self.behavior.is_none() {
                self.behavior = Some(behavior);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocator_never_reuses_ids() {
        let mut allocator = ActorIdAllocator::default();
        assert_eq!(allocator.allocate(), ActorId(0));
        assert_eq!(allocator.allocate(), ActorId(1));
        assert_eq!(allocator.allocate(), ActorId(2));
    }

    #[test]
    fn footprint_without_boxes_is_a_point() {
        let actor = Actor::unregistered("a.xml", Vec2::new(2.0, 3.0), 0.0);
        assert_eq!(actor.footprint(), Rect::new(2.0, 3.0, 0.0, 0.0));
    }

    #[test]
    fn footprint_unions_all_boxes() {
        let mut actor = Actor::unregistered("a.xml", Vec2::new(2.0, 2.0), 0.0);
        actor.add_bounding_box(BoundingBox {
            offset: Vec2::new(-1.0, 0.0),
            width: 1.0,
            height: 1.0,
        });
        actor.add_bounding_box(BoundingBox {
            offset: Vec2::new(1.0, 0.0),
            width: 1.0,
            height: 1.0,
        });
        assert_eq!(actor.footprint(), Rect::new(0.5, 1.5, 3.0, 1.0));
    }

    #[test]
    fn destroy_only_flags() {
        let mut actor = Actor::unregistered("a.xml", Vec2::ZERO, 0.0);
        assert!(!actor.is_pending_destroy());
        actor.destroy();
        assert!(actor.is_pending_destroy());
    }
}
