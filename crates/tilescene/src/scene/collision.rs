use crate::actor::Actor;
use crate::geometry::Rect;

/// Pulls every bounding box of the actor back inside `bounds`, checking left, right, top and
/// bottom in that order. Only the axis that needed correcting is written back, so an actor that
/// is already inside keeps its exact position. Returns whether the actor moved.
pub fn clamp_actor_to_bounds(actor: &mut Actor, bounds: &Rect) -> bool {
    let mut moved = false;
    for index in 0..actor.bounding_boxes().len() {
        let local = actor.bounding_boxes()[index];
        let position = actor.position();
        let world = local.world_rect(position);

        let mut x = world.x;
        let mut y = world.y;
        let mut corrected_x = false;
        let mut corrected_y = false;

        if world.left() < bounds.left() {
            x = bounds.left();
            corrected_x = true;
        }
        if x + world.width > bounds.right() {
            x = bounds.right() - world.width;
            corrected_x = true;
        }
        if world.top() < bounds.top() {
            y = bounds.top();
            corrected_y = true;
        }
        if y + world.height > bounds.bottom() {
            y = bounds.bottom() - world.height;
            corrected_y = true;
        }

        if !corrected_x && !corrected_y {
            continue;
        }
        let centre = Rect::new(x, y, world.width, world.height).centre();
        let mut next = position;
        if corrected_x {
            next.x = centre.x - local.offset.x;
        }
        if corrected_y {
            next.y = centre.y - local.offset.y;
        }
        actor.set_position(next);
        moved = true;
    }
    moved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{BoundingBox, Vec2};

    fn root() -> Rect {
        Rect::new(-0.5, -0.5, 10.0, 10.0)
    }

    fn actor_with_box(position: Vec2, offset: Vec2, width: f32, height: f32) -> Actor {
        let mut actor = Actor::unregistered("box.xml", position, 0.0);
        actor.add_bounding_box(BoundingBox {
            offset,
            width,
            height,
        });
        actor
    }

    #[test]
    fn inside_actor_is_untouched() {
        let position = Vec2::new(3.1234567, 4.7654321);
        let mut actor = actor_with_box(position, Vec2::new(0.1, -0.2), 1.0, 1.0);
        assert!(!clamp_actor_to_bounds(&mut actor, &root()));
        assert_eq!(actor.position().x.to_bits(), position.x.to_bits());
        assert_eq!(actor.position().y.to_bits(), position.y.to_bits());
    }

    #[test]
    fn left_overflow_aligns_to_left_edge() {
        let mut actor = actor_with_box(Vec2::new(-1.0, 4.0), Vec2::ZERO, 1.0, 1.0);
        assert!(clamp_actor_to_bounds(&mut actor, &root()));
        assert_eq!(actor.position(), Vec2::new(0.0, 4.0));
    }

    #[test]
    fn bottom_right_overflow_corrects_both_axes() {
        let mut actor = actor_with_box(Vec2::new(12.0, 11.0), Vec2::new(0.5, 0.0), 1.0, 2.0);
        clamp_actor_to_bounds(&mut actor, &root());
        let world = actor.bounding_boxes()[0].world_rect(actor.position());
        assert!((world.right() - 9.5).abs() < 1e-5);
        assert!((world.bottom() - 9.5).abs() < 1e-5);
    }

    #[test]
    fn box_wider_than_root_ends_right_aligned() {
        let mut actor = actor_with_box(Vec2::new(4.5, 4.5), Vec2::ZERO, 20.0, 1.0);
        clamp_actor_to_bounds(&mut actor, &root());
        let world = actor.bounding_boxes()[0].world_rect(actor.position());
        assert!((world.right() - 9.5).abs() < 1e-5);
        assert_eq!(actor.position().y, 4.5);
    }

    #[test]
    fn boxes_apply_in_order_against_current_position() {
        let mut actor = Actor::unregistered("two.xml", Vec2::new(0.0, 5.0), 0.0);
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
        clamp_actor_to_bounds(&mut actor, &root());
        // First box: left edge -1.5 -> -0.5 shifts the actor to x = 1.0.
        assert_eq!(actor.position(), Vec2::new(1.0, 5.0));
    }

    #[test]
    fn actor_without_boxes_is_ignored() {
        let mut actor = Actor::unregistered("ghost.xml", Vec2::new(-50.0, -50.0), 0.0);
        assert!(!clamp_actor_to_bounds(&mut actor, &root()));
        assert_eq!(actor.position(), Vec2::new(-50.0, -50.0));
    }
}
