use std::ops::Range;

use crate::actor::Actor;
use crate::geometry::{ScreenRect, Vec2};
use crate::projection::{Camera, Projection};
use crate::tiles::TileMap;

/// Drawing surface the scene renders into.
pub trait RenderTarget {
    fn screen_centre(&self) -> Vec2;
    /// `mask` selects the source region of the sprite; `None` draws the whole image.
    fn render_sprite(&mut self, key: &str, dest: ScreenRect, mask: Option<ScreenRect>);
}

/// Camera, projection and screen centre captured for one frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    pub projection: &'a Projection,
    pub camera: &'a Camera,
    pub screen_centre: Vec2,
}

impl FrameView<'_> {
    pub fn world_to_screen(&self, world: Vec2, elevation: f32) -> Vec2 {
        self.camera
            .world_to_screen(self.projection, self.screen_centre, world, elevation)
    }

    pub fn render_window(&self) -> RenderWindow {
        RenderWindow::around(
            self.camera.position(),
            self.screen_centre,
            self.projection,
            self.camera.zoom(),
        )
    }
}

/// Visible tile indices. `max_*` is exclusive and not yet clamped to a particular map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderWindow {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

impl RenderWindow {
    /// Square window around the camera, sized so the whole screen is covered in either
    /// perspective. Over-covers rather than clipping visible tiles.
    pub fn around(
        camera_world: Vec2,
        screen_centre: Vec2,
        projection: &Projection,
        zoom: f32,
    ) -> Self {
        let radius = screen_centre.x / (projection.tile_width() as f32 * zoom)
            + screen_centre.y / (projection.tile_height() as f32 * zoom);
        Self {
            min_x: ((camera_world.x - radius).round() as i32).max(0),
            min_y: ((camera_world.y - radius).round() as i32).max(0),
            max_x: ((camera_world.x + radius).round() as i32).saturating_add(1),
            max_y: ((camera_world.y + radius).round() as i32).saturating_add(1),
        }
    }

    pub fn columns(&self, map: &TileMap) -> Range<usize> {
        clamp_range(self.min_x, self.max_x, map.width())
    }

    pub fn rows(&self, map: &TileMap) -> Range<usize> {
        clamp_range(self.min_y, self.max_y, map.length())
    }
}

fn clamp_range(min: i32, max: i32, extent: usize) -> Range<usize> {
    let start = usize::try_from(min).unwrap_or(0).min(extent);
    let end = usize::try_from(max).unwrap_or(0).min(extent);
    start..end.max(start)
}

/// Draws each map in stack order, walking only the visible window, rows outer.
pub fn render_tile_maps(view: &FrameView<'_>, maps: &[TileMap], target: &mut dyn RenderTarget) -> usize {
    let window = view.render_window();
    let zoom = view.camera.zoom();
    let projection = view.projection;
    let half_w = projection.half_tile_width() * zoom;
    let half_h = projection.half_tile_height() * zoom;
    let size_w = (projection.tile_width() as f32 * zoom).ceil() as i32;
    let size_h = (projection.tile_height() as f32 * zoom).ceil() as i32;

    let mut drawn = 0;
    for map in maps {
        let rows = window.rows(map);
        let columns = window.columns(map);
        if rows.is_empty() || columns.is_empty() {
            continue;
        }
        for y in rows {
            for x in columns.clone() {
                let Some(tile) = map.tile(x, y) else {
                    continue;
                };
                let screen = view.world_to_screen(Vec2::new(x as f32, y as f32), 0.0);
                let dest = ScreenRect::new(
                    (screen.x - half_w) as i32,
                    (screen.y - half_h) as i32,
                    size_w,
                    size_h,
                );
                let layers = if map.transitions_hidden() {
                    &tile.layers()[..tile.num_layers().min(1)]
                } else {
                    tile.layers()
                };
                for layer in layers {
                    if let Some(key) = layer.sprite.as_deref() {
                        target.render_sprite(key, dest, layer.mask);
                        drawn += 1;
                    }
                }
            }
        }
    }
    drawn
}

pub fn render_actors<'a>(
    view: &FrameView<'_>,
    actors: impl IntoIterator<Item = &'a Actor>,
    target: &mut dyn RenderTarget,
) -> usize {
    let zoom = view.camera.zoom();
    let mut drawn = 0;
    for actor in actors {
        let screen = view.world_to_screen(actor.position(), actor.elevation());
        for sprite in actor.sprites() {
            let dest = ScreenRect::new(
                (screen.x - sprite.feet_offset.x * zoom) as i32,
                (screen.y - sprite.feet_offset.y * zoom) as i32,
                (sprite.mask.width as f32 * zoom).ceil() as i32,
                (sprite.mask.height as f32 * zoom).ceil() as i32,
            );
            target.render_sprite(&sprite.key, dest, Some(sprite.mask));
            drawn += 1;
        }
    }
    drawn
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::actor::ActorSprite;
    use crate::projection::RenderPerspective;
    use crate::tiles::{Tile, TileLayer};

    #[derive(Debug, Default)]
    pub(crate) struct RecordingTarget {
        pub centre: Vec2,
        pub calls: Vec<(String, ScreenRect, Option<ScreenRect>)>,
    }

    impl RenderTarget for RecordingTarget {
        fn screen_centre(&self) -> Vec2 {
            self.centre
        }

        fn render_sprite(&mut self, key: &str, dest: ScreenRect, mask: Option<ScreenRect>) {
            self.calls.push((key.to_string(), dest, mask));
        }
    }

    fn uniform_map(width: usize, length: usize, layers: &[&str]) -> TileMap {
        let tiles = (0..width * length)
            .map(|_| Tile::new(layers.iter().map(|key| TileLayer::sprite(*key)).collect()))
            .collect();
        TileMap::from_tiles(width, length, tiles).expect("map")
    }

    #[test]
    fn window_matches_culling_formula() {
        let projection = Projection::new(RenderPerspective::Oblique, 32, 32).expect("projection");
        let window = RenderWindow::around(Vec2::new(5.0, 5.0), Vec2::new(400.0, 300.0), &projection, 1.0);
        // radius = 12.5 + 9.375 = 21.875
        assert_eq!(window.min_x, 0);
        assert_eq!(window.min_y, 0);
        assert_eq!(window.max_x, 28);
        assert_eq!(window.max_y, 28);

        let map = TileMap::new(10, 10);
        assert_eq!(window.columns(&map), 0..10);
        assert_eq!(window.rows(&map), 0..10);
    }

    #[test]
    fn window_outside_map_is_empty() {
        let projection = Projection::new(RenderPerspective::Oblique, 32, 32).expect("projection");
        let window = RenderWindow::around(Vec2::new(100.0, 100.0), Vec2::new(32.0, 32.0), &projection, 1.0);
        let map = TileMap::new(10, 10);
        assert!(window.columns(&map).is_empty());
    }

    #[test]
    fn zero_zoom_window_does_not_overflow() {
        let projection = Projection::new(RenderPerspective::Oblique, 32, 32).expect("projection");
        let window = RenderWindow::around(Vec2::new(1.0, 1.0), Vec2::new(400.0, 300.0), &projection, 0.0);
        let map = TileMap::new(4, 4);
        assert_eq!(window.columns(&map), 0..4);
    }

    #[test]
    fn tiles_draw_centred_on_world_position() {
        let projection = Projection::new(RenderPerspective::Oblique, 32, 32).expect("projection");
        let camera = Camera::new(&projection, Vec2::new(5.0, 5.0), 0.0);
        let view = FrameView {
            projection: &projection,
            camera: &camera,
            screen_centre: Vec2::new(400.0, 300.0),
        };
        let mut target = RecordingTarget::default();
        let drawn = render_tile_maps(&view, &[uniform_map(10, 10, &["grass"])], &mut target);
        assert_eq!(drawn, 100);

        let (_, dest, _) = target
            .calls
            .iter()
            .find(|(_, dest, _)| dest.x == 384 && dest.y == 284)
            .expect("tile under the camera");
        assert_eq!(dest.width, 32);
        assert_eq!(dest.height, 32);
        // rows outer, columns inner
        assert_eq!(target.calls[0].1, ScreenRect::new(224, 124, 32, 32));
        assert_eq!(target.calls[1].1, ScreenRect::new(256, 124, 32, 32));
    }

    #[test]
    fn hidden_transitions_draw_base_layer_only() {
        let projection = Projection::new(RenderPerspective::Isometric, 64, 32).expect("projection");
        let camera = Camera::new(&projection, Vec2::new(1.0, 1.0), 0.0);
        let view = FrameView {
            projection: &projection,
            camera: &camera,
            screen_centre: Vec2::new(320.0, 240.0),
        };
        let mut map = uniform_map(2, 2, &["sand", "sand_edge"]);

        let mut target = RecordingTarget::default();
        render_tile_maps(&view, std::slice::from_ref(&map), &mut target);
        assert_eq!(target.calls.len(), 8);
        assert_eq!(target.calls[0].0, "sand");
        assert_eq!(target.calls[1].0, "sand_edge");

        map.set_transitions_hidden(true);
        let mut target = RecordingTarget::default();
        render_tile_maps(&view, std::slice::from_ref(&map), &mut target);
        assert_eq!(target.calls.len(), 4);
        assert!(target.calls.iter().all(|(key, _, _)| key == "sand"));
    }

    #[test]
    fn layers_without_sprite_are_skipped() {
        let projection = Projection::new(RenderPerspective::Oblique, 16, 16).expect("projection");
        let camera = Camera::new(&projection, Vec2::ZERO, 0.0);
        let view = FrameView {
            projection: &projection,
            camera: &camera,
            screen_centre: Vec2::new(64.0, 64.0),
        };
        let tile = Tile::new(vec![TileLayer::default(), TileLayer::sprite("rock")]);
        let map = TileMap::from_tiles(1, 1, vec![tile]).expect("map");
        let mut target = RecordingTarget::default();
        assert_eq!(render_tile_maps(&view, &[map], &mut target), 1);
        assert_eq!(target.calls[0].0, "rock");
    }

    #[test]
    fn actor_sprite_dest_subtracts_scaled_feet_offset() {
        let projection = Projection::new(RenderPerspective::Oblique, 32, 32).expect("projection");
        let mut camera = Camera::new(&projection, Vec2::new(5.0, 5.0), 0.0);
        camera.set_zoom(2.0);
        let view = FrameView {
            projection: &projection,
            camera: &camera,
            screen_centre: Vec2::new(400.0, 300.0),
        };
        let mut actor = Actor::unregistered("hero.xml", Vec2::new(5.0, 5.0), 0.0);
        let mask = ScreenRect::new(0, 0, 15, 24);
        actor.add_sprite(ActorSprite {
            key: "hero".to_string(),
            mask,
            feet_offset: Vec2::new(8.0, 22.0),
        });

        let mut target = RecordingTarget::default();
        render_actors(&view, [&actor], &mut target);
        assert_eq!(
            target.calls,
            vec![("hero".to_string(), ScreenRect::new(384, 256, 30, 48), Some(mask))]
        );
    }
}
