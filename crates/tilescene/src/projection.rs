use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::Vec2;

pub const CAMERA_ZOOM_DEFAULT: f32 = 1.0;
pub const CAMERA_ZOOM_MIN: f32 = 0.25;
pub const CAMERA_ZOOM_MAX: f32 = 4.0;
pub const CAMERA_ZOOM_STEP: f32 = 0.1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderPerspective {
    /// Axis-aligned rows and columns.
    #[default]
    Oblique,
    /// Diamond layout.
    Isometric,
}

impl RenderPerspective {
    pub fn document_name(self) -> &'static str {
        match self {
            RenderPerspective::Isometric => "isometric",
            RenderPerspective::Oblique => "orthographic",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProjectionError {
    #[error("tile dimensions must be non-zero, got {width}x{height}")]
    ZeroTileDimension { width: u32, height: u32 },
}

/// Converts between world space (tile units) and the projected cartesian space in pixels.
/// Camera and zoom are not applied here; see [`Camera`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    perspective: RenderPerspective,
    tile_width: u32,
    tile_height: u32,
    half_tile_width: f32,
    half_tile_height: f32,
}

impl Projection {
    pub fn new(
        perspective: RenderPerspective,
        tile_width: u32,
        tile_height: u32,
    ) -> Result<Self, ProjectionError> {
        let mut projection = Self {
            perspective,
            tile_width: 1,
            tile_height: 1,
            half_tile_width: 0.5,
            half_tile_height: 0.5,
        };
        projection.set_tile_dimensions(tile_width, tile_height)?;
        Ok(projection)
    }

    pub fn set_tile_dimensions(
        &mut self,
        tile_width: u32,
        tile_height: u32,
    ) -> Result<(), ProjectionError> {
        if tile_width == 0 || tile_height == 0 {
            return Err(ProjectionError::ZeroTileDimension {
                width: tile_width,
                height: tile_height,
            });
        }
        self.tile_width = tile_width;
        self.tile_height = tile_height;
        self.half_tile_width = tile_width as f32 / 2.0;
        self.half_tile_height = tile_height as f32 / 2.0;
        Ok(())
    }

    pub fn set_perspective(&mut self, perspective: RenderPerspective) {
        self.perspective = perspective;
    }

    pub fn perspective(&self) -> RenderPerspective {
        self.perspective
    }

    pub fn tile_width(&self) -> u32 {
        self.tile_width
    }

    pub fn tile_height(&self) -> u32 {
        self.tile_height
    }

    pub fn half_tile_width(&self) -> f32 {
        self.half_tile_width
    }

    pub fn half_tile_height(&self) -> f32 {
        self.half_tile_height
    }

    /// World (isometric or oblique) coordinate to cartesian pixels.
    pub fn to_cartesian(&self, world: Vec2) -> Vec2 {
        match self.perspective {
            RenderPerspective::Oblique => Vec2::new(
                world.x * self.tile_width as f32,
                world.y * self.tile_height as f32,
            ),
            RenderPerspective::Isometric => Vec2::new(
                (world.x - world.y) * self.half_tile_width,
                (world.x + world.y) * self.half_tile_height,
            ),
        }
    }

    /// Cartesian pixels back to a world (isometric or oblique) coordinate.
    pub fn to_isometric(&self, cartesian: Vec2) -> Vec2 {
        let tile_width = self.tile_width as f32;
        let tile_height = self.tile_height as f32;
        match self.perspective {
            RenderPerspective::Oblique => {
                Vec2::new(cartesian.x / tile_width, cartesian.y / tile_height)
            }
            RenderPerspective::Isometric => Vec2::new(
                cartesian.y / tile_height + cartesian.x / tile_width,
                cartesian.y / tile_height - cartesian.x / tile_width,
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    position: Vec2,
    elevation: f32,
    screen_position: Vec2,
    zoom: f32,
}

impl Camera {
    pub fn new(projection: &Projection, position: Vec2, elevation: f32) -> Self {
        let mut camera = Self {
            position,
            elevation,
            screen_position: Vec2::ZERO,
            zoom: CAMERA_ZOOM_DEFAULT,
        };
        camera.refresh(projection);
        camera
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn elevation(&self) -> f32 {
        self.elevation
    }

    /// Floored cartesian position of the camera, cached so tiles never land on sub-pixels.
    pub fn screen_position(&self) -> Vec2 {
        self.screen_position
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn set_position(&mut self, projection: &Projection, position: Vec2, elevation: f32) {
        self.position = position;
        self.elevation = elevation;
        self.refresh(projection);
    }

    /// Recomputes the cached screen position after the projection changed.
    pub fn refresh(&mut self, projection: &Projection) {
        self.screen_position = projection.to_cartesian(self.position).floor();
    }

    /// Zero is accepted and treated as "infinitely zoomed out" by the inverse projection.
    pub fn set_zoom(&mut self, zoom: f32) {
        self.zoom = if zoom.is_finite() {
            zoom.max(0.0)
        } else {
            CAMERA_ZOOM_DEFAULT
        };
    }

    pub fn apply_zoom_steps(&mut self, steps: i32) {
        if steps == 0 {
            return;
        }
        let target = self.zoom + steps as f32 * CAMERA_ZOOM_STEP;
        self.zoom = if target.is_finite() {
            target.clamp(CAMERA_ZOOM_MIN, CAMERA_ZOOM_MAX)
        } else {
            CAMERA_ZOOM_DEFAULT
        };
    }

    /// `_elevation` is accepted for API stability and currently has no vertical effect.
    pub fn world_to_screen(
        &self,
        projection: &Projection,
        screen_centre: Vec2,
        world: Vec2,
        _elevation: f32,
    ) -> Vec2 {
        (projection.to_cartesian(world) - self.screen_position) * self.zoom + screen_centre
    }

    pub fn screen_to_world(&self, projection: &Projection, screen_centre: Vec2, screen: Vec2) -> Vec2 {
        let mut offset = screen - screen_centre;
        if self.zoom != 0.0 {
            offset /= self.zoom;
        }
        projection.to_isometric(offset + self.screen_position)
    }
}
