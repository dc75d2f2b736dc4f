//! Scene coordinator: owns the actors, the stacked tile maps, the projection and camera, and the
//! quadtree that answers spatial queries.
//!
//! Per frame the game loop calls [`Scene::update`], then [`Scene::resolve_collisions`], then
//! [`Scene::render`]. Queries return [`ActorId`]s; look actors up with [`Scene::actor`].

mod collision;
mod document;
mod lifecycle;
mod render;

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::actor::{Actor, ActorId};
use crate::content::ActorFactory;
use crate::geometry::{Rect, Vec2};
use crate::projection::{Camera, Projection, ProjectionError, RenderPerspective};
use crate::spatial::{ActorLookup, QuadTree};
use crate::tiles::TileMap;

pub use collision::clamp_actor_to_bounds;
pub use document::{ActorRecord, SceneDocument, SceneRecord, SceneSaveError};
pub use lifecycle::{ActorLifecycle, LifecyclePhase, UpdateContext};
pub use render::{render_actors, render_tile_maps, FrameView, RenderTarget, RenderWindow};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SceneConfig {
    pub tile_width: u32,
    pub tile_height: u32,
    pub max_actors_per_cell: usize,
    pub perspective: RenderPerspective,
    pub zoom: f32,
    pub camera_position: Vec2,
    pub camera_elevation: f32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            tile_width: 64,
            tile_height: 32,
            max_actors_per_cell: 8,
            perspective: RenderPerspective::Isometric,
            zoom: 1.0,
            camera_position: Vec2::ZERO,
            camera_elevation: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SceneError {
    #[error("tile dimensions must be non-zero, got {width}x{height}")]
    ZeroTileDimension { width: u32, height: u32 },
}

impl From<ProjectionError> for SceneError {
    fn from(error: ProjectionError) -> Self {
        match error {
            ProjectionError::ZeroTileDimension { width, height } => {
                SceneError::ZeroTileDimension { width, height }
            }
        }
    }
}

pub struct Scene {
    factory: Box<dyn ActorFactory>,
    lifecycle: ActorLifecycle,
    index: QuadTree,
    tile_maps: Vec<TileMap>,
    projection: Projection,
    camera: Camera,
    screen_centre: Vec2,
}

impl Scene {
    /// The quadtree covers the base map's grid, `(-0.5, -0.5, width, length)`, for the lifetime
    /// of the scene.
    pub fn new(
        config: SceneConfig,
        base_map: TileMap,
        factory: Box<dyn ActorFactory>,
    ) -> Result<Self, SceneError> {
        let projection = Projection::new(config.perspective, config.tile_width, config.tile_height)?;
        let bounds = Rect::new(-0.5, -0.5, base_map.width() as f32, base_map.length() as f32);
        let mut camera = Camera::new(&projection, config.camera_position, config.camera_elevation);
        camera.set_zoom(config.zoom);

        info!(
            width = base_map.width(),
            length = base_map.length(),
            tile_width = config.tile_width,
            tile_height = config.tile_height,
            perspective = config.perspective.document_name(),
            max_actors_per_cell = config.max_actors_per_cell,
            "scene_created"
        );

        Ok(Self {
            factory,
            lifecycle: ActorLifecycle::new(),
            index: QuadTree::new(bounds, config.max_actors_per_cell),
            tile_maps: vec![base_map],
            projection,
            camera,
            screen_centre: Vec2::ZERO,
        })
    }

    /// Runs every actor's behaviour, merges actors spawned during the pass, drops destroyed
    /// actors and re-seats moved actors in the index.
    pub fn update(&mut self, dt_seconds: f32) {
        self.lifecycle
            .update(dt_seconds, self.factory.as_ref(), &mut self.index);
        self.index.refresh(&mut self.lifecycle);
    }

    /// Clamps every actor into the scene bounds, then separates overlapping actors.
    pub fn resolve_collisions(&mut self) {
        let bounds = self.index.bounds();
        let clamped = self
            .lifecycle
            .actors_mut()
            .map(|actor| clamp_actor_to_bounds(actor, &bounds))
            .filter(|moved| *moved)
            .count();
        let separated = self.index.resolve_collisions(&mut self.lifecycle);
        if clamped > 0 || separated > 0 {
            debug!(clamped, separated, "collisions_resolved");
        }
    }

    pub fn render(&mut self, target: &mut dyn RenderTarget) {
        self.render_tile_maps(target);
        self.render_actors(target);
    }

    pub fn render_tile_maps(&mut self, target: &mut dyn RenderTarget) -> usize {
        self.screen_centre = target.screen_centre();
        render_tile_maps(&self.frame_view(), &self.tile_maps, target)
    }

    /// Draws actors back to front by the cartesian y of their position.
    pub fn render_actors(&mut self, target: &mut dyn RenderTarget) -> usize {
        self.screen_centre = target.screen_centre();
        let order = self.render_order();
        let actors = order.iter().filter_map(|id| self.lifecycle.actor(*id));
        render_actors(&self.frame_view(), actors, target)
    }

    pub fn render_order(&self) -> Vec<ActorId> {
        self.index.render_order(|id| {
            self.lifecycle
                .actor(id)
                .map(|actor| self.projection.to_cartesian(actor.position()).y)
        })
    }

    pub fn frame_view(&self) -> FrameView<'_> {
        FrameView {
            projection: &self.projection,
            camera: &self.camera,
            screen_centre: self.screen_centre,
        }
    }

    pub fn spawn_actor(&mut self, resource: &str) -> Option<ActorId> {
        self.spawn_actor_at(resource, Vec2::ZERO, 0.0)
    }

    pub fn spawn_actor_at(&mut self, resource: &str, position: Vec2, elevation: f32) -> Option<ActorId> {
        let id = self.lifecycle.spawn(
            self.factory.as_ref(),
            &mut self.index,
            resource,
            position,
            elevation,
        )?;
        debug!(actor_id = id.0, resource, "actor_spawned");
        Some(id)
    }

    /// Flags the actor; it is removed at the end of the next update.
    pub fn destroy_actor(&mut self, id: ActorId) -> bool {
        self.lifecycle.destroy(id)
    }

    pub fn clear_actors(&mut self) {
        self.lifecycle.destroy_all(&mut self.index);
    }

    pub fn raycast(&self, origin: Vec2, end: Vec2, ignore: &[ActorId]) -> Vec<ActorId> {
        self.index.raycast(origin, end, ignore, &self.lifecycle)
    }

    pub fn raycast_along(
        &self,
        origin: Vec2,
        direction: Vec2,
        distance: f32,
        ignore: &[ActorId],
    ) -> Vec<ActorId> {
        self.raycast(origin, origin + direction * distance, ignore)
    }

    pub fn raycast_first_hit(&self, origin: Vec2, end: Vec2, ignore: &[ActorId]) -> Option<ActorId> {
        self.index
            .raycast_first_hit(origin, end, ignore, &self.lifecycle)
    }

    pub fn raycast_first_hit_along(
        &self,
        origin: Vec2,
        direction: Vec2,
        distance: f32,
        ignore: &[ActorId],
    ) -> Option<ActorId> {
        self.raycast_first_hit(origin, origin + direction * distance, ignore)
    }

    /// Actor whose bounding boxes contain the world point under `screen`.
    pub fn pick_actor(&self, screen: Vec2) -> Option<ActorId> {
        let world = self.screen_to_world(screen);
        self.raycast_first_hit(world, world, &[])
    }

    pub fn world_to_screen(&self, world: Vec2, elevation: f32) -> Vec2 {
        self.frame_view().world_to_screen(world, elevation)
    }

    pub fn screen_to_world(&self, screen: Vec2) -> Vec2 {
        self.camera
            .screen_to_world(&self.projection, self.screen_centre, screen)
    }

    pub fn to_cartesian(&self, world: Vec2) -> Vec2 {
        self.projection.to_cartesian(world)
    }

    pub fn to_isometric(&self, cartesian: Vec2) -> Vec2 {
        self.projection.to_isometric(cartesian)
    }

    /// Writes the scene document atomically. Failures are logged and returned.
    pub fn serialize(&self, path: &Path) -> Result<(), SceneSaveError> {
        match self.to_document().write_to(path) {
            Ok(()) => {
                info!(
                    path = %path.display(),
                    actor_count = self.lifecycle.len(),
                    "scene_serialized"
                );
                Ok(())
            }
            Err(error) => {
                error!(path = %path.display(), error = %error, "scene_serialize_failed");
                Err(error)
            }
        }
    }

    pub fn to_document(&self) -> SceneDocument<'_> {
        SceneDocument {
            scene: SceneRecord {
                tile_width: self.projection.tile_width(),
                tile_height: self.projection.tile_height(),
                max_actors_per_cell: self.index.max_occupancy(),
                perspective: self.projection.perspective().document_name(),
                bounding_box: self.index.bounds(),
                tile_maps: &self.tile_maps,
                actors: self
                    .lifecycle
                    .actors()
                    .iter()
                    .map(|actor| ActorRecord {
                        resource: actor.resource(),
                        x: actor.position().x,
                        y: actor.position().y,
                        elevation: actor.elevation(),
                        angle: actor.angle(),
                    })
                    .collect(),
            },
        }
    }

    /// Appends a map above the existing ones and returns its layer index.
    pub fn add_tile_map(&mut self, map: TileMap) -> usize {
        self.tile_maps.push(map);
        self.tile_maps.len() - 1
    }

    pub fn tile_map(&self, index: usize) -> Option<&TileMap> {
        self.tile_maps.get(index)
    }

    pub fn tile_map_mut(&mut self, index: usize) -> Option<&mut TileMap> {
        self.tile_maps.get_mut(index)
    }

    pub fn tile_maps(&self) -> &[TileMap] {
        &self.tile_maps
    }

    /// `(width, height)` in pixels.
    pub fn tile_dimensions(&self) -> (u32, u32) {
        (self.projection.tile_width(), self.projection.tile_height())
    }

    pub fn set_tile_dimensions(&mut self, width: u32, height: u32) -> Result<(), SceneError> {
        self.projection.set_tile_dimensions(width, height)?;
        self.camera.refresh(&self.projection);
        Ok(())
    }

    pub fn max_actors_per_cell(&self) -> usize {
        self.index.max_occupancy()
    }

    pub fn set_max_actors_per_cell(&mut self, max_actors: usize, propagate: bool) {
        self.index.set_max_occupancy(max_actors, propagate);
    }

    pub fn perspective(&self) -> RenderPerspective {
        self.projection.perspective()
    }

    pub fn set_perspective(&mut self, perspective: RenderPerspective) {
        self.projection.set_perspective(perspective);
        self.camera.refresh(&self.projection);
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn set_camera_position(&mut self, position: Vec2, elevation: f32) {
        self.camera.set_position(&self.projection, position, elevation);
    }

    pub fn zoom(&self) -> f32 {
        self.camera.zoom()
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        self.camera.set_zoom(zoom);
    }

    pub fn apply_zoom_steps(&mut self, steps: i32) {
        self.camera.apply_zoom_steps(steps);
    }

    pub fn screen_centre(&self) -> Vec2 {
        self.screen_centre
    }

    /// Screen centre used by conversions between renders; `render` overwrites it from the target.
    pub fn set_screen_centre(&mut self, centre: Vec2) {
        self.screen_centre = centre;
    }

    pub fn set_screen_size(&mut self, width: u32, height: u32) {
        self.screen_centre = Vec2::new(width as f32 / 2.0, height as f32 / 2.0);
    }

    pub fn root_bounds(&self) -> Rect {
        self.index.bounds()
    }

    pub fn actor(&self, id: ActorId) -> Option<&Actor> {
        self.lifecycle.actor(id)
    }

    /// Moves made through this handle reach the index only at the next update or collision pass;
    /// until then raycasts and picks miss the actor. Use [`Scene::set_actor_position`] to move
    /// an actor that queries must see right away.
    pub fn actor_mut(&mut self, id: ActorId) -> Option<&mut Actor> {
        self.lifecycle.actor_mut(id)
    }

    /// Moves the actor and re-seats it in the index. Returns `false` for an unknown id.
    pub fn set_actor_position(&mut self, id: ActorId, position: Vec2) -> bool {
        let Some(actor) = self.lifecycle.actor_mut(id) else {
            return false;
        };
        actor.set_position(position);
        self.index.insert(actor);
        true
    }

    pub fn actors(&self) -> &[Actor] {
        self.lifecycle.actors()
    }

    pub fn actor_count(&self) -> usize {
        self.lifecycle.len()
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.lifecycle.phase()
    }
}
