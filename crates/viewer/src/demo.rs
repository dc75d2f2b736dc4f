use std::path::PathBuf;

use tilescene::{
    Actor, ActorBehavior, ActorId, InputSnapshot, Scene, SceneDriver, TileLayer, TileMap,
    UpdateContext, Vec2,
};
use tracing::{info, warn};

pub const HERO_RESOURCE: &str = "hero.xml";
pub const CRATE_RESOURCE: &str = "crate.xml";
pub const WANDERER_RESOURCE: &str = "wanderer.xml";
pub const SPAWNER_RESOURCE: &str = "spawner.xml";

const WANDER_SPEED_TILES_PER_SECOND: f32 = 1.5;
const WANDER_TURN_INTERVAL_SECONDS: f32 = 1.75;
const GOLDEN_ANGLE_RADIANS: f32 = 2.399_963;
const SPAWN_INTERVAL_SECONDS: f32 = 3.0;
const SPAWNER_MAX_ALIVE: usize = 4;

/// Grass field with a darker checker pattern, a stone border on the outer ring and a flower
/// overlay layer scattered across the interior.
pub fn build_base_map(width: usize, length: usize) -> TileMap {
    let mut map = TileMap::new(width, length);
    for y in 0..length {
        for x in 0..width {
            let Some(tile) = map.tile_mut(x, y) else {
                continue;
            };
            let border = x == 0 || y == 0 || x + 1 == width || y + 1 == length;
            let ground = if border {
                "stone"
            } else if (x + y) % 2 == 0 {
                "grass"
            } else {
                "grass_dark"
            };
            tile.push_layer(TileLayer::sprite(ground));
            if !border && (x * 7 + y * 13) % 11 == 0 {
                tile.push_layer(TileLayer::sprite("flowers"));
            }
        }
    }
    map
}

/// Walks in a straight line and turns by the golden angle at a fixed interval.
#[derive(Debug)]
pub struct WanderBehavior {
    heading: f32,
    turn_timer: f32,
}

impl WanderBehavior {
    pub fn new(heading: f32) -> Self {
        Self {
            heading,
            turn_timer: WANDER_TURN_INTERVAL_SECONDS,
        }
    }
}

impl Default for WanderBehavior {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl ActorBehavior for WanderBehavior {
    fn update(&mut self, actor: &mut Actor, dt_seconds: f32, _ctx: &mut UpdateContext<'_>) {
        self.turn_timer -= dt_seconds;
        if self.turn_timer <= 0.0 {
            self.turn_timer += WANDER_TURN_INTERVAL_SECONDS;
            self.heading = (self.heading + GOLDEN_ANGLE_RADIANS) % std::f32::consts::TAU;
        }
        let step = Vec2::new(self.heading.cos(), self.heading.sin())
            * (WANDER_SPEED_TILES_PER_SECOND * dt_seconds);
        actor.set_position(actor.position() + step);
        actor.set_angle(self.heading);
    }
}

/// Spawns wanderers next to itself and destroys the oldest once too many are alive.
#[derive(Debug, Default)]
pub struct SpawnerBehavior {
    timer: f32,
    spawned: Vec<ActorId>,
    spawn_count: u32,
}

impl ActorBehavior for SpawnerBehavior {
    fn update(&mut self, actor: &mut Actor, dt_seconds: f32, ctx: &mut UpdateContext<'_>) {
        self.timer += dt_seconds;
        if self.timer < SPAWN_INTERVAL_SECONDS {
            return;
        }
        self.timer -= SPAWN_INTERVAL_SECONDS;

        let angle = self.spawn_count as f32 * GOLDEN_ANGLE_RADIANS;
        self.spawn_count = self.spawn_count.wrapping_add(1);
        let position = actor.position() + Vec2::new(angle.cos(), angle.sin()) * 1.5;
        if let Some(id) = ctx.spawn(WANDERER_RESOURCE, position, actor.elevation()) {
            self.spawned.push(id);
        }
        if self.spawned.len() > SPAWNER_MAX_ALIVE {
            let oldest = self.spawned.remove(0);
            ctx.destroy(oldest);
        }
    }
}

/// Camera, picking and save controls for the demo scene.
pub struct DemoDriver {
    save_path: PathBuf,
    crate_count: usize,
    wanderer_count: usize,
    pan_speed_px_per_second: f32,
    hero: Option<ActorId>,
    selected: Option<ActorId>,
}

impl DemoDriver {
    pub fn new(
        save_path: PathBuf,
        crate_count: usize,
        wanderer_count: usize,
        pan_speed_px_per_second: f32,
    ) -> Self {
        Self {
            save_path,
            crate_count,
            wanderer_count,
            pan_speed_px_per_second,
            hero: None,
            selected: None,
        }
    }

    pub fn hero(&self) -> Option<ActorId> {
        self.hero
    }

    pub fn selected(&self) -> Option<ActorId> {
        self.selected
    }

    /// Moves the camera so the view scrolls `pixels` in screen space, whatever the perspective.
    fn pan_camera(scene: &mut Scene, pixels: Vec2) {
        if pixels == Vec2::ZERO {
            return;
        }
        let centre = scene.screen_centre();
        let world_delta = scene.screen_to_world(centre + pixels) - scene.screen_to_world(centre);
        let camera = scene.camera();
        let (position, elevation) = (camera.position(), camera.elevation());
        scene.set_camera_position(position + world_delta, elevation);
    }
}

impl SceneDriver for DemoDriver {
    fn load(&mut self, scene: &mut Scene) {
        let bounds = scene.root_bounds();
        let centre = bounds.centre();
        scene.set_camera_position(centre, 0.0);

        self.hero = scene.spawn_actor_at(HERO_RESOURCE, centre, 0.0);
        let ring = (bounds.width.min(bounds.height) * 0.3).max(1.0);
        for index in 0..self.crate_count {
            let angle = index as f32 / self.crate_count as f32 * std::f32::consts::TAU;
            let position = centre + Vec2::new(angle.cos(), angle.sin()) * ring;
            scene.spawn_actor_at(CRATE_RESOURCE, position, 0.0);
        }
        for index in 0..self.wanderer_count {
            let offset = Vec2::new(index as f32 - self.wanderer_count as f32 / 2.0, 2.0);
            scene.spawn_actor_at(WANDERER_RESOURCE, centre + offset, 0.0);
        }
        scene.spawn_actor_at(SPAWNER_RESOURCE, centre - Vec2::new(ring * 0.5, ring * 0.5), 0.0);
        info!(
            actor_count = scene.actor_count(),
            hero = ?self.hero,
            "demo_scene_populated"
        );
    }

    fn update(&mut self, dt_seconds: f32, input: &InputSnapshot, scene: &mut Scene) {
        let (width, height) = input.window_size();
        if width > 0 && height > 0 {
            scene.set_screen_size(width, height);
        }
        if input.zoom_delta_steps() != 0 {
            scene.apply_zoom_steps(input.zoom_delta_steps());
        }
        Self::pan_camera(
            scene,
            input.pan_direction() * (self.pan_speed_px_per_second * dt_seconds),
        );

        if let Some(cursor) = input.cursor_position_px() {
            if input.left_click_pressed() {
                self.selected = scene.pick_actor(cursor);
                match self.selected.and_then(|id| scene.actor(id)) {
                    Some(actor) => info!(
                        actor_id = actor.id().0,
                        resource = actor.resource(),
                        x = actor.position().x,
                        y = actor.position().y,
                        "actor_picked"
                    ),
                    None => info!(x = cursor.x, y = cursor.y, "pick_missed"),
                }
            }
            if input.right_click_pressed() {
                if let Some(id) = scene.pick_actor(cursor) {
                    if Some(id) == self.hero {
                        info!(actor_id = id.0, "hero_destroy_ignored");
                    } else if scene.destroy_actor(id) {
                        if self.selected == Some(id) {
                            self.selected = None;
                        }
                        info!(actor_id = id.0, "actor_destroy_requested");
                    }
                }
            }
        }

        if input.save_pressed() {
            // Scene::serialize logs the outcome itself.
            if scene.serialize(&self.save_path).is_err() {
                warn!(path = %self.save_path.display(), "demo_save_failed");
            }
        }
    }

    fn shutdown(&mut self, scene: &mut Scene) {
        info!(actor_count = scene.actor_count(), "demo_shutdown");
    }
}
