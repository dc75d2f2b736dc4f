mod config;
mod demo;

use tilescene::{resolve_app_paths, run_app, LoopConfig, Scene, XmlActorFactory};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::load_viewer_config_from_env;
use crate::demo::{build_base_map, DemoDriver, SpawnerBehavior, WanderBehavior};

fn main() {
    init_tracing();
    info!("=== tilescene viewer startup ===");

    if let Err(message) = run() {
        error!(error = %message, "startup_failed");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let paths = resolve_app_paths().map_err(|error| error.to_string())?;
    let viewer_config = load_viewer_config_from_env()?;

    let factory = XmlActorFactory::new(paths.actors_dir.clone())
        .with_behavior("wander", || Box::new(WanderBehavior::default()))
        .with_behavior("spawner", || Box::new(SpawnerBehavior::default()));
    let base_map = build_base_map(viewer_config.map_width, viewer_config.map_length);
    let scene = Scene::new(viewer_config.scene.clone(), base_map, Box::new(factory))
        .map_err(|error| error.to_string())?;
    let driver = DemoDriver::new(
        paths.scene_save_path(),
        viewer_config.crate_count,
        viewer_config.wanderer_count,
        viewer_config.pan_speed_px_per_second,
    );

    run_app(LoopConfig::default(), &paths, scene, Box::new(driver))
        .map_err(|error| error.to_string())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}
