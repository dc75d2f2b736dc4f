use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod actor;
pub mod app;
mod atomic_io;
pub mod content;
pub mod geometry;
pub mod projection;
pub mod scene;
pub mod spatial;
pub mod tiles;

pub use actor::{Actor, ActorBehavior, ActorId, ActorSprite};
pub use app::{run_app, AppError, InputAction, InputSnapshot, LoopConfig, SceneDriver};
pub use content::{
    parse_actor_descriptor, ActorDescriptor, ActorFactory, ActorLoadError, ActorLoadErrorCode,
    SourceLocation, XmlActorFactory,
};
pub use geometry::{BoundingBox, Rect, ScreenRect, Vec2};
pub use projection::{
    Camera, Projection, RenderPerspective, CAMERA_ZOOM_DEFAULT, CAMERA_ZOOM_MAX, CAMERA_ZOOM_MIN,
    CAMERA_ZOOM_STEP,
};
pub use scene::{
    LifecyclePhase, RenderTarget, Scene, SceneConfig, SceneError, SceneSaveError, UpdateContext,
};
pub use spatial::{ActorLookup, CellId, QuadTree};
pub use tiles::{Tile, TileLayer, TileMap, TileMapError};

pub const ROOT_ENV_VAR: &str = "TILESCENE_ROOT";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub actors_dir: PathBuf,
    pub sprites_dir: PathBuf,
    pub cache_dir: PathBuf,
}

impl AppPaths {
    fn under(root: PathBuf) -> Self {
        let assets = root.join("assets");
        Self {
            actors_dir: assets.join("actors"),
            sprites_dir: assets.join("sprites"),
            cache_dir: root.join("cache"),
            root,
        }
    }

    pub fn scene_save_path(&self) -> PathBuf {
        self.cache_dir.join("scene.json")
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("failed to create cache directory at {path}: {source}")]
    CreateCacheDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("TILESCENE_ROOT points at {path}, which has no Cargo.toml next to an assets/ directory")]
    InvalidEnvRoot { path: PathBuf },
    #[error(
        "no project root above {start_dir}; expected Cargo.toml next to an assets/ directory.\n\
Set TILESCENE_ROOT to the workspace directory."
    )]
    RootNotFound { start_dir: PathBuf },
}

/// Finds the workspace root (from `TILESCENE_ROOT`, else by walking up from the executable) and
/// makes sure the cache directory exists.
pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let root = match env::var(ROOT_ENV_VAR) {
        Ok(value) => {
            let path = normalize_path(Path::new(&value));
            if !is_project_root(&path) {
                return Err(StartupError::InvalidEnvRoot { path });
            }
            path
        }
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let start = exe.parent().unwrap_or(&exe);
            find_project_root(start).ok_or_else(|| StartupError::RootNotFound {
                start_dir: normalize_path(start),
            })?
        }
        Err(source) => {
            return Err(StartupError::EnvVar {
                var: ROOT_ENV_VAR,
                source,
            })
        }
    };

    let paths = AppPaths::under(root);
    fs::create_dir_all(&paths.cache_dir).map_err(|source| StartupError::CreateCacheDir {
        path: paths.cache_dir.clone(),
        source,
    })?;
    Ok(paths)
}

fn find_project_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|candidate| is_project_root(candidate))
        .map(normalize_path)
}

fn is_project_root(path: &Path) -> bool {
    path.join("Cargo.toml").is_file() && path.join("assets").is_dir()
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
