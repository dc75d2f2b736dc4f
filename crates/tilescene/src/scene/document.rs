use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::atomic_io::write_text_atomic;
use crate::geometry::Rect;
use crate::tiles::TileMap;

#[derive(Debug, Error)]
pub enum SceneSaveError {
    #[error("failed to encode scene document: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to write scene document {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Top-level wrapper: the written file is `{"scene": { ... }}`.
#[derive(Debug, Serialize)]
pub struct SceneDocument<'a> {
    pub scene: SceneRecord<'a>,
}

#[derive(Debug, Serialize)]
pub struct SceneRecord<'a> {
    pub tile_width: u32,
    pub tile_height: u32,
    pub max_actors_per_cell: usize,
    pub perspective: &'static str,
    pub bounding_box: Rect,
    pub tile_maps: &'a [TileMap],
    pub actors: Vec<ActorRecord<'a>>,
}

#[derive(Debug, Serialize)]
pub struct ActorRecord<'a> {
    pub resource: &'a str,
    pub x: f32,
    pub y: f32,
    pub elevation: f32,
    pub angle: f32,
}

impl SceneDocument<'_> {
    pub fn to_pretty_json(&self) -> Result<String, SceneSaveError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_to(&self, path: &Path) -> Result<(), SceneSaveError> {
        let text = self.to_pretty_json()?;
        write_text_atomic(path, &text).map_err(|source| SceneSaveError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
