use serde::Serialize;
use thiserror::Error;

use crate::geometry::ScreenRect;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TileMapError {
    #[error("tile map of {width}x{length} expects {expected} tiles, got {actual}")]
    TileCountMismatch {
        width: usize,
        length: usize,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TileLayer {
    pub sprite: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask: Option<ScreenRect>,
}

impl TileLayer {
    pub fn sprite(key: impl Into<String>) -> Self {
        Self {
            sprite: Some(key.into()),
            mask: None,
        }
    }

    pub fn with_mask(mut self, mask: ScreenRect) -> Self {
        self.mask = Some(mask);
        self
    }
}

/// Ordered layer stack: base terrain first, transitions above it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Tile {
    layers: Vec<TileLayer>,
}

impl Tile {
    pub fn new(layers: Vec<TileLayer>) -> Self {
        Self { layers }
    }

    pub fn layers(&self) -> &[TileLayer] {
        &self.layers
    }

    pub fn push_layer(&mut self, layer: TileLayer) {
        self.layers.push(layer);
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }
}

/// Row-major `width x length` grid. `x` walks columns, `y` walks rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TileMap {
    width: usize,
    length: usize,
    transitions_hidden: bool,
    tiles: Vec<Tile>,
}

impl TileMap {
    pub fn new(width: usize, length: usize) -> Self {
        Self {
            width,
            length,
            transitions_hidden: false,
            tiles: vec![Tile::default(); width * length],
        }
    }

    pub fn from_tiles(width: usize, length: usize, tiles: Vec<Tile>) -> Result<Self, TileMapError> {
        let expected = width * length;
        if tiles.len() != expected {
            return Err(TileMapError::TileCountMismatch {
                width,
                length,
                expected,
                actual: tiles.len(),
            });
        }
        Ok(Self {
            width,
            length,
            transitions_hidden: false,
            tiles,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn transitions_hidden(&self) -> bool {
        self.transitions_hidden
    }

    pub fn set_transitions_hidden(&mut self, hidden: bool) {
        self.transitions_hidden = hidden;
    }

    pub fn tile(&self, x: usize, y: usize) -> Option<&Tile> {
        self.index_of(x, y).map(|index| &self.tiles[index])
    }

    pub fn tile_mut(&mut self, x: usize, y: usize) -> Option<&mut Tile> {
        self.index_of(x, y).map(move |index| &mut self.tiles[index])
    }

    pub fn num_layers(&self, x: usize, y: usize) -> usize {
        self.tile(x, y).map_or(0, Tile::num_layers)
    }

    fn index_of(&self, x: usize, y: usize) -> Option<usize> {
        (x < self.width && y < self.length).then(|| y * self.width + x)
    }
}
