use std::fs;
use std::path::Path;

use serde::Deserialize;
use tilescene::SceneConfig;

pub const SCENE_CONFIG_ENV_VAR: &str = "TILESCENE_SCENE_CONFIG";

/// Demo setup read from the JSON file named by `TILESCENE_SCENE_CONFIG`. Every field is optional.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewerConfig {
    pub scene: SceneConfig,
    pub map_width: usize,
    pub map_length: usize,
    pub crate_count: usize,
    pub wanderer_count: usize,
    pub pan_speed_px_per_second: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            scene: SceneConfig::default(),
            map_width: 32,
            map_length: 32,
            crate_count: 6,
            wanderer_count: 4,
            pan_speed_px_per_second: 480.0,
        }
    }
}

pub fn load_viewer_config_from_env() -> Result<ViewerConfig, String> {
    match std::env::var(SCENE_CONFIG_ENV_VAR) {
        Ok(path) if !path.trim().is_empty() => load_viewer_config(Path::new(path.trim())),
        Ok(_) | Err(std::env::VarError::NotPresent) => Ok(ViewerConfig::default()),
        Err(error) => Err(format!("read {SCENE_CONFIG_ENV_VAR}: {error}")),
    }
}

pub fn load_viewer_config(path: &Path) -> Result<ViewerConfig, String> {
    let raw = fs::read_to_string(path)
        .map_err(|error| format!("read scene config '{}': {error}", path.display()))?;
    parse_viewer_config(&raw)
}

fn parse_viewer_config(raw: &str) -> Result<ViewerConfig, String> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    let config = match serde_path_to_error::deserialize::<_, ViewerConfig>(&mut deserializer) {
        Ok(config) => config,
        Err(error) => {
            let path = error.path().to_string();
            let source = error.into_inner();
            return if path.is_empty() || path == "." {
                Err(format!("parse scene config: {source}"))
            } else {
                Err(format!("parse scene config at {path}: {source}"))
            };
        }
    };
    if config.map_width == 0 || config.map_length == 0 {
        return Err(format!(
            "validation failed at map_width/map_length: expected non-zero, got {}x{}",
            config.map_width, config.map_length
        ));
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use tilescene::RenderPerspective;

    use super::*;

    #[test]
    fn empty_object_uses_defaults() {
        let config = parse_viewer_config("{}").expect("parse");
        assert_eq!(config, ViewerConfig::default());
    }

    #[test]
    fn nested_scene_fields_override_defaults() {
        let config = parse_viewer_config(
            r#"{"scene": {"tile_width": 32, "perspective": "oblique"}, "crate_count": 0}"#,
        )
        .expect("parse");
        assert_eq!(config.scene.tile_width, 32);
        assert_eq!(config.scene.tile_height, 32);
        assert_eq!(config.scene.perspective, RenderPerspective::Oblique);
        assert_eq!(config.crate_count, 0);
        assert_eq!(config.map_width, 32);
    }

    #[test]
    fn errors_name_the_offending_field() {
        let error = parse_viewer_config(r#"{"scene": {"zoom": "wide"}}"#).expect_err("bad type");
        assert!(error.contains("scene.zoom"), "{error}");

        let error = parse_viewer_config(r#"{"scene": {"tile_depth": 3}}"#).expect_err("unknown");
        assert!(error.contains("tile_depth"), "{error}");
    }

    #[test]
    fn zero_sized_map_is_rejected() {
        let error = parse_viewer_config(r#"{"map_width": 0}"#).expect_err("zero");
        assert!(error.contains("map_width"), "{error}");
    }

    #[test]
    fn config_is_read_from_file() {
        let temp = tempfile::tempdir().expect("temp");
        let path = temp.path().join("scene.json");
        fs::write(&path, r#"{"wanderer_count": 9}"#).expect("write");
        assert_eq!(load_viewer_config(&path).expect("load").wanderer_count, 9);
        assert!(load_viewer_config(&temp.path().join("missing.json")).is_err());
    }
}
