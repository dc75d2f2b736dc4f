use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::actor::{Actor, ActorBehavior};

use super::descriptor::{parse_actor_descriptor, ActorDescriptor, ActorLoadError, ActorLoadErrorCode};

/// Builds actors from resource identifiers. Implementations must leave no trace of a failed load
/// outside the actor they were handed.
pub trait ActorFactory {
    fn populate(&self, resource: &str, actor: &mut Actor) -> Result<(), ActorLoadError>;
}

pub type BehaviorConstructor = Box<dyn Fn() -> Box<dyn ActorBehavior>>;

/// Loads `<Actor>` descriptors from XML files under `root`. Parsed descriptors are cached by
/// resource name; behaviours are resolved by name from the registered constructors.
pub struct XmlActorFactory {
    root: PathBuf,
    behaviors: HashMap<String, BehaviorConstructor>,
    cache: RefCell<HashMap<String, ActorDescriptor>>,
}

impl XmlActorFactory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            behaviors: HashMap::new(),
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn with_behavior<F>(mut self, name: &str, constructor: F) -> Self
    where
        F: Fn() -> Box<dyn ActorBehavior> + 'static,
    {
        self.register_behavior(name, constructor);
        self
    }

    pub fn register_behavior<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn() -> Box<dyn ActorBehavior> + 'static,
    {
        self.behaviors.insert(name.to_string(), Box::new(constructor));
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn descriptor(&self, resource: &str) -> Result<ActorDescriptor, ActorLoadError> {
        if let Some(cached) = self.cache.borrow().get(resource) {
            return Ok(cached.clone());
        }

        let path = self.root.join(resource);
        let raw = fs::read_to_string(&path).map_err(|error| {
            ActorLoadError::new(
                ActorLoadErrorCode::ReadFile,
                format!("failed to read {}: {error}", path.display()),
                resource,
            )
        })?;
        let descriptor = parse_actor_descriptor(resource, &raw)?;
        if let Some(name) = descriptor.behavior.as_deref() {
            if !self.behaviors.contains_key(name) {
                return Err(ActorLoadError::new(
                    ActorLoadErrorCode::UnknownBehavior,
                    format!("behavior '{name}' is not registered"),
                    resource,
                ));
            }
        }

        debug!(
            resource,
            sprites = descriptor.sprites.len(),
            bounding_boxes = descriptor.bounding_boxes.len(),
            "actor_descriptor_loaded"
        );
        self.cache
            .borrow_mut()
            .insert(resource.to_string(), descriptor.clone());
        Ok(descriptor)
    }
}

impl ActorFactory for XmlActorFactory {
    fn populate(&self, resource: &str, actor: &mut Actor) -> Result<(), ActorLoadError> {
        let descriptor = self.descriptor(resource)?;
        let behavior = match descriptor.behavior.as_deref() {
            Some(name) => match self.behaviors.get(name) {
                Some(constructor) => Some(constructor()),
                None => {
                    return Err(ActorLoadError::new(
                        ActorLoadErrorCode::UnknownBehavior,
                        format!("behavior '{name}' is not registered"),
                        resource,
                    ))
                }
            },
            None => None,
        };

        for bounding_box in descriptor.bounding_boxes {
            actor.add_bounding_box(bounding_box);
        }
        for sprite in descriptor.sprites {
            actor.add_sprite(sprite);
        }
        if let Some(behavior) = behavior {
            actor.set_behavior(behavior);
        }
        Ok(())
    }
}
