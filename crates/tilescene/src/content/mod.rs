mod descriptor;
mod factory;

pub use descriptor::{
    parse_actor_descriptor, ActorDescriptor, ActorLoadError, ActorLoadErrorCode, SourceLocation,
};
pub use factory::{ActorFactory, BehaviorConstructor, XmlActorFactory};
