use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use roxmltree::{Document, Node};

use crate::actor::ActorSprite;
use crate::geometry::{BoundingBox, ScreenRect, Vec2};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorLoadErrorCode {
    ReadFile,
    XmlMalformed,
    InvalidRoot,
    UnknownElement,
    DuplicateElement,
    MissingAttribute,
    InvalidValue,
    UnknownBehavior,
}

#[derive(Debug, Clone)]
pub struct ActorLoadError {
    pub code: ActorLoadErrorCode,
    pub message: String,
    pub resource: String,
    pub location: Option<SourceLocation>,
}

impl ActorLoadError {
    pub fn new(code: ActorLoadErrorCode, message: impl Into<String>, resource: &str) -> Self {
        Self {
            code,
            message: message.into(),
            resource: resource.to_string(),
            location: None,
        }
    }
}

impl fmt::Display for ActorLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(
                f,
                "{:?}: {} (resource={}, line={}, column={})",
                self.code, self.message, self.resource, loc.line, loc.column
            ),
            None => write!(f, "{:?}: {} (resource={})", self.code, self.message, self.resource),
        }
    }
}

impl std::error::Error for ActorLoadError {}

/// Parsed `<Actor>` document, independent of any live actor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActorDescriptor {
    pub sprites: Vec<ActorSprite>,
    pub bounding_boxes: Vec<BoundingBox>,
    pub behavior: Option<String>,
}

/// Parses an actor descriptor:
///
/// ```xml
/// <Actor>
///   <Sprite key="hero" x="0" y="0" width="32" height="48" feetX="16" feetY="44"/>
///   <BoundingBox x="0" y="0" width="0.5" height="0.5"/>
///   <Behavior name="wander"/>
/// </Actor>
/// ```
///
/// Sprite `x`/`y` default to 0 and the feet default to the bottom centre of the mask.
/// BoundingBox `x`/`y` is the box centre relative to the actor and defaults to 0.
pub fn parse_actor_descriptor(resource: &str, raw: &str) -> Result<ActorDescriptor, ActorLoadError> {
    let doc = Document::parse(raw).map_err(|error| ActorLoadError {
        code: ActorLoadErrorCode::XmlMalformed,
        message: format!("malformed XML: {error}"),
        resource: resource.to_string(),
        location: Some(SourceLocation {
            line: error.pos().row as usize,
            column: error.pos().col as usize,
        }),
    })?;

    let cx = ParseContext { resource, doc: &doc };
    let root = doc.root_element();
    if root.tag_name().name() != "Actor" {
        return Err(cx.error_at(
            ActorLoadErrorCode::InvalidRoot,
            "root element must be <Actor>".to_string(),
            root,
        ));
    }

    let mut descriptor = ActorDescriptor::default();
    for child in root.children().filter(|node| node.is_element()) {
        match child.tag_name().name() {
            "Sprite" => descriptor.sprites.push(cx.parse_sprite(child)?),
            "BoundingBox" => descriptor.bounding_boxes.push(cx.parse_bounding_box(child)?),
            "Behavior" => {
                if descriptor.behavior.is_some() {
                    return Err(cx.error_at(
                        ActorLoadErrorCode::DuplicateElement,
                        "an actor may declare at most one <Behavior>".to_string(),
                        child,
                    ));
                }
                descriptor.behavior = Some(cx.required_attr(child, "name")?.to_string());
            }
            other => {
                return Err(cx.error_at(
                    ActorLoadErrorCode::UnknownElement,
                    format!("unknown element <{other}> in <Actor>"),
                    child,
                ))
            }
        }
    }

    Ok(descriptor)
}

struct ParseContext<'a, 'input> {
    resource: &'a str,
    doc: &'a Document<'input>,
}

impl ParseContext<'_, '_> {
    fn parse_sprite(&self, node: Node<'_, '_>) -> Result<ActorSprite, ActorLoadError> {
        self.reject_unknown_attrs(node, &["key", "x", "y", "width", "height", "feetX", "feetY"])?;
        let key = self.required_attr(node, "key")?;
        if key.trim().is_empty() {
            return Err(self.error_at(
                ActorLoadErrorCode::InvalidValue,
                "sprite key must not be empty".to_string(),
                node,
            ));
        }
        let x = self.optional_number::<i32>(node, "x")?.unwrap_or(0);
        let y = self.optional_number::<i32>(node, "y")?.unwrap_or(0);
        let width = self.required_number::<i32>(node, "width")?;
        let height = self.required_number::<i32>(node, "height")?;
        if width <= 0 || height <= 0 {
            return Err(self.error_at(
                ActorLoadErrorCode::InvalidValue,
                format!("sprite size must be positive, got {width}x{height}"),
                node,
            ));
        }
        let feet_x = self
            .optional_number::<f32>(node, "feetX")?
            .unwrap_or(width as f32 / 2.0);
        let feet_y = self
            .optional_number::<f32>(node, "feetY")?
            .unwrap_or(height as f32);

        Ok(ActorSprite {
            key: key.to_string(),
            mask: ScreenRect::new(x, y, width, height),
            feet_offset: Vec2::new(feet_x, feet_y),
        })
    }

    fn parse_bounding_box(&self, node: Node<'_, '_>) -> Result<BoundingBox, ActorLoadError> {
        self.reject_unknown_attrs(node, &["x", "y", "width", "height"])?;
        let x = self.optional_number::<f32>(node, "x")?.unwrap_or(0.0);
        let y = self.optional_number::<f32>(node, "y")?.unwrap_or(0.0);
        let width = self.required_number::<f32>(node, "width")?;
        let height = self.required_number::<f32>(node, "height")?;
        if width <= 0.0 || height <= 0.0 {
            return Err(self.error_at(
                ActorLoadErrorCode::InvalidValue,
                "bounding box size must be > 0".to_string(),
                node,
            ));
        }
        Ok(BoundingBox {
            offset: Vec2::new(x, y),
            width,
            height,
        })
    }

    fn reject_unknown_attrs(&self, node: Node<'_, '_>, allowed: &[&str]) -> Result<(), ActorLoadError> {
        let mut seen = HashSet::new();
        for attr in node.attributes() {
            if !allowed.contains(&attr.name()) || !seen.insert(attr.name()) {
                return Err(self.error_at(
                    ActorLoadErrorCode::InvalidValue,
                    format!(
                        "unexpected attribute '{}' on <{}>",
                        attr.name(),
                        node.tag_name().name()
                    ),
                    node,
                ));
            }
        }
        Ok(())
    }

    fn required_attr<'n>(&self, node: Node<'n, '_>, name: &str) -> Result<&'n str, ActorLoadError> {
        node.attribute(name).ok_or_else(|| {
            self.error_at(
                ActorLoadErrorCode::MissingAttribute,
                format!("<{}> is missing attribute '{name}'", node.tag_name().name()),
                node,
            )
        })
    }

    fn required_number<T: FromStr + Finite>(&self, node: Node<'_, '_>, name: &str) -> Result<T, ActorLoadError> {
        let raw = self.required_attr(node, name)?;
        self.parse_number(node, name, raw)
    }

    fn optional_number<T: FromStr + Finite>(
        &self,
        node: Node<'_, '_>,
        name: &str,
    ) -> Result<Option<T>, ActorLoadError> {
        node.attribute(name)
            .map(|raw| self.parse_number(node, name, raw))
            .transpose()
    }

    fn parse_number<T: FromStr + Finite>(&self, node: Node<'_, '_>, name: &str, raw: &str) -> Result<T, ActorLoadError> {
        match raw.trim().parse::<T>() {
            Ok(value) if value.finite() => Ok(value),
            _ => Err(self.error_at(
                ActorLoadErrorCode::InvalidValue,
                format!("attribute '{name}' value '{raw}' is not a valid number"),
                node,
            )),
        }
    }

    fn error_at(&self, code: ActorLoadErrorCode, message: String, node: Node<'_, '_>) -> ActorLoadError {
        let pos = self.doc.text_pos_at(node.range().start);
        ActorLoadError {
            code,
            message,
            resource: self.resource.to_string(),
            location: Some(SourceLocation {
                line: pos.row as usize,
                column: pos.col as usize,
            }),
        }
    }
}

trait Finite {
    fn finite(&self) -> bool;
}

impl Finite for f32 {
    fn finite(&self) -> bool {
        self.is_finite()
    }
}

impl Finite for i32 {
    fn finite(&self) -> bool {
        true
    }
}
