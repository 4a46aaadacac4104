use serde::{Deserialize, Deserializer};
use std::fmt;

/// Name sway gives the hidden output that holds the scratchpad.
const SCRATCHPAD_OUTPUT: &str = "__i3";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum NodeType {
    #[serde(rename = "output")]
    Output,
    #[serde(rename = "con")]
    Container,
    #[serde(rename = "floating_con")]
    FloatingContainer,
    #[serde(rename = "workspace")]
    Workspace,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Rect {
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Mode {
    pub width: u32,
    pub height: u32,
}

/// One node of a window manager tree snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub node_type: NodeType,
    pub name: String,
    pub visible: bool,
    pub rect: Rect,
    pub current_mode: Option<Mode>,
    pub children: Vec<SceneNode>,
}

// Mirrors the JSON sway sends; tiled and floating children are merged after decoding.
#[derive(Deserialize)]
struct RawNode {
    #[serde(rename = "type")]
    node_type: NodeType,
    #[serde(default, deserialize_with = "nullable_string")]
    name: String,
    #[serde(default)]
    visible: Option<bool>,
    #[serde(default)]
    rect: Rect,
    #[serde(default)]
    current_mode: Option<Mode>,
    #[serde(default)]
    nodes: Vec<SceneNode>,
    #[serde(default)]
    floating_nodes: Vec<SceneNode>,
}

fn nullable_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl<'de> Deserialize<'de> for SceneNode {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawNode::deserialize(deserializer)?;
        let mut children = raw.nodes;
        children.extend(raw.floating_nodes);

        Ok(SceneNode {
            node_type: raw.node_type,
            name: raw.name,
            visible: raw.visible.unwrap_or(false),
            rect: raw.rect,
            current_mode: raw.current_mode,
            children,
        })
    }
}

impl SceneNode {
    pub fn new(node_type: NodeType, name: impl Into<String>) -> Self {
        Self {
            node_type,
            name: name.into(),
            visible: false,
            rect: Rect::default(),
            current_mode: None,
            children: Vec::new(),
        }
    }

    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn with_child(mut self, child: SceneNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Top-level output nodes of a snapshot, excluding the scratchpad.
    pub fn outputs(&self) -> impl Iterator<Item = &SceneNode> {
        self.children
            .iter()
            .filter(|n| n.node_type == NodeType::Output && n.name != SCRATCHPAD_OUTPUT)
    }

    pub fn resolution(&self) -> Resolution {
        if let Some(mode) = self.current_mode.filter(|m| m.width > 0 && m.height > 0) {
            return Resolution {
                width: mode.width,
                height: mode.height,
            };
        }
        if self.rect.width > 0 && self.rect.height > 0 {
            return Resolution {
                width: self.rect.width,
                height: self.rect.height,
            };
        }
        Resolution::default()
    }
}
