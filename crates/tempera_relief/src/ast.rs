//! Template markup AST node types.

use serde::{Deserialize, Serialize};
use tempera_carton::CompactString;

/// Node type discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum NodeType {
    Root = 0,
    Element = 1,
    Text = 2,
    Comment = 3,
    Interpolation = 4,
    Attribute = 5,
    Marker = 6,
}

/// Source position in the template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Position {
    /// Byte offset from start of file
    pub offset: u32,
    /// 1-indexed line number
    pub line: u32,
    /// 1-indexed column number
    pub column: u32,
}

impl Position {
    pub const fn new(offset: u32, line: u32, column: u32) -> Self {
        Self {
            offset,
            line,
            column,
        }
    }
}

/// Source location span [start, end)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub start: Position,
    pub end: Position,
    pub source: CompactString,
}

impl Default for SourceLocation {
    fn default() -> Self {
        Self::STUB
    }
}

impl SourceLocation {
    /// Stub location for synthesized nodes
    pub const STUB: Self = Self {
        start: Position {
            offset: 0,
            line: 1,
            column: 1,
        },
        end: Position {
            offset: 0,
            line: 1,
            column: 1,
        },
        source: CompactString::const_new(""),
    };

    pub fn new(start: Position, end: Position, source: impl Into<CompactString>) -> Self {
        Self {
            start,
            end,
            source: source.into(),
        }
    }
}

/// Root of a parsed template source.
#[derive(Debug, Clone, Default)]
pub struct RootNode {
    pub children: Vec<MarkupNode>,
    pub source: CompactString,
}

impl RootNode {
    pub fn new(source: impl Into<CompactString>) -> Self {
        Self {
            children: Vec::new(),
            source: source.into(),
        }
    }

    pub fn node_type(&self) -> NodeType {
        NodeType::Root
    }
}

/// All markup child node types
#[derive(Debug, Clone)]
pub enum MarkupNode {
    Element(Box<ElementNode>),
    Text(TextNode),
    Comment(CommentNode),
    Interpolation(InterpolationNode),
}

impl MarkupNode {
    pub fn node_type(&self) -> NodeType {
        match self {
            Self::Element(_) => NodeType::Element,
            Self::Text(_) => NodeType::Text,
            Self::Comment(_) => NodeType::Comment,
            Self::Interpolation(_) => NodeType::Interpolation,
        }
    }

    pub fn loc(&self) -> &SourceLocation {
        match self {
            Self::Element(n) => &n.loc,
            Self::Text(n) => &n.loc,
            Self::Comment(n) => &n.loc,
            Self::Interpolation(n) => &n.loc,
        }
    }
}

/// Element node
#[derive(Debug, Clone)]
pub struct ElementNode {
    pub tag: CompactString,
    pub props: Vec<PropNode>,
    pub children: Vec<MarkupNode>,
    pub is_self_closing: bool,
    pub loc: SourceLocation,
}

impl ElementNode {
    pub fn new(tag: impl Into<CompactString>, loc: SourceLocation) -> Self {
        Self {
            tag: tag.into(),
            props: Vec::new(),
            children: Vec::new(),
            is_self_closing: false,
            loc,
        }
    }

    pub fn node_type(&self) -> NodeType {
        NodeType::Element
    }

    /// Value of a static attribute, `Some("")` for a bare boolean attribute.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.props.iter().find_map(|prop| match prop {
            PropNode::Attribute(attr) if attr.name == name => {
                Some(attr.value.as_deref().unwrap_or(""))
            }
            _ => None,
        })
    }

    /// Iterate over the marker attributes in source order.
    pub fn markers(&self) -> impl Iterator<Item = &MarkerNode> {
        self.props.iter().filter_map(|prop| match prop {
            PropNode::Marker(marker) => Some(marker),
            PropNode::Attribute(_) => None,
        })
    }

    /// Render the opening tag back to markup, used in diagnostics.
    pub fn opening_tag(&self) -> String {
        let mut out = String::with_capacity(self.tag.len() + 2);
        out.push('<');
        out.push_str(&self.tag);
        for prop in &self.props {
            out.push(' ');
            match prop {
                PropNode::Attribute(attr) => {
                    out.push_str(&attr.name);
                    if let Some(value) = &attr.value {
                        out.push_str("=\"");
                        out.push_str(value);
                        out.push('"');
                    }
                }
                PropNode::Marker(marker) => {
                    out.push_str(&marker.raw_name);
                    if let Some(value) = &marker.value {
                        out.push_str("=\"");
                        out.push_str(value);
                        out.push('"');
                    }
                }
            }
        }
        out.push('>');
        out
    }
}

/// Prop node (static attribute or marker attribute)
#[derive(Debug, Clone)]
pub enum PropNode {
    Attribute(AttributeNode),
    Marker(MarkerNode),
}

impl PropNode {
    pub fn loc(&self) -> &SourceLocation {
        match self {
            Self::Attribute(n) => &n.loc,
            Self::Marker(n) => &n.loc,
        }
    }
}

/// Static attribute node
#[derive(Debug, Clone)]
pub struct AttributeNode {
    pub name: CompactString,
    pub value: Option<CompactString>,
    pub loc: SourceLocation,
}

impl AttributeNode {
    pub fn new(name: impl Into<CompactString>, loc: SourceLocation) -> Self {
        Self {
            name: name.into(),
            value: None,
            loc,
        }
    }

    pub fn node_type(&self) -> NodeType {
        NodeType::Attribute
    }
}

/// Marker attribute node (`*if`, `*class`, `.value` shorthand, ...)
#[derive(Debug, Clone)]
pub struct MarkerNode {
    /// Marker name without prefix (e.g., "if", "foreach", "prop")
    pub name: CompactString,
    /// Raw attribute name including prefix (e.g., "*if", ".textContent")
    pub raw_name: CompactString,
    /// Argument carried by the attribute name itself (property shorthand)
    pub arg: Option<CompactString>,
    /// Raw binding text
    pub value: Option<CompactString>,
    pub loc: SourceLocation,
}

impl MarkerNode {
    pub fn new(name: impl Into<CompactString>, loc: SourceLocation) -> Self {
        let name = name.into();
        Self {
            raw_name: name.clone(),
            name,
            arg: None,
            value: None,
            loc,
        }
    }

    pub fn node_type(&self) -> NodeType {
        NodeType::Marker
    }
}

/// Text node
#[derive(Debug, Clone)]
pub struct TextNode {
    pub content: CompactString,
    pub loc: SourceLocation,
}

impl TextNode {
    pub fn new(content: impl Into<CompactString>, loc: SourceLocation) -> Self {
        Self {
            content: content.into(),
            loc,
        }
    }

    pub fn node_type(&self) -> NodeType {
        NodeType::Text
    }
}

/// Comment node
#[derive(Debug, Clone)]
pub struct CommentNode {
    pub content: CompactString,
    pub loc: SourceLocation,
}

impl CommentNode {
    pub fn new(content: impl Into<CompactString>, loc: SourceLocation) -> Self {
        Self {
            content: content.into(),
            loc,
        }
    }

    pub fn node_type(&self) -> NodeType {
        NodeType::Comment
    }
}

/// Interpolation node (`{{ expr }}`), content already trimmed
#[derive(Debug, Clone)]
pub struct InterpolationNode {
    pub content: CompactString,
    pub loc: SourceLocation,
}

impl InterpolationNode {
    pub fn node_type(&self) -> NodeType {
        NodeType::Interpolation
    }
}
