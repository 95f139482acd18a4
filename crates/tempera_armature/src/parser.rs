//! Template markup parser.
//!
//! Drives the tokenizer and assembles a [`RootNode`] tree. Parsing never
//! aborts: malformed markup produces the best tree it can plus a list of
//! [`MarkupError`]s, and callers decide whether errors are fatal.

use tempera_carton::CompactString;
use tempera_relief::ast::*;
use tempera_relief::errors::{ErrorCode, MarkupError};
use tempera_relief::options::{ParserOptions, WhitespaceStrategy};

use crate::tokenizer::{Callbacks, QuoteType, Tokenizer};

/// Parser context for building the tree
pub struct Parser<'a> {
    /// Source code
    source: &'a str,
    /// Parser options
    options: ParserOptions,
    /// Open elements
    stack: Vec<ElementNode>,
    /// Root node
    root: RootNode,
    /// Current element being parsed
    current_element: Option<CurrentElement>,
    /// Current attribute being parsed
    current_attr: Option<CurrentAttribute>,
    /// Errors collected during parsing
    errors: Vec<MarkupError>,
    /// Newline positions for calculating line/column
    newlines: Vec<usize>,
}

/// Current element being parsed
struct CurrentElement {
    tag: CompactString,
    tag_start: usize,
    is_self_closing: bool,
    props: Vec<PropNode>,
}

/// What kind of attribute name was read
enum AttributeKind {
    Static,
    Marker,
    Property,
}

/// Current attribute being parsed
struct CurrentAttribute {
    kind: AttributeKind,
    name: CompactString,
    name_start: usize,
    value_start: Option<usize>,
    value_end: Option<usize>,
}

impl<'a> Parser<'a> {
    /// Create a new parser
    pub fn new(source: &'a str) -> Self {
        Self::with_options(source, ParserOptions::default())
    }

    /// Create a new parser with options
    pub fn with_options(source: &'a str, options: ParserOptions) -> Self {
        let newlines = source
            .bytes()
            .enumerate()
            .filter(|(_, b)| *b == b'\n')
            .map(|(i, _)| i)
            .collect();
        Self {
            source,
            options,
            stack: Vec::new(),
            root: RootNode::new(source),
            current_element: None,
            current_attr: None,
            errors: Vec::new(),
            newlines,
        }
    }

    /// Parse the source and return the tree
    pub fn parse(mut self) -> (RootNode, Vec<MarkupError>) {
        let delimiter_open = self.options.delimiters.0.clone();
        let delimiter_close = self.options.delimiters.1.clone();
        let marker_prefix = self.options.marker_prefix;
        let property_prefix = self.options.property_prefix;
        let source = self.source;

        let mut tokenizer = Tokenizer::with_delimiters(
            source,
            ParserCallbacks { parser: &mut self },
            delimiter_open.as_bytes(),
            delimiter_close.as_bytes(),
        )
        .with_prefixes(marker_prefix, property_prefix);
        tokenizer.tokenize();

        self.handle_unclosed_elements();

        if self.options.whitespace == WhitespaceStrategy::Condense {
            condense_whitespace(&mut self.root.children);
        }

        (self.root, self.errors)
    }

    /// Get source slice
    fn get_source(&self, start: usize, end: usize) -> &'a str {
        &self.source[start..end]
    }

    /// Calculate position from byte offset
    fn get_pos(&self, offset: usize) -> Position {
        let line = match self.newlines.binary_search(&offset) {
            Ok(i) => i + 1,
            Err(i) => i + 1,
        };

        let column = if line == 1 {
            offset + 1
        } else {
            offset - self.newlines[line - 2]
        };

        Position::new(offset as u32, line as u32, column as u32)
    }

    /// Create a source location
    fn create_loc(&self, start: usize, end: usize) -> SourceLocation {
        let end = end.min(self.source.len());
        let start = start.min(end);
        SourceLocation::new(
            self.get_pos(start),
            self.get_pos(end),
            self.get_source(start, end),
        )
    }

    /// Add child to current context (stack top or root)
    fn add_child(&mut self, child: MarkupNode) {
        if let Some(parent) = self.stack.last_mut() {
            parent.children.push(child);
        } else {
            self.root.children.push(child);
        }
    }

    /// Handle unclosed elements at end of parsing
    fn handle_unclosed_elements(&mut self) {
        while let Some(element) = self.stack.pop() {
            self.errors.push(MarkupError::new(
                ErrorCode::MissingEndTag,
                Some(element.loc.clone()),
            ));
            self.add_child(MarkupNode::Element(Box::new(element)));
        }
    }

    fn on_text_impl(&mut self, start: usize, end: usize) {
        if start >= end {
            return;
        }
        let loc = self.create_loc(start, end);
        self.add_child(MarkupNode::Text(TextNode::new(
            self.get_source(start, end),
            loc,
        )));
    }

    fn on_interpolation_impl(&mut self, start: usize, end: usize) {
        let content = self.get_source(start, end).trim();
        let full_start = start - self.options.delimiters.0.len();
        let full_end = end + self.options.delimiters.1.len();
        let loc = self.create_loc(full_start, full_end);
        self.add_child(MarkupNode::Interpolation(InterpolationNode {
            content: content.into(),
            loc,
        }));
    }

    fn on_open_tag_name_impl(&mut self, start: usize, end: usize) {
        self.current_element = Some(CurrentElement {
            tag: self.get_source(start, end).into(),
            tag_start: start,
            is_self_closing: false,
            props: Vec::new(),
        });
    }

    fn on_open_tag_end_impl(&mut self, end: usize) {
        let Some(current) = self.current_element.take() else {
            return;
        };
        // Include < and >
        let loc = self.create_loc(current.tag_start - 1, end + 1);
        let mut element = ElementNode::new(current.tag, loc);
        element.is_self_closing = current.is_self_closing;
        element.props = current.props;

        if element.is_self_closing || (self.options.is_void_tag)(element.tag.as_str()) {
            self.add_child(MarkupNode::Element(Box::new(element)));
        } else {
            self.stack.push(element);
        }
    }

    fn on_self_closing_tag_impl(&mut self) {
        if let Some(current) = self.current_element.as_mut() {
            current.is_self_closing = true;
        }
    }

    fn on_close_tag_impl(&mut self, start: usize, end: usize) {
        let tag = self.get_source(start, end);

        let Some(i) = self
            .stack
            .iter()
            .rposition(|el| el.tag.eq_ignore_ascii_case(tag))
        else {
            if !(self.options.is_void_tag)(tag) {
                // Include </ and >
                let loc = self.create_loc(start - 2, end + 1);
                self.errors
                    .push(MarkupError::new(ErrorCode::InvalidEndTag, Some(loc)));
            }
            return;
        };

        // Everything opened after the match is implicitly closed here
        let mut popped = self.stack.split_off(i);
        for unclosed in popped.iter().skip(1) {
            self.errors.push(MarkupError::new(
                ErrorCode::MissingEndTag,
                Some(unclosed.loc.clone()),
            ));
        }
        while popped.len() > 1 {
            let Some(child) = popped.pop() else { break };
            if let Some(parent) = popped.last_mut() {
                parent.children.push(MarkupNode::Element(Box::new(child)));
            }
        }
        if let Some(element) = popped.pop() {
            self.add_child(MarkupNode::Element(Box::new(element)));
        }
    }

    fn start_attribute(&mut self, kind: AttributeKind, start: usize, end: usize) {
        self.current_attr = Some(CurrentAttribute {
            kind,
            name: self.get_source(start, end).into(),
            name_start: start,
            value_start: None,
            value_end: None,
        });
    }

    fn on_attrib_data_impl(&mut self, start: usize, end: usize) {
        if let Some(attr) = self.current_attr.as_mut() {
            if attr.value_start.is_none() {
                attr.value_start = Some(start);
            }
            attr.value_end = Some(end);
        }
    }

    fn on_attrib_end_impl(&mut self, quote: QuoteType, end: usize) {
        let Some(attr) = self.current_attr.take() else {
            return;
        };

        let value: Option<CompactString> = match (attr.value_start, attr.value_end) {
            (Some(v_start), Some(v_end)) => Some(self.get_source(v_start, v_end).into()),
            // alt="" is an empty string, not a boolean attribute
            _ if matches!(quote, QuoteType::Double | QuoteType::Single) => Some("".into()),
            _ => None,
        };

        let prefix_len = match attr.kind {
            AttributeKind::Static => 0,
            AttributeKind::Marker | AttributeKind::Property => 1,
        };
        let closing_quote = usize::from(matches!(quote, QuoteType::Double | QuoteType::Single));
        let loc = self.create_loc(attr.name_start - prefix_len, end + closing_quote);

        let prop = match attr.kind {
            AttributeKind::Static => {
                let mut node = AttributeNode::new(attr.name, loc);
                node.value = value;
                PropNode::Attribute(node)
            }
            AttributeKind::Marker => {
                let mut node = MarkerNode::new(attr.name.clone(), loc);
                node.raw_name = format_raw(self.options.marker_prefix, &attr.name);
                node.value = value;
                PropNode::Marker(node)
            }
            AttributeKind::Property => {
                let mut node = MarkerNode::new("prop", loc);
                node.raw_name = format_raw(self.options.property_prefix, &attr.name);
                node.arg = Some(attr.name);
                node.value = value;
                PropNode::Marker(node)
            }
        };

        if let Some(current) = self.current_element.as_mut() {
            current.props.push(prop);
        }
    }

    fn on_comment_impl(&mut self, start: usize, end: usize) {
        if !self.options.comments {
            return;
        }
        // Include <!-- and -->
        let loc = self.create_loc(start.saturating_sub(4), end + 3);
        self.add_child(MarkupNode::Comment(CommentNode::new(
            self.get_source(start, end),
            loc,
        )));
    }

    fn on_error_impl(&mut self, code: ErrorCode, index: usize) {
        let loc = self.create_loc(index, index + 1);
        self.errors.push(MarkupError::new(code, Some(loc)));
    }
}

fn format_raw(prefix: u8, name: &str) -> CompactString {
    let mut raw = CompactString::with_capacity(name.len() + 1);
    raw.push(prefix as char);
    raw.push_str(name);
    raw
}

/// Wrapper struct for implementing Callbacks
struct ParserCallbacks<'a, 'p> {
    parser: &'p mut Parser<'a>,
}

impl<'a, 'p> Callbacks for ParserCallbacks<'a, 'p> {
    fn on_text(&mut self, start: usize, end: usize) {
        self.parser.on_text_impl(start, end);
    }

    fn on_interpolation(&mut self, start: usize, end: usize) {
        self.parser.on_interpolation_impl(start, end);
    }

    fn on_open_tag_name(&mut self, start: usize, end: usize) {
        self.parser.on_open_tag_name_impl(start, end);
    }

    fn on_open_tag_end(&mut self, end: usize) {
        self.parser.on_open_tag_end_impl(end);
    }

    fn on_self_closing_tag(&mut self, end: usize) {
        self.parser.on_self_closing_tag_impl();
        self.parser.on_open_tag_end_impl(end);
    }

    fn on_close_tag(&mut self, start: usize, end: usize) {
        self.parser.on_close_tag_impl(start, end);
    }

    fn on_attrib_data(&mut self, start: usize, end: usize) {
        self.parser.on_attrib_data_impl(start, end);
    }

    fn on_attrib_end(&mut self, quote: QuoteType, end: usize) {
        self.parser.on_attrib_end_impl(quote, end);
    }

    fn on_attrib_name(&mut self, start: usize, end: usize) {
        self.parser
            .start_attribute(AttributeKind::Static, start, end);
    }

    fn on_marker_name(&mut self, start: usize, end: usize) {
        self.parser
            .start_attribute(AttributeKind::Marker, start, end);
    }

    fn on_property_name(&mut self, start: usize, end: usize) {
        self.parser
            .start_attribute(AttributeKind::Property, start, end);
    }

    fn on_comment(&mut self, start: usize, end: usize) {
        self.parser.on_comment_impl(start, end);
    }

    fn on_end(&mut self) {
        // End of input
    }

    fn on_error(&mut self, code: ErrorCode, index: usize) {
        self.parser.on_error_impl(code, index);
    }
}

/// Condense whitespace in children
fn condense_whitespace(children: &mut Vec<MarkupNode>) {
    let mut i = 0;
    while i < children.len() {
        let action = if let MarkupNode::Text(ref text) = children[i] {
            let content = text.content.as_str();
            if content.chars().all(char::is_whitespace) {
                let prev_is_text = i > 0
                    && matches!(
                        children[i - 1],
                        MarkupNode::Text(_) | MarkupNode::Interpolation(_)
                    );
                let next_is_text = i + 1 < children.len()
                    && matches!(
                        children[i + 1],
                        MarkupNode::Text(_) | MarkupNode::Interpolation(_)
                    );

                if !prev_is_text && !next_is_text {
                    // Indentation between block elements disappears, inline
                    // spacing collapses to one space
                    if content.contains('\n') {
                        WhitespaceAction::Remove
                    } else {
                        WhitespaceAction::Condense
                    }
                } else {
                    WhitespaceAction::Keep
                }
            } else {
                WhitespaceAction::Keep
            }
        } else {
            WhitespaceAction::Keep
        };

        match action {
            WhitespaceAction::Remove => {
                children.remove(i);
                continue;
            }
            WhitespaceAction::Condense => {
                if let MarkupNode::Text(ref mut text) = children[i] {
                    text.content = " ".into();
                }
            }
            WhitespaceAction::Keep => {}
        }

        if let MarkupNode::Element(ref mut el) = children[i] {
            condense_whitespace(&mut el.children);
        }

        i += 1;
    }
}

/// Action to take for a whitespace-only text node during condensing
enum WhitespaceAction {
    /// Keep the node as-is
    Keep,
    /// Remove the node entirely
    Remove,
    /// Condense to a single space
    Condense,
}

/// Parse a template
pub fn parse(source: &str) -> (RootNode, Vec<MarkupError>) {
    Parser::new(source).parse()
}

/// Parse a template with options
pub fn parse_with_options(source: &str, options: ParserOptions) -> (RootNode, Vec<MarkupError>) {
    Parser::with_options(source, options).parse()
}
