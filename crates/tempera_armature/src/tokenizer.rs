//! Markup tokenizer for Tempera templates.
//!
//! A byte-level state machine in the style of htmlparser2. It reports spans
//! through [`Callbacks`] and never allocates; building nodes is the parser's
//! job.

use tempera_relief::{ErrorCode, Position};

/// Which flavour of attribute name is being read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    /// `class`, `id`, ...
    Plain,
    /// `*foreach`: prefix excluded from the span
    Marker,
    /// `.value`: prefix excluded from the span
    Property,
}

/// Tokenizer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Text,

    /// Matched `n` bytes of the opening delimiter
    DelimiterOpen(usize),
    Interpolation,
    /// Matched `n` bytes of the closing delimiter
    DelimiterClose(usize),

    TagOpen,
    TagName,
    SelfClosing,
    EndTagOpen,
    EndTagName,
    AfterEndTagName,

    BeforeAttrName,
    AttrName(NameKind),
    AfterAttrName,
    BeforeAttrValue,
    /// Inside a quoted value; carries the quote byte
    QuotedValue(u8),
    UnquotedValue,

    /// `<!` that turned out not to be a comment
    BangOpen,
    /// `<!-` waiting for the second dash
    CommentOpen,
    Comment,
    /// `<!DOCTYPE ...>` and `<? ... ?>`: skipped up to `>`
    Bogus,
}

/// How an attribute value was written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum QuoteType {
    NoValue = 0,
    Unquoted = 1,
    Single = 2,
    Double = 3,
}

/// Span sink driven by the [`Tokenizer`]
pub trait Callbacks {
    fn on_text(&mut self, start: usize, end: usize);

    fn on_interpolation(&mut self, start: usize, end: usize);

    fn on_open_tag_name(&mut self, start: usize, end: usize);
    fn on_open_tag_end(&mut self, end: usize);
    fn on_self_closing_tag(&mut self, end: usize);
    fn on_close_tag(&mut self, start: usize, end: usize);

    fn on_attrib_data(&mut self, start: usize, end: usize);
    fn on_attrib_end(&mut self, quote: QuoteType, end: usize);
    fn on_attrib_name(&mut self, start: usize, end: usize);

    /// Marker attribute name, prefix excluded (`*foreach` reports `foreach`).
    fn on_marker_name(&mut self, start: usize, end: usize);
    /// Property shorthand name, prefix excluded (`.value` reports `value`).
    fn on_property_name(&mut self, start: usize, end: usize);

    fn on_comment(&mut self, start: usize, end: usize);

    fn on_end(&mut self);
    fn on_error(&mut self, code: ErrorCode, index: usize);
}

#[inline]
pub fn is_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\n' | b'\t' | b'\r' | 0x0C)
}

#[inline]
fn ends_name(c: u8) -> bool {
    c == b'/' || c == b'>' || is_whitespace(c)
}

/// Markup tokenizer
pub struct Tokenizer<'a, C: Callbacks> {
    input: &'a [u8],
    state: State,
    /// Start of the span being read
    start: usize,
    index: usize,
    newlines: Vec<usize>,
    callbacks: C,
    open: &'a [u8],
    close: &'a [u8],
    marker_prefix: u8,
    property_prefix: u8,
}

impl<'a, C: Callbacks> Tokenizer<'a, C> {
    /// Tokenizer with `{{ }}` delimiters and `*`/`.` prefixes
    pub fn new(input: &'a str, callbacks: C) -> Self {
        Self::with_delimiters(input, callbacks, b"{{", b"}}")
    }

    pub fn with_delimiters(input: &'a str, callbacks: C, open: &'a [u8], close: &'a [u8]) -> Self {
        Self {
            input: input.as_bytes(),
            state: State::Text,
            start: 0,
            index: 0,
            newlines: Vec::new(),
            callbacks,
            open,
            close,
            marker_prefix: b'*',
            property_prefix: b'.',
        }
    }

    /// Override the marker and property shorthand prefixes
    pub fn with_prefixes(mut self, marker_prefix: u8, property_prefix: u8) -> Self {
        self.marker_prefix = marker_prefix;
        self.property_prefix = property_prefix;
        self
    }

    /// Line and column of a byte offset already consumed by [`Tokenizer::tokenize`].
    pub fn get_pos(&self, index: usize) -> Position {
        let line = self.newlines.partition_point(|&nl| nl < index);
        let column = match line {
            0 => index + 1,
            n => index - self.newlines[n - 1],
        };
        Position {
            offset: index as u32,
            line: line as u32 + 1,
            column: column as u32,
        }
    }

    pub fn tokenize(&mut self) {
        while self.index < self.input.len() {
            let c = self.input[self.index];
            if c == b'\n' {
                self.newlines.push(self.index);
            }
            self.step(c);
            self.index += 1;
        }
        self.finish();
        self.callbacks.on_end();
    }

    fn step(&mut self, c: u8) {
        match self.state {
            State::Text => self.text(c),
            State::DelimiterOpen(matched) => self.delimiter_open(c, matched),
            State::Interpolation => self.interpolation(c),
            State::DelimiterClose(matched) => self.delimiter_close(c, matched),
            State::TagOpen => self.tag_open(c),
            State::TagName => {
                if ends_name(c) {
                    self.callbacks.on_open_tag_name(self.start, self.index);
                    self.state = State::BeforeAttrName;
                    self.before_attr_name(c);
                }
            }
            State::SelfClosing => {
                if c == b'>' {
                    self.callbacks.on_self_closing_tag(self.index);
                    self.resume_text();
                } else if !is_whitespace(c) {
                    self.state = State::BeforeAttrName;
                    self.before_attr_name(c);
                }
            }
            State::EndTagOpen => {
                if c == b'>' {
                    self.callbacks.on_error(ErrorCode::MissingEndTagName, self.index);
                    self.resume_text();
                } else if !is_whitespace(c) {
                    self.state = State::EndTagName;
                    self.start = self.index;
                }
            }
            State::EndTagName => {
                if c == b'>' || is_whitespace(c) {
                    self.callbacks.on_close_tag(self.start, self.index);
                    if c == b'>' {
                        self.resume_text();
                    } else {
                        self.state = State::AfterEndTagName;
                    }
                }
            }
            State::AfterEndTagName | State::Bogus => {
                if c == b'>' {
                    self.resume_text();
                }
            }
            State::BeforeAttrName => self.before_attr_name(c),
            State::AttrName(kind) => {
                if c == b'=' || ends_name(c) {
                    self.emit_name(kind);
                    self.state = State::AfterAttrName;
                    self.after_attr_name(c);
                }
            }
            State::AfterAttrName => self.after_attr_name(c),
            State::BeforeAttrValue => match c {
                b'"' | b'\'' => {
                    self.state = State::QuotedValue(c);
                    self.start = self.index + 1;
                }
                c if is_whitespace(c) => {}
                _ => {
                    self.state = State::UnquotedValue;
                    self.start = self.index;
                    self.unquoted_value(c);
                }
            },
            State::QuotedValue(quote) => {
                if c == quote {
                    let kind = if quote == b'"' { QuoteType::Double } else { QuoteType::Single };
                    self.emit_value(kind);
                }
            }
            State::UnquotedValue => self.unquoted_value(c),
            State::BangOpen => {
                self.state = if c == b'-' { State::CommentOpen } else { State::Bogus };
            }
            State::CommentOpen => {
                if c == b'-' {
                    self.state = State::Comment;
                    self.start = self.index + 1;
                } else {
                    self.state = State::Bogus;
                }
            }
            State::Comment => {
                if self.input[self.index..].starts_with(b"-->") {
                    self.callbacks.on_comment(self.start, self.index);
                    self.index += 2;
                    self.resume_text();
                }
            }
        }
    }

    fn resume_text(&mut self) {
        self.state = State::Text;
        self.start = self.index + 1;
    }

    fn text(&mut self, c: u8) {
        if c == b'<' {
            if self.index > self.start {
                self.callbacks.on_text(self.start, self.index);
            }
            self.state = State::TagOpen;
            self.start = self.index;
        } else if c == self.open[0] {
            self.delimiter_open(c, 0);
        }
    }

    fn delimiter_open(&mut self, c: u8, matched: usize) {
        if c != self.open[matched] {
            self.state = State::Text;
            self.text(c);
            return;
        }
        if matched + 1 < self.open.len() {
            self.state = State::DelimiterOpen(matched + 1);
            return;
        }
        let text_end = self.index + 1 - self.open.len();
        if text_end > self.start {
            self.callbacks.on_text(self.start, text_end);
        }
        self.start = self.index + 1;
        self.state = State::Interpolation;
    }

    fn interpolation(&mut self, c: u8) {
        if c == self.close[0] {
            self.delimiter_close(c, 0);
        }
    }

    fn delimiter_close(&mut self, c: u8, matched: usize) {
        if c != self.close[matched] {
            self.state = State::Interpolation;
            self.interpolation(c);
            return;
        }
        if matched + 1 < self.close.len() {
            self.state = State::DelimiterClose(matched + 1);
            return;
        }
        let end = self.index + 1 - self.close.len();
        self.callbacks.on_interpolation(self.start, end);
        self.resume_text();
    }

    fn tag_open(&mut self, c: u8) {
        match c {
            b'!' => self.state = State::BangOpen,
            b'?' => self.state = State::Bogus,
            b'/' => self.state = State::EndTagOpen,
            c if c.is_ascii_alphabetic() => {
                self.state = State::TagName;
                self.start = self.index;
            }
            // `a < b` in text
            _ => {
                self.state = State::Text;
                self.text(c);
            }
        }
    }

    fn before_attr_name(&mut self, c: u8) {
        match c {
            b'>' => {
                self.callbacks.on_open_tag_end(self.index);
                self.resume_text();
            }
            b'/' => self.state = State::SelfClosing,
            c if is_whitespace(c) => {}
            _ => self.start_name(c),
        }
    }

    fn start_name(&mut self, c: u8) {
        let kind = if c == self.marker_prefix {
            NameKind::Marker
        } else if c == self.property_prefix {
            NameKind::Property
        } else {
            NameKind::Plain
        };
        self.start = match kind {
            NameKind::Plain => self.index,
            NameKind::Marker | NameKind::Property => self.index + 1,
        };
        self.state = State::AttrName(kind);
    }

    fn emit_name(&mut self, kind: NameKind) {
        let (start, end) = (self.start, self.index);
        match kind {
            NameKind::Plain => self.callbacks.on_attrib_name(start, end),
            NameKind::Marker | NameKind::Property => {
                if start == end {
                    self.callbacks.on_error(ErrorCode::MissingMarkerName, end);
                }
                if kind == NameKind::Marker {
                    self.callbacks.on_marker_name(start, end);
                } else {
                    self.callbacks.on_property_name(start, end);
                }
            }
        }
    }

    fn after_attr_name(&mut self, c: u8) {
        match c {
            b'=' => self.state = State::BeforeAttrValue,
            b'/' | b'>' => {
                self.callbacks.on_attrib_end(QuoteType::NoValue, self.index);
                self.state = State::BeforeAttrName;
                self.before_attr_name(c);
            }
            c if is_whitespace(c) => {}
            _ => {
                self.callbacks.on_attrib_end(QuoteType::NoValue, self.index);
                self.start_name(c);
            }
        }
    }

    fn unquoted_value(&mut self, c: u8) {
        if is_whitespace(c) || c == b'>' {
            self.emit_value(QuoteType::Unquoted);
            self.before_attr_name(c);
        } else if c == b'/' {
            self.emit_value(QuoteType::Unquoted);
            self.state = State::SelfClosing;
        }
    }

    fn emit_value(&mut self, quote: QuoteType) {
        if self.start < self.index {
            self.callbacks.on_attrib_data(self.start, self.index);
        }
        self.callbacks.on_attrib_end(quote, self.index);
        self.start = self.index + 1;
        self.state = State::BeforeAttrName;
    }

    /// Flush whatever the input ended in the middle of.
    fn finish(&mut self) {
        let end = self.index;
        match self.state {
            State::Text | State::DelimiterOpen(_) => {
                if self.start < end {
                    self.callbacks.on_text(self.start, end);
                }
            }
            State::Interpolation | State::DelimiterClose(_) => {
                self.callbacks.on_error(ErrorCode::UnterminatedInterpolation, self.start);
                let start = self.start.saturating_sub(self.open.len());
                self.callbacks.on_text(start, end);
            }
            State::Comment => {
                self.callbacks.on_error(ErrorCode::EofInComment, end);
                self.callbacks.on_comment(self.start, end);
            }
            State::TagOpen
            | State::AfterEndTagName
            | State::BangOpen
            | State::CommentOpen
            | State::Bogus => {}
            _ => self.callbacks.on_error(ErrorCode::EofInTag, end),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder<'s> {
        source: &'s str,
        events: Vec<String>,
    }

    impl Recorder<'_> {
        fn span(&mut self, label: &str, start: usize, end: usize) {
            let event = format!("{label}:{}", &self.source[start..end]);
            self.events.push(event);
        }
    }

    impl Callbacks for &mut Recorder<'_> {
        fn on_text(&mut self, start: usize, end: usize) {
            self.span("text", start, end);
        }
        fn on_interpolation(&mut self, start: usize, end: usize) {
            self.span("interp", start, end);
        }
        fn on_open_tag_name(&mut self, start: usize, end: usize) {
            self.span("open", start, end);
        }
        fn on_open_tag_end(&mut self, _end: usize) {
            self.events.push("open_end".into());
        }
        fn on_self_closing_tag(&mut self, _end: usize) {
            self.events.push("self_closing".into());
        }
        fn on_close_tag(&mut self, start: usize, end: usize) {
            self.span("close", start, end);
        }
        fn on_attrib_data(&mut self, start: usize, end: usize) {
            self.span("data", start, end);
        }
        fn on_attrib_end(&mut self, _quote: QuoteType, _end: usize) {
            self.events.push("attr_end".into());
        }
        fn on_attrib_name(&mut self, start: usize, end: usize) {
            self.span("attr", start, end);
        }
        fn on_marker_name(&mut self, start: usize, end: usize) {
            self.span("marker", start, end);
        }
        fn on_property_name(&mut self, start: usize, end: usize) {
            self.span("property", start, end);
        }
        fn on_comment(&mut self, start: usize, end: usize) {
            self.span("comment", start, end);
        }
        fn on_end(&mut self) {
            self.events.push("end".into());
        }
        fn on_error(&mut self, code: ErrorCode, _index: usize) {
            self.events.push(format!("error:{code:?}"));
        }
    }

    fn tokenize(source: &str) -> Vec<String> {
        let mut recorder = Recorder {
            source,
            events: Vec::new(),
        };
        Tokenizer::new(source, &mut recorder).tokenize();
        recorder.events
    }

    #[test]
    fn test_marker_and_property_names() {
        let events = tokenize(r#"<li *foreach="items" .title="t">x</li>"#);
        assert_eq!(
            events,
            vec![
                "open:li",
                "marker:foreach",
                "data:items",
                "attr_end",
                "property:title",
                "data:t",
                "attr_end",
                "open_end",
                "text:x",
                "close:li",
                "end",
            ]
        );
    }

    #[test]
    fn test_unquoted_and_boolean_attributes() {
        let events = tokenize("<input type=text disabled/>");
        assert_eq!(
            events,
            vec![
                "open:input",
                "attr:type",
                "data:text",
                "attr_end",
                "attr:disabled",
                "attr_end",
                "self_closing",
                "end",
            ]
        );
    }

    #[test]
    fn test_interpolation_spans() {
        let events = tokenize("a {{ b }} c");
        assert_eq!(events, vec!["text:a ", "interp: b ", "text: c", "end"]);
    }

    #[test]
    fn test_custom_delimiters() {
        let mut recorder = Recorder {
            source: "[[ x ]] { y }",
            events: Vec::new(),
        };
        Tokenizer::with_delimiters("[[ x ]] { y }", &mut recorder, b"[[", b"]]").tokenize();
        assert_eq!(recorder.events, vec!["interp: x ", "text: { y }", "end"]);
    }

    #[test]
    fn test_unterminated_interpolation() {
        let events = tokenize("{{ open");
        assert!(events.contains(&"error:UnterminatedInterpolation".to_string()));
        assert!(events.contains(&"text:{{ open".to_string()));
    }

    #[test]
    fn test_comment_doctype_and_eof_in_tag() {
        assert!(tokenize("<!-- hi -->").contains(&"comment: hi ".to_string()));
        assert_eq!(tokenize("<!DOCTYPE html><p>"), vec!["open:p", "open_end", "end"]);
        assert!(tokenize("<div class").contains(&"error:EofInTag".to_string()));
    }

    #[test]
    fn test_position_tracking() {
        let mut recorder = Recorder {
            source: "a\nbc",
            events: Vec::new(),
        };
        let mut tokenizer = Tokenizer::new("a\nbc", &mut recorder);
        tokenizer.tokenize();
        let pos = tokenizer.get_pos(3);
        assert_eq!((pos.line, pos.column), (2, 2));
        assert_eq!(tokenizer.get_pos(0).line, 1);
    }
}
