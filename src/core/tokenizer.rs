//! XML Tokenizer - State machine for XML token extraction
//!
//! Implements a pull-parser style tokenizer that extracts XML tokens:
//! - Element start/end tags
//! - Text content (predefined and numeric entities decoded)
//! - CDATA sections
//! - Comments
//! - Processing instructions and the XML declaration
//! - DOCTYPE declarations (skipped over as a unit, internal subset included)
//!
//! Content is not validated beyond what is needed to find token boundaries.
//! Markup that cannot be delimited stops the tokenizer and records a
//! [`ParseError`].

use super::entities::decode_text;
use super::scanner::Scanner;
use std::borrow::Cow;

/// Current parsing state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    /// Initial state before parsing starts
    Init,
    /// Between tokens
    InsideText,
    /// End of input reached, or parsing stopped on an error
    Done,
}

/// Type of XML token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Element start tag: <element>
    StartTag,
    /// Element end tag: </element>
    EndTag,
    /// Empty element: <element/>
    EmptyTag,
    /// Text content
    Text,
    /// CDATA section: <![CDATA[...]]>
    CData,
    /// Comment: <!--...-->
    Comment,
    /// Processing instruction: <?target ...?>
    ProcessingInstruction,
    /// XML declaration: <?xml ...?>
    XmlDeclaration,
    /// DOCTYPE declaration
    DocType,
    /// End of file
    Eof,
}

/// A parsed XML token
#[derive(Debug, Clone)]
pub struct Token<'a> {
    pub kind: TokenKind,
    /// Raw span in input (start, end)
    pub span: (usize, usize),
    /// For tags and processing instructions: the name or target
    pub name: Option<&'a [u8]>,
    /// For start and empty tags: the raw attribute region after the name
    pub attributes: &'a [u8],
    /// For text, CDATA, comments and PIs: the content
    pub content: Option<Cow<'a, [u8]>>,
}

impl<'a> Token<'a> {
    fn new(kind: TokenKind, span: (usize, usize)) -> Self {
        Token {
            kind,
            span,
            name: None,
            attributes: &[],
            content: None,
        }
    }

    fn with_name(mut self, name: &'a [u8]) -> Self {
        self.name = Some(name);
        self
    }

    fn with_attributes(mut self, attributes: &'a [u8]) -> Self {
        self.attributes = attributes;
        self
    }

    fn with_content(mut self, content: Cow<'a, [u8]>) -> Self {
        self.content = Some(content);
        self
    }
}

/// Structural error that stopped the tokenizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, position: usize) -> Self {
        ParseError {
            message: message.into(),
            position,
        }
    }
}

/// XML tokenizer implementing a pull-parser pattern
pub struct Tokenizer<'a> {
    scanner: Scanner<'a>,
    state: ParseState,
    error: Option<ParseError>,
}

impl<'a> Tokenizer<'a> {
    /// Create a new tokenizer for the given input
    pub fn new(input: &'a [u8]) -> Self {
        Tokenizer {
            scanner: Scanner::new(input),
            state: ParseState::Init,
            error: None,
        }
    }

    /// The error that stopped tokenization, if any
    pub fn error(&self) -> Option<&ParseError> {
        self.error.as_ref()
    }

    /// Record the first error at `position` and stop
    fn fail(&mut self, message: &str, position: usize) -> Option<Token<'a>> {
        if self.error.is_none() {
            self.error = Some(ParseError::new(message, position));
        }
        self.state = ParseState::Done;
        None
    }

    /// Get the current parse state
    pub fn state(&self) -> ParseState {
        self.state
    }

    /// Get the current position in the input
    pub fn position(&self) -> usize {
        self.scanner.position()
    }

    /// Get the next token.
    ///
    /// Returns `None` after `Eof` has been produced, or when markup could not
    /// be delimited (see [`Tokenizer::error`]).
    pub fn next_token(&mut self) -> Option<Token<'a>> {
        match self.state {
            ParseState::Done => return None,
            ParseState::Init => {
                self.scanner.skip_bom();
                self.state = ParseState::InsideText;
            }
            ParseState::InsideText => {}
        }

        match self.scanner.peek() {
            Some(b'<') => self.parse_markup(),
            Some(_) => self.parse_text(),
            None => {
                self.state = ParseState::Done;
                let pos = self.scanner.position();
                Some(Token::new(TokenKind::Eof, (pos, pos)))
            }
        }
    }

    /// Parse markup starting with '<'
    fn parse_markup(&mut self) -> Option<Token<'a>> {
        let start = self.scanner.position();
        self.scanner.advance(1); // Skip '<'

        match self.scanner.peek() {
            Some(b'/') => self.parse_end_tag(start),
            Some(b'!') => self.parse_bang_markup(start),
            Some(b'?') => self.parse_pi(start),
            Some(_) => self.parse_start_tag(start),
            None => self.fail("unexpected end of input after '<'", start),
        }
    }

    /// Parse a start tag or empty element tag
    fn parse_start_tag(&mut self, start: usize) -> Option<Token<'a>> {
        let Some(name) = self.scanner.read_name() else {
            return self.fail("invalid element name", start);
        };
        let attrs_start = self.scanner.position();

        // Find the end of the tag, handling quoted attributes
        let Some(end) = self.scanner.find_tag_end_quoted() else {
            return self.fail("unterminated start tag", start);
        };

        let is_empty = end > attrs_start && self.scanner.slice(end - 1, end) == b"/";
        let attrs_end = if is_empty { end - 1 } else { end };

        self.scanner.set_position(end + 1);
        let kind = if is_empty { TokenKind::EmptyTag } else { TokenKind::StartTag };
        Some(
            Token::new(kind, (start, end + 1))
                .with_name(name)
                .with_attributes(self.scanner.slice(attrs_start, attrs_end)),
        )
    }

    /// Parse an end tag
    fn parse_end_tag(&mut self, start: usize) -> Option<Token<'a>> {
        self.scanner.advance(1); // Skip '/'

        let Some(name) = self.scanner.read_name() else {
            return self.fail("invalid element name in end tag", start);
        };
        self.scanner.skip_whitespace();
        if self.scanner.peek() != Some(b'>') {
            return self.fail("unterminated end tag", start);
        }

        self.scanner.advance(1);
        Some(Token::new(TokenKind::EndTag, (start, self.scanner.position())).with_name(name))
    }

    /// Parse markup starting with '!' (comment, CDATA, DOCTYPE)
    fn parse_bang_markup(&mut self, start: usize) -> Option<Token<'a>> {
        self.scanner.advance(1); // Skip '!'

        if self.scanner.starts_with(b"--") {
            self.scanner.advance(2);
            self.parse_delimited(start, TokenKind::Comment, b"-->", "unterminated comment")
        } else if self.scanner.starts_with(b"[CDATA[") {
            self.scanner.advance(7);
            self.parse_delimited(start, TokenKind::CData, b"]]>", "unterminated CDATA section")
        } else if self.scanner.starts_with(b"DOCTYPE") {
            self.parse_doctype(start)
        } else {
            self.fail("invalid declaration, expected comment, CDATA, or DOCTYPE", start)
        }
    }

    /// Parse content up to a fixed terminator (comment or CDATA body)
    fn parse_delimited(
        &mut self,
        start: usize,
        kind: TokenKind,
        terminator: &[u8],
        unterminated: &str,
    ) -> Option<Token<'a>> {
        let content_start = self.scanner.position();
        let Some(end) = self.scanner.find_terminator(terminator) else {
            return self.fail(unterminated, start);
        };

        let content = self.scanner.slice(content_start, end);
        self.scanner.set_position(end + terminator.len());
        Some(Token::new(kind, (start, self.scanner.position())).with_content(Cow::Borrowed(content)))
    }

    /// Parse a DOCTYPE declaration
    ///
    /// Format: <!DOCTYPE name [internal subset]> or <!DOCTYPE name SYSTEM "uri">.
    /// The '>' that ends the declaration is the first one outside quotes and
    /// outside the bracketed internal subset.
    fn parse_doctype(&mut self, start: usize) -> Option<Token<'a>> {
        self.scanner.advance(7); // Skip 'DOCTYPE'
        self.scanner.skip_whitespace();
        let name = self.scanner.read_name();

        let mut quote: Option<u8> = None;
        let mut brackets = 0usize;
        while let Some(b) = self.scanner.peek() {
            self.scanner.advance(1);
            match (quote, b) {
                (Some(q), _) if q == b => quote = None,
                (Some(_), _) => {}
                (None, b'"' | b'\'') => quote = Some(b),
                (None, b'[') => brackets += 1,
                (None, b']') => brackets = brackets.saturating_sub(1),
                (None, b'>') if brackets == 0 => {
                    let token = Token::new(TokenKind::DocType, (start, self.scanner.position()));
                    return Some(match name {
                        Some(name) => token.with_name(name),
                        None => token,
                    });
                }
                _ => {}
            }
        }
        self.fail("unterminated DOCTYPE declaration", start)
    }

    /// Parse a processing instruction <?...?>
    fn parse_pi(&mut self, start: usize) -> Option<Token<'a>> {
        self.scanner.advance(1); // Skip '?'

        let Some(name) = self.scanner.read_name() else {
            return self.fail("invalid processing instruction target", start);
        };
        let is_xml_decl = name == b"xml";

        self.scanner.skip_whitespace();
        let content_start = self.scanner.position();
        let Some(end) = self.scanner.find_terminator(b"?>") else {
            return self.fail("unterminated processing instruction", start);
        };

        let content = self.scanner.slice(content_start, end);
        self.scanner.set_position(end + 2);
        let kind = if is_xml_decl { TokenKind::XmlDeclaration } else { TokenKind::ProcessingInstruction };
        Some(
            Token::new(kind, (start, self.scanner.position()))
                .with_name(name)
                .with_content(Cow::Borrowed(content)),
        )
    }

    /// Parse text content
    fn parse_text(&mut self) -> Option<Token<'a>> {
        let start = self.scanner.position();

        // Find the next '<' or end of input
        let end = self
            .scanner
            .find_tag_start()
            .unwrap_or(start + self.scanner.remaining().len());

        let content = self.scanner.slice(start, end);
        self.scanner.set_position(end);
        Some(Token::new(TokenKind::Text, (start, end)).with_content(decode_text(content)))
    }
}

/// Iterator adapter for tokenizer
impl<'a> Iterator for Tokenizer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let token = self.next_token()?;
        if token.kind == TokenKind::Eof {
            None
        } else {
            Some(token)
        }
    }
}
