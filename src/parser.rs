//! The directive/block parser.
//!
//! One recursive byte loop drives everything. The loop flips between two
//! scanning modes (before and after the first significant token of a
//! statement) because several byte classes (`{`, `;`, `#`) mean different
//! things in each. Quoted strings, `${...}` references, comments, and the
//! opaque `*_by_lua_block` bodies are handled inline by sub-scanners that
//! share the same scratch buffer and line counter.

use crate::directive::Directive;
use crate::error::ParseError;
use crate::reader::ByteReader;
use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

/// Directives whose name carries this suffix take a brace-balanced opaque
/// body instead of a nested block.
const LUA_BLOCK_SUFFIX: &str = "_by_lua_block";

/// Expands a path pattern into an ordered list of matching file names.
pub trait GlobHandler {
    fn glob(&self, pattern: &str) -> io::Result<Vec<String>>;
}

/// Opens a named configuration file as a byte source.
pub trait OpenHandler {
    fn open(&self, name: &str) -> io::Result<Box<dyn Read>>;
}

/// Filesystem-backed glob capability. Matches are yielded in alphabetical
/// order, which fixes the splicing order of globbed includes.
pub struct OsGlobHandler;

impl GlobHandler for OsGlobHandler {
    fn glob(&self, pattern: &str) -> io::Result<Vec<String>> {
        let entries = glob::glob(pattern)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let mut matches = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| e.into_error())?;
            matches.push(path.to_string_lossy().into_owned());
        }
        Ok(matches)
    }
}

/// Filesystem-backed open capability.
pub struct OsOpenHandler;

impl OpenHandler for OsOpenHandler {
    fn open(&self, name: &str) -> io::Result<Box<dyn Read>> {
        Ok(Box::new(File::open(name)?))
    }
}

/// Options controlling a parse.
///
/// One immutable record is shared by the root parse and every include
/// recursion it spawns. The capabilities are trait objects so that tests
/// (or embedders without a filesystem) can substitute their own sources.
pub struct ParseOptions {
    /// Keep `include` directives unexpanded: raw args, empty block.
    pub single_file: bool,
    /// Base directory for include patterns that are not absolute. Includes
    /// in nested files resolve against this same root, not against the
    /// including file's directory.
    pub root: Option<PathBuf>,
    /// Capability used to expand include patterns.
    pub glob: Box<dyn GlobHandler>,
    /// Capability used to open configuration files.
    pub open: Box<dyn OpenHandler>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            single_file: false,
            root: None,
            glob: Box::new(OsGlobHandler),
            open: Box::new(OsOpenHandler),
        }
    }
}

impl ParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_single_file(mut self, single_file: bool) -> Self {
        self.single_file = single_file;
        self
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn with_glob(mut self, glob: Box<dyn GlobHandler>) -> Self {
        self.glob = glob;
        self
    }

    pub fn with_open(mut self, open: Box<dyn OpenHandler>) -> Self {
        self.open = open;
        self
    }
}

/// Scanning mode of the byte loop: before or after the first significant
/// token of a statement. The pending node lives inside `Args`, so argument
/// handling can never observe a missing directive.
enum ScanState {
    Directive,
    Args(Directive),
}

/// nginx configuration parser.
///
/// A parser owns its file name annotation and line counter; include
/// recursion allocates a fresh parser per included file so each keeps its
/// own numbering, sharing only the options record.
pub struct Parser {
    options: Arc<ParseOptions>,
    filename: String,
    line: usize,
}

impl Parser {
    pub fn new(options: ParseOptions) -> Self {
        Self::with_shared_options(Arc::new(options))
    }

    fn with_shared_options(options: Arc<ParseOptions>) -> Self {
        Self {
            options,
            filename: String::new(),
            line: 1,
        }
    }

    /// Opens `filename` through the configured open capability and parses
    /// it. The name is recorded on every directive produced.
    pub fn parse_file(&mut self, filename: &str) -> Result<Vec<Directive>, ParseError> {
        self.filename = filename.to_owned();
        let source = self.options.open.open(filename)?;
        self.parse_reader(source)
    }

    /// Parses a configuration from a string.
    pub fn parse_str(&mut self, input: &str) -> Result<Vec<Directive>, ParseError> {
        self.parse_reader(input.as_bytes())
    }

    /// Parses a configuration from an arbitrary byte source. Directives are
    /// annotated with whatever file name was most recently set (empty if
    /// this parser never opened a file).
    pub fn parse_reader<R: Read>(&mut self, source: R) -> Result<Vec<Directive>, ParseError> {
        let mut reader = ByteReader::new(source);
        self.line = 1;
        let directives = self.parse_block(&mut reader)?;

        // Whatever remains after the root block may only be whitespace.
        while let Some(b) = reader.read_byte()? {
            if is_space(b) {
                continue;
            }
            return Err(ParseError::TrailingInput {
                file: self.filename.clone(),
                line: self.line,
            });
        }
        Ok(directives)
    }

    fn parse_block<R: Read>(
        &mut self,
        reader: &mut ByteReader<R>,
    ) -> Result<Vec<Directive>, ParseError> {
        let mut directives = Vec::new();
        let mut buf: Vec<u8> = Vec::new();
        let mut state = ScanState::Directive;

        loop {
            let Some(b) = reader.read_byte()? else {
                // EOF terminates the block; the caller decides whether that
                // was legitimate.
                return Ok(directives);
            };

            // Comments only start on a token boundary; mid-token `#` and
            // `/` are ordinary bytes.
            if buf.is_empty() {
                match b {
                    b'#' => {
                        self.collect_comment(reader, &mut state, &mut directives)?;
                        continue;
                    }
                    b'/' => {
                        let next = reader.peek(1).map_err(|e| self.map_read_error(e))?[0];
                        if next == b'/' {
                            reader.read_byte()?;
                            self.collect_comment(reader, &mut state, &mut directives)?;
                        } else {
                            buf.push(b'/');
                        }
                        continue;
                    }
                    _ => {}
                }
            }

            match b {
                b' ' | b'\t' => self.end_token(&mut buf, &mut state),
                b'\n' => {
                    self.end_token(&mut buf, &mut state);
                    self.line += 1;
                }
                b'\\' => {
                    let Some(next) = reader.read_byte()? else {
                        return Err(self.eof_error());
                    };
                    buf.push(decode_escape(next));
                }
                b'"' | b'\'' => {
                    if matches!(state, ScanState::Args(_)) && !buf.is_empty() {
                        // A quote in the middle of an argument is literal.
                        buf.push(b);
                    } else {
                        self.scan_quoted(reader, b, &mut buf, &mut state)?;
                    }
                }
                b';' => match std::mem::replace(&mut state, ScanState::Directive) {
                    ScanState::Directive => {
                        if !buf.is_empty() {
                            directives.push(self.new_directive(take_token(&mut buf)));
                        }
                    }
                    ScanState::Args(mut current) => {
                        if !buf.is_empty() {
                            current.args.push(take_token(&mut buf));
                        }
                        if !self.options.single_file && current.is_include() {
                            self.resolve_includes(&mut current)?;
                        }
                        directives.push(current);
                    }
                },
                b'{' => match std::mem::replace(&mut state, ScanState::Directive) {
                    ScanState::Directive => {
                        if buf.is_empty() {
                            return Err(self.unexpected('{'));
                        }
                        let mut current = self.new_directive(take_token(&mut buf));
                        current.block = self.parse_block(reader)?;
                        directives.push(current);
                    }
                    ScanState::Args(mut current) => {
                        if !buf.is_empty() {
                            current.args.push(take_token(&mut buf));
                        }
                        if current.directive.ends_with(LUA_BLOCK_SUFFIX) {
                            let body = self.scan_lua_block(reader)?;
                            current.args.push(body);
                        } else {
                            if current.directive == "if" {
                                strip_condition_parens(&mut current.args);
                            }
                            current.block = self.parse_block(reader)?;
                        }
                        directives.push(current);
                    }
                },
                b'}' => match state {
                    ScanState::Directive => return Ok(directives),
                    ScanState::Args(_) => return Err(self.unexpected('}')),
                },
                b'$' => {
                    buf.push(b'$');
                    let next = reader.peek(1).map_err(|e| self.map_read_error(e))?[0];
                    if next == b'{' {
                        // `${name}` is copied verbatim, braces included; the
                        // block grammar does not apply inside.
                        loop {
                            let Some(nb) = reader.read_byte()? else {
                                return Err(self.eof_error());
                            };
                            buf.push(nb);
                            if nb == b'}' {
                                break;
                            }
                        }
                    }
                }
                b'\r' => {}
                _ => buf.push(b),
            }
        }
    }

    /// Finishes the token in `buf`, promoting it to the pending directive's
    /// name or appending it as an argument.
    fn end_token(&self, buf: &mut Vec<u8>, state: &mut ScanState) {
        if buf.is_empty() {
            return;
        }
        match state {
            ScanState::Directive => {
                *state = ScanState::Args(self.new_directive(take_token(buf)));
            }
            ScanState::Args(current) => current.args.push(take_token(buf)),
        }
    }

    /// Consumes the rest of the line as comment text. A comment seen while
    /// a directive is mid-construction attaches to that directive;
    /// otherwise it becomes a standalone `"#"` node.
    fn collect_comment<R: Read>(
        &mut self,
        reader: &mut ByteReader<R>,
        state: &mut ScanState,
        directives: &mut Vec<Directive>,
    ) -> Result<(), ParseError> {
        let text = reader.read_line()?.unwrap_or_default();
        match state {
            ScanState::Args(current) => {
                self.line += 1;
                push_comment(&mut current.comment, &text);
            }
            ScanState::Directive => {
                let mut node = self.new_directive("#".to_owned());
                self.line += 1;
                push_comment(&mut node.comment, &text);
                directives.push(node);
            }
        }
        Ok(())
    }

    /// Scans a quoted string into `buf`, starting just after the opening
    /// quote. Applies the in-string escape table, counts newlines, and on
    /// closure coalesces whitespace-separated runs of the same quote into
    /// one token while in argument position.
    fn scan_quoted<R: Read>(
        &mut self,
        reader: &mut ByteReader<R>,
        quote: u8,
        buf: &mut Vec<u8>,
        state: &mut ScanState,
    ) -> Result<(), ParseError> {
        loop {
            loop {
                let Some(c) = reader.read_rune().map_err(|e| self.map_read_error(e))? else {
                    return Err(self.eof_error());
                };
                if c == quote as char {
                    break;
                }
                if c == '\n' {
                    self.line += 1;
                }
                if c == '\\' {
                    let Some(next) = reader.read_byte()? else {
                        return Err(self.eof_error());
                    };
                    match next {
                        b'"' | b'\'' | b'\\' => buf.push(next),
                        b'n' => buf.push(b'\n'),
                        b'r' => buf.push(b'\r'),
                        b't' => buf.push(b'\t'),
                        _ => {
                            // Unlike outside a string, the backslash itself
                            // survives for unrecognized escapes.
                            buf.push(b'\\');
                            buf.push(next);
                        }
                    }
                    continue;
                }
                push_char(buf, c);
            }

            match state {
                ScanState::Directive => {
                    *state = ScanState::Args(self.new_directive(take_token(buf)));
                    return Ok(());
                }
                ScanState::Args(current) => {
                    let mut ahead = 1;
                    let coalesce = loop {
                        let peeked = reader.peek(ahead).map_err(|e| self.map_read_error(e))?;
                        let next = peeked[ahead - 1];
                        if is_space(next) {
                            ahead += 1;
                            continue;
                        }
                        break next == quote;
                    };
                    if coalesce {
                        for _ in 0..ahead {
                            if let Some(nb) = reader.read_byte()? {
                                if nb == b'\n' {
                                    self.line += 1;
                                }
                            }
                        }
                        continue;
                    }
                    current.args.push(take_token(buf));
                    return Ok(());
                }
            }
        }
    }

    /// Captures an opaque `*_by_lua_block` body up to the brace that closes
    /// it, honoring nested braces, `--` line comments, and quoted strings
    /// with `\<byte>` pass-through. Returns the body with trailing
    /// whitespace trimmed.
    fn scan_lua_block<R: Read>(
        &mut self,
        reader: &mut ByteReader<R>,
    ) -> Result<String, ParseError> {
        let mut body: Vec<u8> = Vec::new();
        let mut depth = 0usize;

        loop {
            let Some(b) = reader.read_byte()? else {
                return Err(self.eof_error());
            };
            match b {
                b'-' => {
                    let next = reader.peek(1).map_err(|e| self.map_read_error(e))?[0];
                    if next == b'-' {
                        // Lua comment: captured verbatim through end of line.
                        body.push(b'-');
                        let Some(rest) = reader.read_line()? else {
                            return Err(self.eof_error());
                        };
                        body.extend_from_slice(rest.as_bytes());
                        body.push(b'\n');
                        self.line += 1;
                        continue;
                    }
                }
                b'\n' => self.line += 1,
                b'"' | b'\'' => {
                    body.push(b);
                    loop {
                        let Some(c) = reader.read_rune().map_err(|e| self.map_read_error(e))?
                        else {
                            return Err(self.eof_error());
                        };
                        if c == b as char {
                            break;
                        }
                        if c == '\\' {
                            push_char(&mut body, c);
                            let Some(escaped) =
                                reader.read_rune().map_err(|e| self.map_read_error(e))?
                            else {
                                return Err(self.eof_error());
                            };
                            push_char(&mut body, escaped);
                            continue;
                        }
                        push_char(&mut body, c);
                    }
                }
                b'{' => depth += 1,
                b'}' => {
                    if depth != 0 {
                        depth -= 1;
                    } else {
                        break;
                    }
                }
                _ => {}
            }
            body.push(b);
        }

        Ok(String::from_utf8_lossy(&body).trim_end().to_owned())
    }

    /// Expands every pattern of an `include` directive and splices the
    /// parsed contents of each matched file into its block, in glob order.
    fn resolve_includes(&mut self, current: &mut Directive) -> Result<(), ParseError> {
        let mut expanded = Vec::new();
        for pattern in &current.args {
            let resolved = if pattern.starts_with('/') {
                pattern.clone()
            } else {
                let Some(root) = self.options.root.as_ref() else {
                    return Err(ParseError::MissingRoot);
                };
                root.join(pattern).to_string_lossy().into_owned()
            };
            for filename in self.options.glob.glob(&resolved)? {
                let mut sub = Parser::with_shared_options(Arc::clone(&self.options));
                expanded.extend(sub.parse_file(&filename)?);
            }
        }
        current.block.extend(expanded);
        Ok(())
    }

    fn new_directive(&self, directive: String) -> Directive {
        Directive::new(directive, self.line, &self.filename)
    }

    fn unexpected(&self, character: char) -> ParseError {
        ParseError::UnexpectedCharacter {
            character,
            file: self.filename.clone(),
            line: self.line,
        }
    }

    fn eof_error(&self) -> ParseError {
        ParseError::UnexpectedEof {
            file: self.filename.clone(),
            line: self.line,
        }
    }

    fn map_read_error(&self, err: io::Error) -> ParseError {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            self.eof_error()
        } else {
            ParseError::Io(err)
        }
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new(ParseOptions::default())
    }
}

/// Resolves a backslash escape outside quoted strings. Quotes and the
/// backslash map to themselves; anything unrecognized passes through with
/// the backslash dropped.
fn decode_escape(next: u8) -> u8 {
    match next {
        b'n' => b'\n',
        b'r' => b'\r',
        b't' => b'\t',
        _ => next,
    }
}

/// `if` conditions arrive parenthesized; strip one `(` off the first
/// argument and one `)` off the last, dropping either if it ends up empty.
fn strip_condition_parens(args: &mut Vec<String>) {
    let bracketed = args.first().is_some_and(|a| a.starts_with('('))
        && args.last().is_some_and(|a| a.ends_with(')'));
    if !bracketed {
        return;
    }
    if let Some(first) = args.first_mut() {
        if let Some(inner) = first.strip_prefix('(') {
            *first = inner.trim_start().to_owned();
        }
    }
    if let Some(last) = args.last_mut() {
        if let Some(inner) = last.strip_suffix(')') {
            *last = inner.trim_end().to_owned();
        }
    }
    if args.first().is_some_and(|a| a.is_empty()) {
        args.remove(0);
    }
    if args.last().is_some_and(|a| a.is_empty()) {
        args.pop();
    }
}

fn take_token(buf: &mut Vec<u8>) -> String {
    let token = String::from_utf8_lossy(buf).into_owned();
    buf.clear();
    token
}

fn push_char(buf: &mut Vec<u8>, c: char) {
    let mut encoded = [0u8; 4];
    buf.extend_from_slice(c.encode_utf8(&mut encoded).as_bytes());
}

fn push_comment(comment: &mut String, text: &str) {
    if !comment.is_empty() {
        comment.push(' ');
    }
    comment.push_str(text);
}

fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c)
}
