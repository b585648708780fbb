//! # nginx-parser
//!
//! A parser for the nginx configuration file format. It consumes one or
//! more configuration files and produces a nested tree of [`Directive`]
//! nodes, each carrying its source location, name, positional arguments,
//! nested block, and attached comment text. The output is suitable for
//! programmatic inspection, transformation, and linting; it serializes
//! directly with serde.
//!
//! ## Basic usage
//!
//! ```rust
//! use nginx_parser::parse_str;
//!
//! let directives = parse_str("events { worker_connections 1024; }")?;
//!
//! assert_eq!(directives[0].directive, "events");
//! assert_eq!(directives[0].block[0].directive, "worker_connections");
//! assert_eq!(directives[0].block[0].args, vec!["1024"]);
//! # Ok::<(), nginx_parser::ParseError>(())
//! ```
//!
//! ## Includes
//!
//! By default `include` directives are expanded in place: each pattern is
//! resolved against [`ParseOptions::root`], globbed, and every matched file
//! is parsed and spliced into the directive's block. The original patterns
//! stay in its args, and spliced nodes carry their own file names and line
//! numbers.
//!
//! ```rust,no_run
//! use nginx_parser::{ParseOptions, Parser};
//!
//! let mut parser = Parser::new(ParseOptions::new().with_root("/etc/nginx"));
//! let directives = parser.parse_file("/etc/nginx/nginx.conf")?;
//! # Ok::<(), nginx_parser::ParseError>(())
//! ```
//!
//! Set [`ParseOptions::single_file`] to keep `include` directives
//! unexpanded, or substitute the [`GlobHandler`] / [`OpenHandler`]
//! capabilities to parse configurations that do not live on a filesystem.
//!
//! ## Comments and embedded scripts
//!
//! `#` and `//` comments become synthetic `"#"` nodes, except that a
//! comment on the same line as an unfinished directive attaches to that
//! directive's `comment` field. Directives ending in `_by_lua_block`
//! capture their brace-balanced body verbatim as a single argument instead
//! of parsing it as nested directives.

pub mod directive;
pub mod error;
pub mod parser;
pub mod reader;

pub use directive::Directive;
pub use error::ParseError;
pub use parser::{
    GlobHandler, OpenHandler, OsGlobHandler, OsOpenHandler, ParseOptions, Parser,
};
pub use reader::ByteReader;

/// Parses a configuration string with default options.
pub fn parse_str(input: &str) -> Result<Vec<Directive>, ParseError> {
    let mut parser = Parser::default();
    parser.parse_str(input)
}

/// Parses the named configuration file with default options.
pub fn parse_file(filename: &str) -> Result<Vec<Directive>, ParseError> {
    let mut parser = Parser::default();
    parser.parse_file(filename)
}
