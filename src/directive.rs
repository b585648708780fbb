//! The directive tree produced by the parser.

use serde::{Deserialize, Serialize};

/// A single configuration statement: a name, its positional arguments, and
/// optionally a nested block or an attached comment.
///
/// Comment nodes use the synthetic name `"#"` and carry their text in
/// [`comment`](Self::comment). For an expanded `include`, [`args`](Self::args)
/// keeps the unresolved patterns while [`block`](Self::block) holds the
/// top-level directives of every matched file, each annotated with its own
/// file name and line numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    /// 1-based line on which the directive begins in its source file.
    pub line: usize,
    /// The source file the directive was read from, as given to the parser.
    #[serde(rename = "filename")]
    pub file_name: String,
    /// The directive name. `"#"` marks a comment node; the empty string is
    /// legal and appears when a quoted token opens a statement.
    pub directive: String,
    /// Positional arguments in source order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Nested directives for a brace block, or included-file roots.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub block: Vec<Directive>,
    /// Accumulated comment text.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
}

impl Directive {
    pub(crate) fn new(directive: String, line: usize, file_name: &str) -> Self {
        Self {
            line,
            file_name: file_name.to_owned(),
            directive,
            args: Vec::new(),
            block: Vec::new(),
            comment: String::new(),
        }
    }

    /// Returns true for comment nodes.
    pub fn is_comment(&self) -> bool {
        self.directive == "#"
    }

    /// Returns true for `include` directives.
    pub fn is_include(&self) -> bool {
        self.directive == "include"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_wire_field_names() {
        let directive = Directive {
            line: 3,
            file_name: "nginx.conf".to_owned(),
            directive: "listen".to_owned(),
            args: vec!["8080".to_owned()],
            block: Vec::new(),
            comment: String::new(),
        };
        let json = serde_json::to_value(&directive).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "line": 3,
                "filename": "nginx.conf",
                "directive": "listen",
                "args": ["8080"],
            })
        );
    }

    #[test]
    fn empty_fields_are_omitted() {
        let directive = Directive::new("events".to_owned(), 1, "nginx.conf");
        let json = serde_json::to_string(&directive).unwrap();
        assert!(!json.contains("args"));
        assert!(!json.contains("block"));
        assert!(!json.contains("comment"));
    }

    #[test]
    fn deserializes_with_missing_fields_defaulted() {
        let directive: Directive = serde_json::from_str(
            r##"{"line": 1, "filename": "f", "directive": "#", "comment": "note"}"##,
        )
        .unwrap();
        assert!(directive.is_comment());
        assert_eq!(directive.comment, "note");
        assert!(directive.args.is_empty());
        assert!(directive.block.is_empty());
    }

    #[test]
    fn block_round_trips_nested_nodes() {
        let mut server = Directive::new("server".to_owned(), 1, "f");
        let mut listen = Directive::new("listen".to_owned(), 2, "f");
        listen.args.push("80".to_owned());
        server.block.push(listen);

        let json = serde_json::to_string(&server).unwrap();
        let back: Directive = serde_json::from_str(&json).unwrap();
        assert_eq!(back, server);
    }
}
