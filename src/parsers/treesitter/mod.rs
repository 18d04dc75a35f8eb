use crate::error::{AnalysisError, Result};
use std::path::Path;
use tree_sitter::{Language, Node, Parser, Query, QueryCursor, StreamingIterator, Tree};

pub mod bindings;
pub mod queries;

/// Go parser. Not shared between threads; each extraction owns one.
pub struct TreeSitterParser {
    parser: Parser,
    language: Language,
}

impl TreeSitterParser {
    pub fn new() -> Result<Self> {
        let language = bindings::go_language();
        let mut parser = Parser::new();
        parser
            .set_language(&language)
            .map_err(|e| AnalysisError::Language(e.to_string()))?;

        Ok(Self { parser, language })
    }

    pub fn language(&self) -> &Language {
        &self.language
    }

    pub fn parse_file(&mut self, file_path: &Path, content: &str) -> Result<Tree> {
        let tree = self
            .parser
            .parse(content.as_bytes(), None)
            .ok_or_else(|| AnalysisError::parse(file_path, "parser returned no tree"))?;

        if tree.root_node().has_error() {
            let position = first_error_position(tree.root_node())
                .map(|(row, col)| format!("syntax error at {}:{}", row + 1, col + 1))
                .unwrap_or_else(|| "syntax error".to_string());
            return Err(AnalysisError::parse(file_path, position));
        }

        Ok(tree)
    }

    /// Runs `query_str` and returns the text of every `capture_name` capture.
    pub fn capture_texts(
        &self,
        query_str: &str,
        tree: &Tree,
        source: &str,
        capture_name: &str,
    ) -> Result<Vec<String>> {
        let query = Query::new(&self.language, query_str)
            .map_err(|e| AnalysisError::Language(e.to_string()))?;
        let Some(capture_idx) = query.capture_index_for_name(capture_name) else {
            return Ok(Vec::new());
        };

        let mut result = Vec::new();
        let mut query_cursor = QueryCursor::new();
        let mut matches = query_cursor.matches(&query, tree.root_node(), source.as_bytes());

        while let Some(match_result) = matches.next() {
            for capture in match_result.captures {
                if capture.index == capture_idx {
                    result.push(node_text(capture.node, source).to_string());
                }
            }
        }

        Ok(result)
    }
}

pub fn node_text<'a>(node: Node, source: &'a str) -> &'a str {
    let start_byte = node.start_byte();
    let end_byte = node.end_byte();

    if start_byte > end_byte || end_byte > source.len() {
        return "";
    }

    &source[start_byte..end_byte]
}

fn first_error_position(node: Node) -> Option<(usize, usize)> {
    if node.is_error() || node.is_missing() {
        let pos = node.start_position();
        return Some((pos.row, pos.column));
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.has_error() {
            if let Some(pos) = first_error_position(child) {
                return Some(pos);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_import_paths() {
        let source = "package main\n\nimport (\n\t\"fmt\"\n\tio \"io/ioutil\"\n)\n";
        let mut parser = TreeSitterParser::new().unwrap();
        let tree = parser.parse_file(Path::new("main.go"), source).unwrap();

        let imports = parser
            .capture_texts(queries::go::IMPORT_QUERY, &tree, source, "import_path")
            .unwrap();
        assert_eq!(imports, vec!["\"fmt\"", "\"io/ioutil\""]);
    }

    #[test]
    fn malformed_source_is_a_parse_error() {
        let mut parser = TreeSitterParser::new().unwrap();
        let err = parser
            .parse_file(Path::new("broken.go"), "package broken\n\nfunc (\n")
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Parse { .. }));
    }
}
