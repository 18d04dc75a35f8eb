use crate::parsers::treesitter::node_text;
use tree_sitter::Node;

// Helper functions shared by the Go extractor and the import collector

const PREDECLARED_TYPES: &[&str] = &[
    "any", "bool", "byte", "comparable", "complex64", "complex128", "error", "float32",
    "float64", "int", "int8", "int16", "int32", "int64", "rune", "string", "uint", "uint8",
    "uint16", "uint32", "uint64", "uintptr",
];

pub fn is_predeclared_type(name: &str) -> bool {
    PREDECLARED_TYPES.contains(&name)
}

/// Strips one pair of quotes or backticks around a string literal.
pub fn unquote(literal: &str) -> String {
    let literal = literal.trim();
    for delimiter in ['"', '`'] {
        if let Some(inner) = literal
            .strip_prefix(delimiter)
            .and_then(|rest| rest.strip_suffix(delimiter))
        {
            return inner.to_string();
        }
    }
    literal.to_string()
}

/// Default alias Go code uses for an import without an explicit name.
pub fn default_import_alias(import_path: &str) -> String {
    let mut segments: Vec<&str> = import_path.split('/').filter(|s| !s.is_empty()).collect();

    // "example.com/mod/v2" is imported as "mod"
    if segments.len() > 1 {
        if let Some(last) = segments.last() {
            if is_major_version(last) {
                segments.pop();
            }
        }
    }

    let last = segments.last().copied().unwrap_or(import_path);

    // "gopkg.in/yaml.v3" is imported as "yaml"
    let last = match last.rsplit_once('.') {
        Some((head, tail)) if is_major_version(tail) => head,
        _ => last,
    };

    last.trim_start_matches("go-").replace('-', "_")
}

fn is_major_version(segment: &str) -> bool {
    segment.len() > 1
        && segment.starts_with('v')
        && segment[1..].chars().all(|c| c.is_ascii_digit())
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Base type name of a receiver or embedded field: `*List[T]` -> `List`.
pub fn base_type_name(type_text: &str) -> String {
    let trimmed = type_text.trim().trim_start_matches('*').trim();
    let trimmed = trimmed.split('[').next().unwrap_or(trimmed);
    trimmed.trim_matches(|c| c == '(' || c == ')').to_string()
}

/// Contiguous `//` or `/* */` comments directly above `node`.
pub fn doc_comment(node: Node, source: &str) -> Option<String> {
    let mut lines = Vec::new();
    let mut expected_row = node.start_position().row;
    let mut current = node.prev_sibling();

    while let Some(sibling) = current {
        if sibling.kind() != "comment" || sibling.end_position().row + 1 < expected_row {
            break;
        }

        lines.push(clean_comment(node_text(sibling, source)));
        expected_row = sibling.start_position().row;
        current = sibling.prev_sibling();
    }

    if lines.is_empty() {
        return None;
    }

    lines.reverse();
    Some(lines.join("\n"))
}

fn clean_comment(comment: &str) -> String {
    if let Some(line) = comment.strip_prefix("//") {
        return line.trim().to_string();
    }

    comment
        .trim_start_matches("/*")
        .trim_end_matches("*/")
        .lines()
        .map(|l| l.trim().trim_start_matches('*').trim())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Collects descendants of `node` whose kind is in `kinds`, without
/// descending into matches. Used to see through `(...)` groupings.
pub fn collect_kinds<'t>(node: Node<'t>, kinds: &[&str], out: &mut Vec<Node<'t>>) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if kinds.contains(&child.kind()) {
            out.push(child);
        } else if child.kind() != "comment" {
            collect_kinds(child, kinds, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_aliases_follow_go_conventions() {
        assert_eq!(default_import_alias("fmt"), "fmt");
        assert_eq!(default_import_alias("net/http"), "http");
        assert_eq!(default_import_alias("github.com/jackc/pgx/v5"), "pgx");
        assert_eq!(default_import_alias("gopkg.in/yaml.v3"), "yaml");
        assert_eq!(default_import_alias("github.com/go-chi/chi"), "chi");
    }

    #[test]
    fn base_type_name_strips_pointer_and_type_args() {
        assert_eq!(base_type_name("*Server"), "Server");
        assert_eq!(base_type_name("*List[T]"), "List");
        assert_eq!(base_type_name("Pair[K, V]"), "Pair");
    }

    #[test]
    fn unquote_handles_raw_strings() {
        assert_eq!(unquote("\"net/http\""), "net/http");
        assert_eq!(unquote("`embed`"), "embed");
        assert_eq!(unquote("`json:\"name\"`"), "json:\"name\"");
    }
}
