use tree_sitter::Language;

pub fn go_language() -> Language {
    tree_sitter_go::LANGUAGE.into()
}
