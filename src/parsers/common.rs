use std::path::Path;

pub const GO_EXTENSION: &str = "go";

pub fn is_hidden_name(name: &str) -> bool {
    name.starts_with('.') || name.starts_with('_')
}

/// True for `*.go` files that are neither hidden nor, unless asked for, tests.
pub fn is_go_source(file_path: &Path, include_tests: bool) -> bool {
    let Some(name) = file_path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };

    if is_hidden_name(name) {
        return false;
    }

    if !include_tests && name.ends_with("_test.go") {
        return false;
    }

    file_path.extension().and_then(|e| e.to_str()) == Some(GO_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_tests_and_hidden_files() {
        assert!(is_go_source(Path::new("pkg/service.go"), false));
        assert!(!is_go_source(Path::new("pkg/service_test.go"), false));
        assert!(is_go_source(Path::new("pkg/service_test.go"), true));
        assert!(!is_go_source(Path::new("pkg/.scratch.go"), false));
        assert!(!is_go_source(Path::new("pkg/_gen.go"), false));
        assert!(!is_go_source(Path::new("pkg/README.md"), false));
    }
}
