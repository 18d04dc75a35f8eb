use crate::model::FrameworkInfo;
use log::{debug, warn};
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

/// Descriptor file name -> framework it identifies. Checked in order.
const DESCRIPTORS: &[(&str, &str)] = &[
    ("wails.json", "Wails"),
    ("encore.app", "Encore"),
    (".buffalo.dev.yml", "Buffalo"),
    ("app.yaml", "App Engine"),
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoModule {
    pub module: String,
    pub go_version: Option<String>,
}

fn module_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?m)^\s*module\s+"?([^\s"]+)"?"#).ok())
        .as_ref()
}

fn go_version_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*go\s+([0-9][0-9A-Za-z.]*)").ok())
        .as_ref()
}

pub fn parse_go_mod(content: &str) -> Option<GoModule> {
    let module = module_regex()?.captures(content)?.get(1)?.as_str().to_string();
    let go_version = go_version_regex()
        .and_then(|re| re.captures(content))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    Some(GoModule { module, go_version })
}

/// Module path from `root/go.mod`, falling back to the root directory name.
pub fn detect_module(root: &Path) -> String {
    let go_mod = root.join("go.mod");
    if let Ok(content) = fs::read_to_string(&go_mod) {
        if let Some(module) = parse_go_mod(&content) {
            debug!("Module {} from {:?}", module.module, go_mod);
            return module.module;
        }
        warn!("{:?} has no module directive", go_mod);
    }

    root.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Informational only; nothing downstream depends on it.
pub fn detect_framework(root: &Path) -> Option<FrameworkInfo> {
    for (file_name, framework) in DESCRIPTORS {
        let descriptor = root.join(file_name);
        if !descriptor.is_file() {
            continue;
        }

        let app_name = if file_name.ends_with(".json") || file_name.ends_with(".app") {
            read_json_name(&descriptor)
        } else {
            None
        };

        debug!("Detected {} application via {:?}", framework, descriptor);
        return Some(FrameworkInfo {
            framework: framework.to_string(),
            descriptor,
            app_name,
        });
    }

    None
}

fn read_json_name(path: &Path) -> Option<String> {
    let content = fs::read_to_string(path).ok()?;
    let value: serde_json::Value = match serde_json::from_str(&content) {
        Ok(value) => value,
        Err(e) => {
            debug!("Descriptor {:?} is not JSON: {}", path, e);
            return None;
        }
    };

    ["name", "id"]
        .iter()
        .find_map(|key| value.get(key).and_then(|v| v.as_str()))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_module_and_go_directives() {
        let module = parse_go_mod("// comment\nmodule github.com/acme/shop\n\ngo 1.22.1\n\nrequire x v1.0.0\n").unwrap();
        assert_eq!(module.module, "github.com/acme/shop");
        assert_eq!(module.go_version.as_deref(), Some("1.22.1"));
        assert!(parse_go_mod("go 1.21\n").is_none());
    }

    #[test]
    fn module_falls_back_to_directory_name() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("shop");
        fs::create_dir(&root).unwrap();
        assert_eq!(detect_module(&root), "shop");

        fs::write(root.join("go.mod"), "module example.com/shop\n").unwrap();
        assert_eq!(detect_module(&root), "example.com/shop");
    }

    #[test]
    fn detects_json_descriptor_with_name() {
        let dir = tempfile::tempdir().unwrap();
        assert!(detect_framework(dir.path()).is_none());

        fs::write(dir.path().join("wails.json"), r#"{ "name": "desk", "outputfilename": "desk" }"#).unwrap();
        let info = detect_framework(dir.path()).unwrap();
        assert_eq!(info.framework, "Wails");
        assert_eq!(info.app_name.as_deref(), Some("desk"));
    }
}
