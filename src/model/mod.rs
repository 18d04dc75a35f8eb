mod declarations;

pub use declarations::{
    Field, Function, MethodSignature, Param, Type, TypeKind, Value, format_signature, is_exported,
};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Advisory tag attached by a convention detector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Convention {
    pub name: String,
    pub target: String,
    pub kind: ConventionTarget,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ConventionTarget {
    Type,
    Function,
}

/// Application framework identified from a descriptor file at the root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FrameworkInfo {
    pub framework: String,
    pub descriptor: PathBuf,
    pub app_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Package {
    pub name: String,
    pub path: PathBuf,
    pub import_path: String,
    pub files: Vec<String>,
    pub types: Vec<Type>,
    pub functions: Vec<Function>,
    pub variables: Vec<Value>,
    pub constants: Vec<Value>,
    /// Import alias -> import path, merged across the package's files.
    pub imports: BTreeMap<String, String>,
    pub conventions: Vec<Convention>,
}

impl Package {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, import_path: impl Into<String>) -> Self {
        Package {
            name: name.into(),
            path: path.into(),
            import_path: import_path.into(),
            files: Vec::new(),
            types: Vec::new(),
            functions: Vec::new(),
            variables: Vec::new(),
            constants: Vec::new(),
            imports: BTreeMap::new(),
            conventions: Vec::new(),
        }
    }

    pub fn with_type(mut self, ty: Type) -> Self {
        self.types.push(ty);
        self
    }

    pub fn with_function(mut self, function: Function) -> Self {
        self.functions.push(function);
        self
    }

    pub fn with_import(mut self, alias: impl Into<String>, path: impl Into<String>) -> Self {
        self.imports.insert(alias.into(), path.into());
        self
    }

    pub fn find_type(&self, name: &str) -> Option<&Type> {
        self.types.iter().find(|t| t.name == name)
    }

    pub fn find_function(&self, name: &str) -> Option<&Function> {
        self.functions
            .iter()
            .find(|f| f.name == name && f.receiver.is_none())
    }

    pub fn methods_of<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = &'a Function> + 'a {
        self.functions
            .iter()
            .filter(move |f| f.receiver.as_deref() == Some(type_name))
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
            && self.functions.is_empty()
            && self.variables.is_empty()
            && self.constants.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Project {
    pub root: PathBuf,
    pub module: String,
    pub packages: Vec<Package>,
    pub framework: Option<FrameworkInfo>,
}

impl Project {
    pub fn new(root: impl Into<PathBuf>, module: impl Into<String>) -> Self {
        Project {
            root: root.into(),
            module: module.into(),
            packages: Vec::new(),
            framework: None,
        }
    }

    pub fn with_package(mut self, package: Package) -> Self {
        self.packages.push(package);
        self
    }

    pub fn package(&self, import_path: &str) -> Option<&Package> {
        self.packages.iter().find(|p| p.import_path == import_path)
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn type_count(&self) -> usize {
        self.packages.iter().map(|p| p.types.len()).sum()
    }

    pub fn function_count(&self) -> usize {
        self.packages.iter().map(|p| p.functions.len()).sum()
    }
}
