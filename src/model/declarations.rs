use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Struct,
    Interface,
    Alias,
    Generic,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Field {
    /// Empty for embedded fields.
    pub name: String,
    pub type_name: String,
    pub tag: Option<String>,
}

impl Field {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Field {
            name: name.into(),
            type_name: type_name.into(),
            tag: None,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn is_embedded(&self) -> bool {
        self.name.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Param {
    /// Empty for unnamed parameters and results.
    pub name: String,
    pub type_name: String,
}

impl Param {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Param {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// A method shape: interface requirement or a concrete receiver method.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MethodSignature {
    pub name: String,
    pub params: Vec<String>,
    pub returns: Vec<String>,
    pub signature: String,
}

impl MethodSignature {
    pub fn new(name: impl Into<String>, params: Vec<String>, returns: Vec<String>) -> Self {
        let name = name.into();
        let signature = format_signature(&name, &params, &returns);
        MethodSignature {
            name,
            params,
            returns,
            signature,
        }
    }

    /// Coarse compatibility: same name, same parameter and result arity.
    pub fn is_compatible_with(&self, other: &MethodSignature) -> bool {
        self.name == other.name
            && self.params.len() == other.params.len()
            && self.returns.len() == other.returns.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Type {
    pub name: String,
    pub kind: TypeKind,
    pub exported: bool,
    pub file: String,
    pub line: usize,
    pub doc: Option<String>,
    pub fields: Vec<Field>,
    pub methods: Vec<MethodSignature>,
    pub embedded: Vec<String>,
    pub type_params: Vec<String>,
    pub underlying: Option<String>,
    pub used_types: Vec<String>,
    pub convention: Option<String>,
}

impl Type {
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        let name = name.into();
        Type {
            exported: is_exported(&name),
            name,
            kind,
            file: String::new(),
            line: 0,
            doc: None,
            fields: Vec::new(),
            methods: Vec::new(),
            embedded: Vec::new(),
            type_params: Vec::new(),
            underlying: None,
            used_types: Vec::new(),
            convention: None,
        }
    }

    pub fn with_method(mut self, method: MethodSignature) -> Self {
        self.methods.push(method);
        self
    }

    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    pub fn method(&self, name: &str) -> Option<&MethodSignature> {
        self.methods.iter().find(|m| m.name == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Function {
    pub name: String,
    /// Base receiver type name, pointer and type arguments stripped.
    pub receiver: Option<String>,
    pub pointer_receiver: bool,
    pub exported: bool,
    pub file: String,
    pub line: usize,
    pub doc: Option<String>,
    pub params: Vec<Param>,
    pub returns: Vec<Param>,
    pub type_params: Vec<String>,
    pub signature: String,
    pub calls: Vec<String>,
    pub used_types: Vec<String>,
    pub used_imports: Vec<String>,
    pub convention: Option<String>,
}

impl Function {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Function {
            exported: is_exported(&name),
            signature: format!("func {}()", name),
            name,
            receiver: None,
            pointer_receiver: false,
            file: String::new(),
            line: 0,
            doc: None,
            params: Vec::new(),
            returns: Vec::new(),
            type_params: Vec::new(),
            calls: Vec::new(),
            used_types: Vec::new(),
            used_imports: Vec::new(),
            convention: None,
        }
    }

    pub fn is_method(&self) -> bool {
        self.receiver.is_some()
    }

    pub fn method_signature(&self) -> MethodSignature {
        MethodSignature::new(
            self.name.clone(),
            self.params.iter().map(|p| p.type_name.clone()).collect(),
            self.returns.iter().map(|p| p.type_name.clone()).collect(),
        )
    }
}

/// Package-level `var` or `const` binding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Value {
    pub name: String,
    pub type_name: Option<String>,
    pub value: Option<String>,
    pub exported: bool,
    pub file: String,
    pub line: usize,
}

impl Value {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Value {
            exported: is_exported(&name),
            name,
            type_name: None,
            value: None,
            file: String::new(),
            line: 0,
        }
    }
}

pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_uppercase())
}

pub fn format_signature(name: &str, params: &[String], returns: &[String]) -> String {
    let params = params.join(", ");
    match returns.len() {
        0 => format!("{}({})", name, params),
        1 => format!("{}({}) {}", name, params, returns[0]),
        _ => format!("{}({}) ({})", name, params, returns.join(", ")),
    }
}
