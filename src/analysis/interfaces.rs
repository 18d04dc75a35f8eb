use crate::error::Result;
use crate::model::{MethodSignature, Package, Project, Type};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Most methods a type may lack and still count as an almost-implementation.
pub const MAX_MISSING_METHODS: usize = 2;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Interface {
    /// `import/path.Name` for project interfaces, `io.Reader` style otherwise.
    pub id: String,
    pub name: String,
    pub package: String,
    /// Flattened across embedded interfaces.
    pub methods: Vec<MethodSignature>,
    pub well_known: bool,
    pub implementers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Implementation {
    pub type_name: String,
    pub type_package: String,
    pub interface: String,
    pub matched: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlmostImplementation {
    pub type_name: String,
    pub type_package: String,
    pub interface: String,
    pub matched: Vec<String>,
    pub missing: Vec<String>,
    pub missing_count: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InterfaceStats {
    pub interface_count: usize,
    pub well_known_count: usize,
    pub implementation_count: usize,
    /// Distinct types implementing at least one interface.
    pub implementer_count: usize,
    pub avg_implementers: f64,
    pub almost_count: usize,
    pub unused_count: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InterfaceAnalysis {
    pub interfaces: Vec<Interface>,
    pub implementations: Vec<Implementation>,
    pub almost_implementations: Vec<AlmostImplementation>,
    /// Ids of project interfaces nothing implements.
    pub unused: Vec<String>,
    pub stats: InterfaceStats,
}

impl InterfaceAnalysis {
    pub fn interface(&self, id: &str) -> Option<&Interface> {
        self.interfaces.iter().find(|i| i.id == id)
    }

    pub fn implementations_of<'a>(&'a self, interface: &'a str) -> impl Iterator<Item = &'a Implementation> + 'a {
        self.implementations
            .iter()
            .filter(move |i| i.interface == interface)
    }

    pub fn implementers_count(&self, interface: &str) -> usize {
        self.interface(interface).map_or(0, |i| i.implementers)
    }

    pub fn almost_implementations_of<'a>(
        &'a self,
        interface: &'a str,
    ) -> impl Iterator<Item = &'a AlmostImplementation> + 'a {
        self.almost_implementations
            .iter()
            .filter(move |a| a.interface == interface)
    }
}

enum Conformance {
    Complete(Vec<String>),
    Almost(Vec<String>, Vec<String>),
    Unrelated,
}

/// Standard library interfaces worth surfacing even though their
/// declarations are outside the analyzed tree.
pub fn well_known_interfaces() -> Vec<Interface> {
    let bytes_io = || (vec!["[]byte".to_string()], vec!["int".to_string(), "error".to_string()]);
    let read = || {
        let (params, returns) = bytes_io();
        MethodSignature::new("Read", params, returns)
    };
    let write = || {
        let (params, returns) = bytes_io();
        MethodSignature::new("Write", params, returns)
    };
    let close = || MethodSignature::new("Close", Vec::new(), vec!["error".to_string()]);

    let catalogue = [
        ("", "error", vec![MethodSignature::new("Error", Vec::new(), vec!["string".to_string()])]),
        ("fmt", "Stringer", vec![MethodSignature::new("String", Vec::new(), vec!["string".to_string()])]),
        ("io", "Reader", vec![read()]),
        ("io", "Writer", vec![write()]),
        ("io", "Closer", vec![close()]),
        ("io", "ReadWriter", vec![read(), write()]),
        ("io", "ReadCloser", vec![read(), close()]),
        ("io", "WriteCloser", vec![write(), close()]),
    ];

    catalogue
        .into_iter()
        .map(|(package, name, methods)| Interface {
            id: if package.is_empty() {
                name.to_string()
            } else {
                format!("{}.{}", package, name)
            },
            name: name.to_string(),
            package: package.to_string(),
            methods,
            well_known: true,
            implementers: 0,
        })
        .collect()
}

/// Matches every concrete type in `project` against every project
/// interface and the well-known catalogue.
pub fn analyze_interfaces(project: &Project) -> Result<InterfaceAnalysis> {
    let mut analysis = InterfaceAnalysis::default();
    if project.is_empty() {
        debug!("Empty project, returning empty interface analysis");
        return Ok(analysis);
    }

    let catalogue = well_known_interfaces();
    let resolver = Resolver {
        project,
        catalogue: &catalogue,
    };

    let mut interfaces: Vec<Interface> = Vec::new();
    for package in &project.packages {
        for ty in package.types.iter().filter(|t| t.is_interface()) {
            let mut visited = BTreeSet::new();
            interfaces.push(Interface {
                id: interface_id(package, &ty.name),
                name: ty.name.clone(),
                package: package.import_path.clone(),
                methods: resolver.method_set(package, ty, &mut visited),
                well_known: false,
                implementers: 0,
            });
        }
    }
    interfaces.extend(catalogue.iter().cloned());

    for interface in interfaces.iter_mut() {
        if interface.methods.is_empty() {
            continue;
        }

        for package in &project.packages {
            for ty in package.types.iter().filter(|t| !t.is_interface()) {
                match conformance(ty, &interface.methods) {
                    Conformance::Complete(matched) => {
                        interface.implementers += 1;
                        analysis.implementations.push(Implementation {
                            type_name: ty.name.clone(),
                            type_package: package.import_path.clone(),
                            interface: interface.id.clone(),
                            matched,
                        });
                    }
                    Conformance::Almost(matched, missing) => {
                        analysis.almost_implementations.push(AlmostImplementation {
                            type_name: ty.name.clone(),
                            type_package: package.import_path.clone(),
                            interface: interface.id.clone(),
                            matched,
                            missing_count: missing.len(),
                            missing,
                        });
                    }
                    Conformance::Unrelated => {}
                }
            }
        }
    }

    analysis.unused = interfaces
        .iter()
        .filter(|i| !i.well_known && i.implementers == 0)
        .map(|i| i.id.clone())
        .collect();

    analysis
        .implementations
        .sort_by(|a, b| (&a.interface, &a.type_package, &a.type_name).cmp(&(&b.interface, &b.type_package, &b.type_name)));
    analysis
        .almost_implementations
        .sort_by(|a, b| (&a.interface, &a.type_package, &a.type_name).cmp(&(&b.interface, &b.type_package, &b.type_name)));
    analysis.unused.sort();
    analysis.interfaces = interfaces;
    analysis.stats = compute_stats(&analysis);

    info!(
        "Interface analysis: {} interfaces, {} implementations, {} almost, {} unused",
        analysis.stats.interface_count + analysis.stats.well_known_count,
        analysis.stats.implementation_count,
        analysis.stats.almost_count,
        analysis.stats.unused_count
    );

    Ok(analysis)
}

fn interface_id(package: &Package, name: &str) -> String {
    if package.import_path.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", package.import_path, name)
    }
}

/// Name plus arity per required method. Zero matches is never "almost".
fn conformance(ty: &Type, required: &[MethodSignature]) -> Conformance {
    let mut matched = Vec::new();
    let mut missing = Vec::new();

    for method in required {
        match ty.method(&method.name) {
            Some(provided) if provided.is_compatible_with(method) => matched.push(method.name.clone()),
            _ => missing.push(method.name.clone()),
        }
    }

    if missing.is_empty() {
        Conformance::Complete(matched)
    } else if !matched.is_empty() && missing.len() <= MAX_MISSING_METHODS {
        Conformance::Almost(matched, missing)
    } else {
        Conformance::Unrelated
    }
}

fn compute_stats(analysis: &InterfaceAnalysis) -> InterfaceStats {
    let well_known_count = analysis.interfaces.iter().filter(|i| i.well_known).count();
    let implementer_count = analysis
        .implementations
        .iter()
        .map(|i| (&i.type_package, &i.type_name))
        .collect::<BTreeSet<_>>()
        .len();
    let avg_implementers = if analysis.interfaces.is_empty() {
        0.0
    } else {
        analysis.implementations.len() as f64 / analysis.interfaces.len() as f64
    };

    InterfaceStats {
        interface_count: analysis.interfaces.len() - well_known_count,
        well_known_count,
        implementation_count: analysis.implementations.len(),
        implementer_count,
        avg_implementers,
        almost_count: analysis.almost_implementations.len(),
        unused_count: analysis.unused.len(),
    }
}

/// Resolves embedded interface names to flattened method sets.
struct Resolver<'a> {
    project: &'a Project,
    catalogue: &'a [Interface],
}

impl<'a> Resolver<'a> {
    fn method_set(&self, package: &Package, ty: &Type, visited: &mut BTreeSet<String>) -> Vec<MethodSignature> {
        if !visited.insert(interface_id(package, &ty.name)) {
            return Vec::new();
        }

        let mut methods = ty.methods.clone();
        for embedded in &ty.embedded {
            for method in self.embedded_methods(package, embedded, visited) {
                if !methods.iter().any(|m| m.name == method.name) {
                    methods.push(method);
                }
            }
        }
        methods
    }

    /// Same package first, then dot-imported project packages, then the catalogue.
    fn embedded_methods(&self, package: &Package, name: &str, visited: &mut BTreeSet<String>) -> Vec<MethodSignature> {
        if let Some((qualifier, base)) = name.split_once('.') {
            let import_path = package.imports.get(qualifier).map(String::as_str).unwrap_or(qualifier);
            if let Some(target) = self.project.package(import_path) {
                if let Some(ty) = target.find_type(base).filter(|t| t.is_interface()) {
                    return self.method_set(target, ty, visited);
                }
            }
            return self.catalogue_methods(&format!("{}.{}", import_path, base));
        }

        if let Some(ty) = package.find_type(name).filter(|t| t.is_interface()) {
            return self.method_set(package, ty, visited);
        }

        // Unqualified names from elsewhere arrive through dot imports, which
        // the alias table keys by their own path
        for (key, path) in &package.imports {
            if key != path {
                continue;
            }
            if let Some(other) = self.project.package(path) {
                if let Some(ty) = other.find_type(name).filter(|t| t.is_interface()) {
                    return self.method_set(other, ty, visited);
                }
            }
        }

        self.catalogue_methods(name)
    }

    fn catalogue_methods(&self, id: &str) -> Vec<MethodSignature> {
        self.catalogue
            .iter()
            .find(|i| i.id == id)
            .map(|i| i.methods.clone())
            .unwrap_or_default()
    }
}
