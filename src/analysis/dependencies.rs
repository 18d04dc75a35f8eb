use crate::error::Result;
use crate::indexing::extractor::common::unquote;
use crate::model::{Package, Project};
use crate::parsers::treesitter::TreeSitterParser;
use crate::parsers::treesitter::queries::go::IMPORT_QUERY;
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fs;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Node {
    /// Import path of the package.
    pub id: String,
    /// Declared package name, for packages found in the project.
    pub name: Option<String>,
    pub internal: bool,
    pub import_count: usize,
    pub dependent_count: usize,
    pub layer: Option<usize>,
}

impl Node {
    fn new(id: impl Into<String>, internal: bool) -> Self {
        Node {
            id: id.into(),
            name: None,
            internal,
            import_count: 0,
            dependent_count: 0,
            layer: None,
        }
    }
}

/// `from` imports `to`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub internal: bool,
    pub is_cycle: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Stats {
    pub total_nodes: usize,
    pub internal_nodes: usize,
    pub external_nodes: usize,
    pub total_edges: usize,
    pub internal_edges: usize,
    pub external_edges: usize,
    pub cycle_count: usize,
    pub max_layer: usize,
    pub avg_dependents: f64,
}

/// Package import graph keyed by import path.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DependencyGraph {
    pub module: String,
    pub nodes: BTreeMap<String, Node>,
    pub edges: Vec<Edge>,
    pub cycles: Vec<Vec<String>>,
    pub layers: BTreeMap<String, usize>,
    pub stats: Stats,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum VisitState {
    OnStack,
    Done,
}

impl DependencyGraph {
    pub fn new(module: impl Into<String>) -> Self {
        DependencyGraph {
            module: module.into(),
            ..Default::default()
        }
    }

    /// Adds a node unless one with the same id exists. Returns the node either way.
    pub fn add_node(&mut self, id: &str, internal: bool) -> &mut Node {
        self.nodes
            .entry(id.to_string())
            .or_insert_with(|| Node::new(id, internal))
    }

    /// Adds `from -> to` once. Self edges are ignored; unknown endpoints are
    /// added and classified against the module path.
    pub fn add_edge(&mut self, from: &str, to: &str) -> bool {
        if from == to || self.edges.iter().any(|e| e.from == from && e.to == to) {
            return false;
        }

        let from_internal = self.is_module_path(from);
        let to_internal = self.is_module_path(to);
        let from_internal = self.add_node(from, from_internal).internal;
        let to_internal = self.add_node(to, to_internal).internal;

        if let Some(node) = self.nodes.get_mut(from) {
            node.import_count += 1;
        }
        if let Some(node) = self.nodes.get_mut(to) {
            node.dependent_count += 1;
        }

        self.edges.push(Edge {
            from: from.to_string(),
            to: to.to_string(),
            internal: from_internal && to_internal,
            is_cycle: false,
        });
        true
    }

    /// True when `import_path` is the module itself or lives below it.
    pub fn is_module_path(&self, import_path: &str) -> bool {
        !self.module.is_empty()
            && (import_path == self.module
                || import_path
                    .strip_prefix(self.module.as_str())
                    .is_some_and(|rest| rest.starts_with('/')))
    }

    /// Depth-first search over internal edges. The first back edge reached
    /// from a root yields the stack slice from its target as that root's
    /// cycle; the search then resumes from the next unvisited root. Edges
    /// along every reported cycle are flagged.
    pub fn detect_cycles(&mut self) {
        let adjacency = self.internal_adjacency(false);
        let mut state: BTreeMap<&str, VisitState> = BTreeMap::new();
        let mut stack: Vec<&str> = Vec::new();
        let mut cycles: Vec<Vec<String>> = Vec::new();

        for root in adjacency.keys() {
            if !state.contains_key(root.as_str()) {
                visit(root, &adjacency, &mut state, &mut stack, &mut cycles);
            }
        }

        for edge in &mut self.edges {
            edge.is_cycle = false;
        }
        for cycle in &cycles {
            for (i, from) in cycle.iter().enumerate() {
                let to = &cycle[(i + 1) % cycle.len()];
                if let Some(edge) = self
                    .edges
                    .iter_mut()
                    .find(|e| &e.from == from && &e.to == to)
                {
                    edge.is_cycle = true;
                }
            }
        }

        if !cycles.is_empty() {
            debug!("Detected {} import cycles", cycles.len());
        }
        self.cycles = cycles;
    }

    /// Kahn traversal over internal edges not flagged as cycle edges.
    /// Packages that import nothing internal sit at layer 0 and every
    /// importer lands at least one layer above each package it imports.
    /// Packages held back by a cycle that was not reported keep the layer
    /// reached so far.
    pub fn compute_layers(&mut self) {
        let dependencies = self.internal_adjacency(true);
        let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        let mut remaining: BTreeMap<&str, usize> = BTreeMap::new();
        let mut layers: BTreeMap<String, usize> = BTreeMap::new();

        for (id, targets) in &dependencies {
            remaining.insert(id.as_str(), targets.len());
            layers.insert(id.clone(), 0);
            for target in targets {
                dependents.entry(target.as_str()).or_default().push(id.as_str());
            }
        }

        let mut queue: VecDeque<&str> = remaining
            .iter()
            .filter(|&(_, count)| *count == 0)
            .map(|(id, _)| *id)
            .collect();

        while let Some(current) = queue.pop_front() {
            let current_layer = layers.get(current).copied().unwrap_or(0);
            for &importer in dependents.get(current).map(Vec::as_slice).unwrap_or(&[]) {
                let layer = layers.entry(importer.to_string()).or_insert(0);
                *layer = (*layer).max(current_layer + 1);

                if let Some(count) = remaining.get_mut(importer) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        queue.push_back(importer);
                    }
                }
            }
        }

        for node in self.nodes.values_mut() {
            node.layer = layers.get(&node.id).copied();
        }
        self.layers = layers;
    }

    pub fn compute_stats(&mut self) {
        let internal: Vec<&Node> = self.nodes.values().filter(|n| n.internal).collect();
        let internal_edges = self.edges.iter().filter(|e| e.internal).count();
        let avg_dependents = if internal.is_empty() {
            0.0
        } else {
            internal.iter().map(|n| n.dependent_count).sum::<usize>() as f64 / internal.len() as f64
        };

        self.stats = Stats {
            total_nodes: self.nodes.len(),
            internal_nodes: internal.len(),
            external_nodes: self.nodes.len() - internal.len(),
            total_edges: self.edges.len(),
            internal_edges,
            external_edges: self.edges.len() - internal_edges,
            cycle_count: self.cycles.len(),
            max_layer: self.layers.values().copied().max().unwrap_or(0),
            avg_dependents,
        };
    }

    pub fn has_circular_dependency(&self) -> bool {
        !self.cycles.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Packages imported by `id`.
    pub fn dependencies_of(&self, id: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|e| e.from == id)
            .map(|e| e.to.as_str())
            .collect()
    }

    /// Packages importing `id`.
    pub fn dependents_of(&self, id: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|e| e.to == id)
            .map(|e| e.from.as_str())
            .collect()
    }

    pub fn layer_of(&self, id: &str) -> Option<usize> {
        self.layers.get(id).copied()
    }

    /// Internal packages grouped by layer.
    pub fn layers(&self) -> BTreeMap<usize, Vec<&str>> {
        let mut grouped: BTreeMap<usize, Vec<&str>> = BTreeMap::new();
        for (id, layer) in &self.layers {
            grouped.entry(*layer).or_default().push(id.as_str());
        }
        grouped
    }

    pub fn external_nodes(&self) -> Vec<&Node> {
        self.nodes.values().filter(|n| !n.internal).collect()
    }

    /// Internal node -> internal targets, every internal node present as a key.
    fn internal_adjacency(&self, skip_cycle_edges: bool) -> BTreeMap<String, BTreeSet<String>> {
        let mut adjacency: BTreeMap<String, BTreeSet<String>> = self
            .nodes
            .values()
            .filter(|n| n.internal)
            .map(|n| (n.id.clone(), BTreeSet::new()))
            .collect();

        for edge in &self.edges {
            if !edge.internal || (skip_cycle_edges && edge.is_cycle) {
                continue;
            }
            adjacency
                .entry(edge.from.clone())
                .or_default()
                .insert(edge.to.clone());
        }

        adjacency
    }
}

/// Returns true once a back edge closed a cycle; the caller unwinds
/// without exploring further from this root.
fn visit<'g>(
    node: &'g str,
    adjacency: &'g BTreeMap<String, BTreeSet<String>>,
    state: &mut BTreeMap<&'g str, VisitState>,
    stack: &mut Vec<&'g str>,
    cycles: &mut Vec<Vec<String>>,
) -> bool {
    state.insert(node, VisitState::OnStack);
    stack.push(node);

    let mut found = false;
    if let Some(targets) = adjacency.get(node) {
        for next in targets {
            match state.get(next.as_str()) {
                None => found = visit(next, adjacency, state, stack, cycles),
                Some(VisitState::OnStack) => {
                    if let Some(start) = stack.iter().position(|n| *n == next) {
                        cycles.push(stack[start..].iter().map(|n| n.to_string()).collect());
                    }
                    found = true;
                }
                Some(VisitState::Done) => {}
            }
            if found {
                break;
            }
        }
    }

    stack.pop();
    state.insert(node, VisitState::Done);
    found
}

/// Builds the package graph of `project`, then runs cycle detection,
/// layering and stats. An empty project yields an empty graph.
pub fn analyze_dependencies(project: &Project) -> Result<DependencyGraph> {
    let mut graph = DependencyGraph::new(project.module.clone());
    if project.is_empty() {
        debug!("Empty project, returning empty dependency graph");
        return Ok(graph);
    }

    for package in &project.packages {
        let node = graph.add_node(&package.import_path, true);
        node.internal = true;
        node.name = Some(package.name.clone());
    }

    let mut parser = TreeSitterParser::new()?;
    for package in &project.packages {
        for import in package_imports(&mut parser, package) {
            if import != package.import_path {
                graph.add_edge(&package.import_path, &import);
            }
        }
    }

    graph.detect_cycles();
    graph.compute_layers();
    graph.compute_stats();

    info!(
        "Dependency graph: {} nodes ({} internal), {} edges, {} cycles, {} layers",
        graph.stats.total_nodes,
        graph.stats.internal_nodes,
        graph.stats.total_edges,
        graph.stats.cycle_count,
        graph.layers().len()
    );

    Ok(graph)
}

/// Distinct import paths of the package, read from the import declarations
/// of its files. Falls back to the extracted alias table when the files are
/// not on disk.
fn package_imports(parser: &mut TreeSitterParser, package: &Package) -> BTreeSet<String> {
    let mut imports = BTreeSet::new();
    let mut parsed_any = false;

    for file in &package.files {
        let path = package.path.join(file);
        let Ok(content) = fs::read_to_string(&path) else {
            trace!("Cannot re-read {:?} for imports", path);
            continue;
        };
        let texts = parser
            .parse_file(&path, &content)
            .and_then(|tree| parser.capture_texts(IMPORT_QUERY, &tree, &content, "import_path"));
        match texts {
            Ok(texts) => {
                parsed_any = true;
                imports.extend(texts.iter().map(|t| unquote(t)));
            }
            Err(e) => trace!("Cannot re-parse imports of {:?}: {}", path, e),
        }
    }

    if !parsed_any {
        imports.extend(package.imports.values().cloned());
    }
    imports
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODULE: &str = "example.com/shop";

    fn package(name: &str, imports: &[&str]) -> Package {
        let mut package = Package::new(name, format!("/nonexistent/{}", name), format!("{}/{}", MODULE, name));
        for import in imports {
            package = package.with_import(*import, *import);
        }
        package
    }

    fn project(packages: Vec<Package>) -> Project {
        packages
            .into_iter()
            .fold(Project::new("/nonexistent", MODULE), Project::with_package)
    }

    fn id(name: &str) -> String {
        format!("{}/{}", MODULE, name)
    }

    #[test]
    fn layered_packages_without_cycles() {
        let project = project(vec![
            package("repo", &["database/sql"]),
            package("service", &["example.com/shop/repo"]),
            package("handler", &["example.com/shop/service", "net/http"]),
        ]);

        let graph = analyze_dependencies(&project).unwrap();
        assert_eq!(graph.layer_of(&id("repo")), Some(0));
        assert_eq!(graph.layer_of(&id("service")), Some(1));
        assert_eq!(graph.layer_of(&id("handler")), Some(2));
        assert_eq!(graph.node(&id("repo")).unwrap().dependent_count, 1);
        assert!(graph.cycles.is_empty());
        assert!(!graph.has_circular_dependency());

        assert_eq!(graph.stats.internal_nodes, 3);
        assert_eq!(graph.stats.external_nodes, 2);
        assert_eq!(graph.stats.internal_edges, 2);
        assert_eq!(graph.stats.external_edges, 2);
        assert_eq!(graph.stats.max_layer, 2);
        assert!(graph.layer_of("net/http").is_none());
        assert_eq!(graph.external_nodes().len(), 2);
    }

    #[test]
    fn mutual_imports_form_one_cycle() {
        let project = project(vec![
            package("a", &["example.com/shop/b"]),
            package("b", &["example.com/shop/a"]),
        ]);

        let graph = analyze_dependencies(&project).unwrap();
        assert!(graph.has_circular_dependency());
        assert_eq!(graph.cycles.len(), 1);
        assert_eq!(graph.cycles[0].len(), 2);
        assert!(graph.cycles[0].contains(&id("a")));
        assert!(graph.cycles[0].contains(&id("b")));
        assert!(graph.edges.iter().all(|e| e.is_cycle));

        // Cycle edges are excluded from layering rather than aborting it
        assert_eq!(graph.layer_of(&id("a")), Some(0));
        assert_eq!(graph.layer_of(&id("b")), Some(0));
    }

    #[test]
    fn importer_of_a_cycle_still_gets_a_layer() {
        let project = project(vec![
            package("a", &["example.com/shop/b"]),
            package("b", &["example.com/shop/a"]),
            package("cmd", &["example.com/shop/a"]),
        ]);

        let graph = analyze_dependencies(&project).unwrap();
        assert_eq!(graph.layer_of(&id("cmd")), Some(1));
        let cmd_edge = graph.edges.iter().find(|e| e.from == id("cmd")).unwrap();
        assert!(!cmd_edge.is_cycle);
    }

    #[test]
    fn longest_chain_decides_the_layer() {
        let project = project(vec![
            package("model", &[]),
            package("repo", &["example.com/shop/model"]),
            package("api", &["example.com/shop/model", "example.com/shop/repo"]),
        ]);

        let graph = analyze_dependencies(&project).unwrap();
        assert_eq!(graph.layer_of(&id("api")), Some(2));
        let grouped = graph.layers();
        assert_eq!(grouped.get(&0).cloned(), Some(vec![id("model").as_str()]));
        assert_eq!(graph.dependents_of(&id("model")).len(), 2);
        assert_eq!(graph.dependencies_of(&id("api")).len(), 2);
    }

    #[test]
    fn unseen_module_packages_are_internal() {
        let project = project(vec![
            package("api", &["example.com/shop/gen/proto", "example.com/shopping/x", "fmt"]),
        ]);

        let graph = analyze_dependencies(&project).unwrap();
        assert!(graph.node("example.com/shop/gen/proto").unwrap().internal);
        assert!(!graph.node("example.com/shopping/x").unwrap().internal);
        assert!(!graph.node("fmt").unwrap().internal);
        assert_eq!(graph.layer_of("example.com/shop/gen/proto"), Some(0));
        assert_eq!(graph.layer_of(&id("api")), Some(1));
    }

    #[test]
    fn duplicate_and_self_edges_are_ignored() {
        let mut graph = DependencyGraph::new(MODULE);
        graph.add_node(&id("a"), true);
        assert!(graph.add_edge(&id("a"), "fmt"));
        assert!(!graph.add_edge(&id("a"), "fmt"));
        assert!(!graph.add_edge(&id("a"), &id("a")));
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.node(&id("a")).unwrap().import_count, 1);
        assert_eq!(graph.node("fmt").unwrap().dependent_count, 1);
    }

    #[test]
    fn three_node_cycle_marks_every_edge() {
        let mut graph = DependencyGraph::new(MODULE);
        for name in ["a", "b", "c"] {
            graph.add_node(&id(name), true);
        }
        graph.add_edge(&id("a"), &id("b"));
        graph.add_edge(&id("b"), &id("c"));
        graph.add_edge(&id("c"), &id("a"));
        graph.detect_cycles();
        graph.compute_layers();

        assert_eq!(graph.cycles, vec![vec![id("a"), id("b"), id("c")]]);
        assert!(graph.edges.iter().all(|e| e.is_cycle));
        assert_eq!(graph.layers.len(), 3);
    }

    #[test]
    fn one_cycle_per_search_root() {
        let mut graph = DependencyGraph::new(MODULE);
        for name in ["a", "b", "c"] {
            graph.add_node(&id(name), true);
        }
        graph.add_edge(&id("a"), &id("b"));
        graph.add_edge(&id("b"), &id("a"));
        graph.add_edge(&id("a"), &id("c"));
        graph.add_edge(&id("c"), &id("a"));
        graph.detect_cycles();
        graph.compute_layers();
        graph.compute_stats();

        assert_eq!(graph.cycles, vec![vec![id("a"), id("b")]]);
        assert_eq!(graph.stats.cycle_count, 1);
        let flagged: Vec<(&str, &str)> = graph
            .edges
            .iter()
            .filter(|e| e.is_cycle)
            .map(|e| (e.from.as_str(), e.to.as_str()))
            .collect();
        assert_eq!(flagged.len(), 2);
        assert!(flagged.iter().all(|(from, to)| !from.ends_with("/c") && !to.ends_with("/c")));

        // Unresolved nodes keep a best-effort layer
        for name in ["a", "b", "c"] {
            assert_eq!(graph.layer_of(&id(name)), Some(0));
        }
    }

    #[test]
    fn empty_project_has_empty_graph() {
        let graph = analyze_dependencies(&Project::default()).unwrap();
        assert!(graph.nodes.is_empty());
        assert!(graph.edges.is_empty());
        assert_eq!(graph.stats, Stats::default());
    }

    #[test]
    fn imports_are_read_from_source_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("main.go"),
            "package main\n\nimport (\n\t\"fmt\"\n\tlog \"github.com/sirupsen/logrus\"\n\t_ \"embed\"\n)\n",
        )
        .unwrap();

        let mut main = Package::new("main", dir.path(), MODULE);
        main.files.push("main.go".to_string());
        let project = Project::new(dir.path(), MODULE).with_package(main);

        let graph = analyze_dependencies(&project).unwrap();
        let mut targets = graph.dependencies_of(MODULE);
        targets.sort();
        assert_eq!(targets, vec!["embed", "fmt", "github.com/sirupsen/logrus"]);
    }
}
