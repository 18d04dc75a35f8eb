pub mod dependencies;
pub mod interfaces;

pub use dependencies::{DependencyGraph, Edge, Node, Stats, analyze_dependencies};
pub use interfaces::{
    AlmostImplementation, Implementation, Interface, InterfaceAnalysis, InterfaceStats,
    analyze_interfaces, well_known_interfaces,
};
