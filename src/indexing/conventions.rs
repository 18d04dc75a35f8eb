use crate::model::{Convention, ConventionTarget, Package};
use log::warn;
use regex::Regex;

/// Attaches advisory naming tags to a package. Never consulted by the
/// dependency or interface analyses.
pub trait ConventionDetector: Send + Sync {
    fn detect(&self, package: &Package) -> Vec<Convention>;
}

pub struct ConventionPattern {
    pub name: String,
    pub target: ConventionTarget,
    pub regex: Regex,
}

impl ConventionPattern {
    pub fn new(name: &str, target: ConventionTarget, pattern: &str) -> Option<Self> {
        match Regex::new(pattern) {
            Ok(regex) => Some(ConventionPattern {
                name: name.to_string(),
                target,
                regex,
            }),
            Err(e) => {
                warn!("Ignoring convention pattern {}: {}", name, e);
                None
            }
        }
    }

    fn matches(&self, target: ConventionTarget, name: &str) -> bool {
        self.target == target && self.regex.is_match(name)
    }
}

/// Ordered pattern list; the first matching pattern tags a declaration.
pub struct PatternConventionDetector {
    patterns: Vec<ConventionPattern>,
}

impl PatternConventionDetector {
    pub fn new(patterns: Vec<ConventionPattern>) -> Self {
        Self { patterns }
    }

    fn classify(&self, target: ConventionTarget, name: &str) -> Option<&ConventionPattern> {
        self.patterns.iter().find(|p| p.matches(target, name))
    }
}

impl Default for PatternConventionDetector {
    fn default() -> Self {
        let patterns = [
            ("constructor", ConventionTarget::Function, r"^New([A-Z0-9_]|$)"),
            ("middleware", ConventionTarget::Function, r"Middleware$"),
            ("handler", ConventionTarget::Type, r"Handler$"),
            ("repository", ConventionTarget::Type, r"(Repository|Repo|Store)$"),
            ("service", ConventionTarget::Type, r"Service$"),
            ("middleware", ConventionTarget::Type, r"Middleware$"),
        ];

        Self::new(
            patterns
                .iter()
                .filter_map(|(name, target, pattern)| ConventionPattern::new(name, *target, pattern))
                .collect(),
        )
    }
}

impl ConventionDetector for PatternConventionDetector {
    fn detect(&self, package: &Package) -> Vec<Convention> {
        let types = package
            .types
            .iter()
            .map(|t| (ConventionTarget::Type, t.name.as_str()));
        let functions = package
            .functions
            .iter()
            .filter(|f| !f.is_method())
            .map(|f| (ConventionTarget::Function, f.name.as_str()));

        types
            .chain(functions)
            .filter_map(|(target, name)| {
                self.classify(target, name).map(|pattern| Convention {
                    name: pattern.name.clone(),
                    target: name.to_string(),
                    kind: target,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Function, Type, TypeKind};

    #[test]
    fn first_matching_pattern_wins() {
        let package = crate::model::Package::new("user", "/src/user", "example.com/user")
            .with_type(Type::new("UserStore", TypeKind::Struct))
            .with_type(Type::new("UserHandler", TypeKind::Struct))
            .with_type(Type::new("user", TypeKind::Struct))
            .with_function(Function::new("NewUserStore"))
            .with_function(Function::new("Newline"));

        let conventions = PatternConventionDetector::default().detect(&package);
        let tags: Vec<(&str, &str)> = conventions
            .iter()
            .map(|c| (c.target.as_str(), c.name.as_str()))
            .collect();
        assert_eq!(
            tags,
            vec![
                ("UserStore", "repository"),
                ("UserHandler", "handler"),
                ("NewUserStore", "constructor"),
            ]
        );
    }
}
