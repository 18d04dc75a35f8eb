use crate::error::Result;
use crate::indexing::extractor::common::{
    base_type_name, collapse_whitespace, collect_kinds, default_import_alias, doc_comment,
    is_predeclared_type, unquote,
};
use crate::model::{Field, Function, MethodSignature, Param, Type, TypeKind, Value};
use crate::parsers::treesitter::{TreeSitterParser, node_text};
use log::trace;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tree_sitter::Node;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpec {
    /// Explicit name as written (`_`, `.`, or an identifier); `None` when omitted.
    pub name: Option<String>,
    pub path: String,
}

impl ImportSpec {
    /// Identifier the file uses to qualify references, if any.
    pub fn qualifier(&self) -> Option<String> {
        match self.name.as_deref() {
            Some("_") | Some(".") => None,
            Some(name) => Some(name.to_string()),
            None => Some(default_import_alias(&self.path)),
        }
    }

    /// Key in `Package::imports`; blank and dot imports are keyed by path.
    pub fn alias_key(&self) -> String {
        self.qualifier().unwrap_or_else(|| self.path.clone())
    }
}

/// Declarations of one translation unit.
#[derive(Debug, Default)]
pub struct FileUnit {
    pub file_name: String,
    pub package_name: String,
    pub imports: Vec<ImportSpec>,
    pub types: Vec<Type>,
    pub functions: Vec<Function>,
    pub variables: Vec<Value>,
    pub constants: Vec<Value>,
}

pub struct GoExtractor;

impl GoExtractor {
    pub fn new() -> Self {
        GoExtractor
    }

    pub fn extract_file(
        &self,
        parser: &mut TreeSitterParser,
        file_path: &Path,
        content: &str,
    ) -> Result<FileUnit> {
        let tree = parser.parse_file(file_path, content)?;
        let root = tree.root_node();

        let mut unit = FileUnit {
            file_name: file_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            ..FileUnit::default()
        };

        // Imports first so body walks can resolve qualifiers
        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            match child.kind() {
                "package_clause" => {
                    let mut inner = child.walk();
                    if let Some(name) = child
                        .named_children(&mut inner)
                        .find(|n| n.kind() == "package_identifier")
                    {
                        unit.package_name = node_text(name, content).to_string();
                    }
                }
                "import_declaration" => unit.imports.extend(extract_imports(child, content)),
                _ => {}
            }
        }

        let aliases: HashMap<String, String> = unit
            .imports
            .iter()
            .filter_map(|spec| spec.qualifier().map(|q| (q, spec.path.clone())))
            .collect();

        let visitor = DeclarationVisitor {
            source: content,
            file_name: &unit.file_name,
            aliases: &aliases,
        };

        let mut types = Vec::new();
        let mut functions = Vec::new();
        let mut variables = Vec::new();
        let mut constants = Vec::new();

        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            match child.kind() {
                "type_declaration" => visitor.visit_type_declaration(child, &mut types),
                "function_declaration" | "method_declaration" => {
                    if let Some(function) = visitor.visit_function(child) {
                        functions.push(function);
                    }
                }
                "var_declaration" => visitor.visit_values(child, "var_spec", &mut variables),
                "const_declaration" => visitor.visit_values(child, "const_spec", &mut constants),
                _ => {}
            }
        }

        trace!(
            "{}: {} types, {} functions, {} vars, {} consts",
            unit.file_name,
            types.len(),
            functions.len(),
            variables.len(),
            constants.len()
        );

        unit.types = types;
        unit.functions = functions;
        unit.variables = variables;
        unit.constants = constants;
        Ok(unit)
    }
}

/// Import specs of one `import` declaration, grouped or not.
pub fn extract_imports(declaration: Node, source: &str) -> Vec<ImportSpec> {
    let mut specs = Vec::new();
    collect_kinds(declaration, &["import_spec"], &mut specs);

    specs
        .into_iter()
        .filter_map(|spec| {
            let path = unquote(node_text(spec.child_by_field_name("path")?, source));
            let name = spec
                .child_by_field_name("name")
                .map(|n| node_text(n, source).to_string());
            Some(ImportSpec { name, path })
        })
        .collect()
}

struct DeclarationVisitor<'a> {
    source: &'a str,
    file_name: &'a str,
    aliases: &'a HashMap<String, String>,
}

impl<'a> DeclarationVisitor<'a> {
    fn text(&self, node: Node) -> &'a str {
        node_text(node, self.source)
    }

    fn visit_type_declaration(&self, declaration: Node, types: &mut Vec<Type>) {
        let doc = doc_comment(declaration, self.source);
        let mut specs = Vec::new();
        collect_kinds(declaration, &["type_spec", "type_alias"], &mut specs);

        for spec in specs {
            // Grouped specs carry their own comment; a lone spec inherits the declaration's
            let spec_doc = doc_comment(spec, self.source).or_else(|| doc.clone());
            if let Some(ty) = self.visit_type_spec(spec, spec_doc) {
                types.push(ty);
            }
        }
    }

    fn visit_type_spec(&self, spec: Node, doc: Option<String>) -> Option<Type> {
        let name = self.text(spec.child_by_field_name("name")?).to_string();
        let type_node = spec.child_by_field_name("type")?;
        let type_params = self.type_param_names(spec.child_by_field_name("type_parameters"));

        let kind = if spec.kind() == "type_alias" {
            TypeKind::Alias
        } else {
            match type_node.kind() {
                "interface_type" => TypeKind::Interface,
                _ if !type_params.is_empty() => TypeKind::Generic,
                "struct_type" => TypeKind::Struct,
                _ => TypeKind::Alias,
            }
        };

        let mut ty = Type::new(name, kind);
        ty.file = self.file_name.to_string();
        ty.line = spec.start_position().row + 1;
        ty.doc = doc;

        match type_node.kind() {
            "struct_type" => self.visit_struct_fields(type_node, &mut ty),
            "interface_type" => self.visit_interface_elems(type_node, &mut ty),
            _ => ty.underlying = Some(collapse_whitespace(self.text(type_node))),
        }

        let mut exclude = type_params.clone();
        exclude.push(ty.name.clone());
        let mut usage = UsageCollector::new(self, &exclude);
        usage.visit(type_node);
        ty.used_types = usage.types.into_iter().collect();
        ty.type_params = type_params;

        Some(ty)
    }

    fn visit_struct_fields(&self, struct_node: Node, ty: &mut Type) {
        let mut declarations = Vec::new();
        collect_kinds(struct_node, &["field_declaration"], &mut declarations);

        for declaration in declarations {
            let Some(type_node) = declaration.child_by_field_name("type") else {
                continue;
            };
            let mut type_name = collapse_whitespace(self.text(type_node));
            let tag = declaration
                .child_by_field_name("tag")
                .map(|t| unquote(self.text(t)));

            let mut cursor = declaration.walk();
            let names: Vec<String> = declaration
                .children_by_field_name("name", &mut cursor)
                .filter(|n| n.is_named())
                .map(|n| self.text(n).to_string())
                .collect();

            if names.is_empty() {
                // Embedded: the pointer token sits outside the `type` field
                let mut cursor = declaration.walk();
                if declaration.children(&mut cursor).any(|c| c.kind() == "*") {
                    type_name = format!("*{}", type_name);
                }
                ty.embedded.push(base_type_name(&type_name));
                push_fields(&mut ty.fields, vec![String::new()], &type_name, &tag);
            } else {
                push_fields(&mut ty.fields, names, &type_name, &tag);
            }
        }
    }

    fn visit_interface_elems(&self, interface_node: Node, ty: &mut Type) {
        let mut elems = Vec::new();
        collect_kinds(
            interface_node,
            &["method_elem", "method_spec", "type_elem", "type_identifier", "qualified_type"],
            &mut elems,
        );

        for elem in elems {
            match elem.kind() {
                "method_elem" | "method_spec" => {
                    let Some(name) = elem.child_by_field_name("name") else {
                        continue;
                    };
                    let params = self.params(elem.child_by_field_name("parameters"));
                    let returns = self.params(elem.child_by_field_name("result"));
                    ty.methods.push(MethodSignature::new(
                        self.text(name),
                        params.into_iter().map(|p| p.type_name).collect(),
                        returns.into_iter().map(|p| p.type_name).collect(),
                    ));
                }
                "type_elem" => {
                    // Unions and `~T` constraints are not embeddings
                    let mut cursor = elem.walk();
                    let members: Vec<Node> = elem.named_children(&mut cursor).collect();
                    if let [member] = members.as_slice() {
                        if matches!(
                            member.kind(),
                            "type_identifier" | "qualified_type" | "generic_type"
                        ) {
                            ty.embedded.push(base_type_name(self.text(*member)));
                        }
                    }
                }
                _ => ty.embedded.push(base_type_name(self.text(elem))),
            }
        }
    }

    fn visit_function(&self, node: Node) -> Option<Function> {
        let name = self.text(node.child_by_field_name("name")?).to_string();
        let mut function = Function::new(name);
        function.file = self.file_name.to_string();
        function.line = node.start_position().row + 1;
        function.doc = doc_comment(node, self.source);

        let receiver_node = node.child_by_field_name("receiver");
        if let Some(receiver) = receiver_node {
            if let Some(param) = self.params(Some(receiver)).into_iter().next() {
                function.pointer_receiver = param.type_name.starts_with('*');
                function.receiver = Some(base_type_name(&param.type_name));
            }
        }

        let type_params_node = node.child_by_field_name("type_parameters");
        let params_node = node.child_by_field_name("parameters");
        let result_node = node.child_by_field_name("result");

        function.type_params = self.type_param_names(type_params_node);
        function.params = self.params(params_node);
        function.returns = self.params(result_node);

        let mut signature = String::from("func ");
        if let Some(receiver) = receiver_node {
            signature.push_str(&collapse_whitespace(self.text(receiver)));
            signature.push(' ');
        }
        signature.push_str(&function.name);
        if let Some(type_params) = type_params_node {
            signature.push_str(&collapse_whitespace(self.text(type_params)));
        }
        match params_node {
            Some(params) => signature.push_str(&collapse_whitespace(self.text(params))),
            None => signature.push_str("()"),
        }
        if let Some(result) = result_node {
            signature.push(' ');
            signature.push_str(&collapse_whitespace(self.text(result)));
        }
        function.signature = signature;

        if let Some(body) = node.child_by_field_name("body") {
            let mut usage = UsageCollector::new(self, &function.type_params);
            usage.visit(body);
            function.calls = usage.calls.into_iter().collect();
            function.used_types = usage.types.into_iter().collect();
            function.used_imports = usage.imports.into_iter().collect();
        }

        Some(function)
    }

    fn visit_values(&self, declaration: Node, spec_kind: &str, out: &mut Vec<Value>) {
        let mut specs = Vec::new();
        collect_kinds(declaration, &[spec_kind], &mut specs);

        for spec in specs {
            let type_name = spec
                .child_by_field_name("type")
                .map(|t| collapse_whitespace(self.text(t)));

            let values: Vec<String> = match spec.child_by_field_name("value") {
                Some(list) if list.kind() == "expression_list" => {
                    let mut cursor = list.walk();
                    list.named_children(&mut cursor)
                        .map(|v| collapse_whitespace(self.text(v)))
                        .collect()
                }
                Some(expr) => vec![collapse_whitespace(self.text(expr))],
                None => Vec::new(),
            };

            let mut cursor = spec.walk();
            // Separating commas share the `name` field in const specs
            let names: Vec<String> = spec
                .children_by_field_name("name", &mut cursor)
                .filter(|n| n.is_named())
                .map(|n| self.text(n).to_string())
                .collect();

            for (idx, name) in names.iter().enumerate() {
                if name == "_" {
                    continue;
                }

                let mut value = Value::new(name.clone());
                value.type_name = type_name.clone();
                value.value = if values.len() == names.len() {
                    values.get(idx).cloned()
                } else if values.is_empty() {
                    None
                } else {
                    Some(values.join(", "))
                };
                value.file = self.file_name.to_string();
                value.line = spec.start_position().row + 1;
                out.push(value);
            }
        }
    }

    fn params(&self, list: Option<Node>) -> Vec<Param> {
        let Some(list) = list else {
            return Vec::new();
        };

        // A bare result type: `func f() error`
        if list.kind() != "parameter_list" {
            return vec![Param::new("", collapse_whitespace(self.text(list)))];
        }

        let mut params = Vec::new();
        let mut cursor = list.walk();
        for declaration in list.named_children(&mut cursor) {
            let variadic = match declaration.kind() {
                "parameter_declaration" => false,
                "variadic_parameter_declaration" => true,
                _ => continue,
            };

            let base = declaration
                .child_by_field_name("type")
                .map(|t| collapse_whitespace(self.text(t)))
                .unwrap_or_default();
            let type_name = if variadic { format!("...{}", base) } else { base };

            let mut name_cursor = declaration.walk();
            let names: Vec<String> = declaration
                .children_by_field_name("name", &mut name_cursor)
                .filter(|n| n.is_named())
                .map(|n| self.text(n).to_string())
                .collect();

            if names.is_empty() {
                params.push(Param::new("", type_name));
            } else {
                for name in names {
                    params.push(Param::new(name, type_name.clone()));
                }
            }
        }

        params
    }

    fn type_param_names(&self, list: Option<Node>) -> Vec<String> {
        let Some(list) = list else {
            return Vec::new();
        };

        let mut declarations = Vec::new();
        collect_kinds(list, &["type_parameter_declaration"], &mut declarations);

        let mut names = Vec::new();
        for declaration in declarations {
            let mut cursor = declaration.walk();
            names.extend(
                declaration
                    .children_by_field_name("name", &mut cursor)
                    .filter(|n| n.is_named())
                    .map(|n| self.text(n).to_string()),
            );
        }
        names
    }
}

fn push_fields(fields: &mut Vec<Field>, names: Vec<String>, type_name: &str, tag: &Option<String>) {
    for name in names {
        let field = Field::new(name, type_name);
        fields.push(match tag {
            Some(tag) => field.with_tag(tag.clone()),
            None => field,
        });
    }
}

/// Deep walk recording call targets, referenced types and resolved imports.
struct UsageCollector<'v, 'a> {
    visitor: &'v DeclarationVisitor<'a>,
    exclude: &'v [String],
    calls: BTreeSet<String>,
    types: BTreeSet<String>,
    imports: BTreeSet<String>,
}

impl<'v, 'a> UsageCollector<'v, 'a> {
    fn new(visitor: &'v DeclarationVisitor<'a>, exclude: &'v [String]) -> Self {
        UsageCollector {
            visitor,
            exclude,
            calls: BTreeSet::new(),
            types: BTreeSet::new(),
            imports: BTreeSet::new(),
        }
    }

    fn resolve_qualifier(&mut self, qualifier: Node) {
        if let Some(path) = self.visitor.aliases.get(self.visitor.text(qualifier)) {
            self.imports.insert(path.clone());
        }
    }

    /// `f`, `pkg.F` and `a.b.C` are kept whole; chained calls keep the method name.
    fn call_target(&self, callee: Node) -> Option<String> {
        match callee.kind() {
            "identifier" => Some(self.visitor.text(callee).to_string()),
            "selector_expression" => {
                let operand = callee.child_by_field_name("operand")?;
                if is_plain_selector(operand) {
                    Some(collapse_whitespace(self.visitor.text(callee)))
                } else {
                    callee
                        .child_by_field_name("field")
                        .map(|f| self.visitor.text(f).to_string())
                }
            }
            _ => None,
        }
    }

    fn visit(&mut self, root: Node) {
        let mut stack = vec![root];

        while let Some(node) = stack.pop() {
            match node.kind() {
                "call_expression" => {
                    if let Some(target) = node
                        .child_by_field_name("function")
                        .and_then(|callee| self.call_target(callee))
                    {
                        self.calls.insert(target);
                    }
                }
                "selector_expression" => {
                    if let Some(operand) = node.child_by_field_name("operand") {
                        if operand.kind() == "identifier" {
                            self.resolve_qualifier(operand);
                        }
                    }
                }
                "qualified_type" => {
                    self.types
                        .insert(collapse_whitespace(self.visitor.text(node)));
                    if let Some(package) = node.child_by_field_name("package") {
                        self.resolve_qualifier(package);
                    }
                    // The inner type_identifier is the qualified name's tail
                    continue;
                }
                "type_identifier" => {
                    let name = self.visitor.text(node);
                    if !is_predeclared_type(name) && !self.exclude.iter().any(|e| e == name) {
                        self.types.insert(name.to_string());
                    }
                }
                _ => {}
            }

            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                stack.push(child);
            }
        }
    }
}

fn is_plain_selector(node: Node) -> bool {
    match node.kind() {
        "identifier" => true,
        "selector_expression" => node
            .child_by_field_name("operand")
            .is_some_and(is_plain_selector),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"package store

import (
	"context"
	"fmt"
	sq "github.com/Masterminds/squirrel"
	_ "github.com/lib/pq"
)

const (
	DefaultLimit = 50
	maxLimit, minLimit = 500, 1
)

var ErrNotFound = fmt.Errorf("not found")

// User is a stored account.
type User struct {
	ID    int64  `json:"id"`
	Name  string `json:"name"`
	*Base
	sync.Mutex
}

type Finder interface {
	Find(ctx context.Context, id int64) (*User, error)
	Count() int
	fmt.Stringer
}

type ID string

type Alias = User

type Page[T any] []T

// UserStore loads users.
type UserStore struct{ db Querier }

func NewUserStore(db Querier) *UserStore {
	return &UserStore{db: db}
}

func (s *UserStore) Find(ctx context.Context, id int64) (*User, error) {
	q := sq.Select("*").From("users")
	if v, ok := s.db.(Closer); ok {
		v.Close()
	}
	u := &User{ID: id}
	fmt.Println(q, u)
	return s.load(ctx, id)
}

func (s UserStore) Count() int { return 0 }

func Map[T, U any](xs []T, f func(T) U) []U {
	var out []U
	for _, x := range xs {
		out = append(out, f(x))
	}
	return out
}

func Log(format string, args ...any) {}
"#;

    fn extract() -> FileUnit {
        let mut parser = TreeSitterParser::new().unwrap();
        GoExtractor::new()
            .extract_file(&mut parser, Path::new("store.go"), SOURCE)
            .unwrap()
    }

    #[test]
    fn reads_package_and_imports() {
        let unit = extract();
        assert_eq!(unit.package_name, "store");
        assert_eq!(unit.file_name, "store.go");

        let keys: Vec<String> = unit.imports.iter().map(|i| i.alias_key()).collect();
        assert_eq!(keys, vec!["context", "fmt", "sq", "github.com/lib/pq"]);
    }

    #[test]
    fn struct_fields_keep_tags_and_embedding() {
        let unit = extract();
        let user = unit.types.iter().find(|t| t.name == "User").unwrap();
        assert_eq!(user.kind, TypeKind::Struct);
        assert_eq!(user.doc.as_deref(), Some("User is a stored account."));
        assert_eq!(user.fields.len(), 4);
        assert_eq!(user.fields[0].name, "ID");
        assert_eq!(user.fields[0].tag.as_deref(), Some("json:\"id\""));

        let embedded: Vec<&Field> = user.fields.iter().filter(|f| f.is_embedded()).collect();
        assert_eq!(embedded.len(), 2);
        assert_eq!(embedded[0].type_name, "*Base");
        assert_eq!(user.embedded, vec!["Base", "sync.Mutex"]);
        assert!(user.used_types.contains(&"Base".to_string()));
        assert!(user.used_types.contains(&"sync.Mutex".to_string()));
    }

    #[test]
    fn interfaces_have_methods_and_no_fields() {
        let unit = extract();
        let finder = unit.types.iter().find(|t| t.name == "Finder").unwrap();
        assert_eq!(finder.kind, TypeKind::Interface);
        assert!(finder.fields.is_empty());
        assert_eq!(finder.methods.len(), 2);

        let find = finder.method("Find").unwrap();
        assert_eq!(find.params, vec!["context.Context", "int64"]);
        assert_eq!(find.returns, vec!["*User", "error"]);
        assert_eq!(finder.embedded, vec!["fmt.Stringer"]);
    }

    #[test]
    fn alias_and_generic_kinds() {
        let unit = extract();
        let kind_of = |name: &str| unit.types.iter().find(|t| t.name == name).unwrap().kind;
        assert_eq!(kind_of("ID"), TypeKind::Alias);
        assert_eq!(kind_of("Alias"), TypeKind::Alias);
        assert_eq!(kind_of("Page"), TypeKind::Generic);

        let page = unit.types.iter().find(|t| t.name == "Page").unwrap();
        assert_eq!(page.type_params, vec!["T"]);
        assert_eq!(page.underlying.as_deref(), Some("[]T"));
        assert!(page.used_types.is_empty());
    }

    #[test]
    fn methods_record_receivers_and_usage() {
        let unit = extract();
        let find = unit
            .functions
            .iter()
            .find(|f| f.name == "Find")
            .unwrap();
        assert_eq!(find.receiver.as_deref(), Some("UserStore"));
        assert!(find.pointer_receiver);
        assert_eq!(
            find.signature,
            "func (s *UserStore) Find(ctx context.Context, id int64) (*User, error)"
        );

        for call in ["sq.Select", "From", "fmt.Println", "s.load", "v.Close"] {
            assert!(find.calls.contains(&call.to_string()), "missing call {}", call);
        }
        assert!(find.used_types.contains(&"User".to_string()));
        assert!(find.used_types.contains(&"Closer".to_string()));
        assert_eq!(
            find.used_imports,
            vec!["fmt".to_string(), "github.com/Masterminds/squirrel".to_string()]
        );

        let count = unit.functions.iter().find(|f| f.name == "Count").unwrap();
        assert!(!count.pointer_receiver);
        assert_eq!(count.returns, vec![Param::new("", "int")]);
    }

    #[test]
    fn calls_are_deduplicated_and_type_params_excluded() {
        let unit = extract();
        let map = unit.functions.iter().find(|f| f.name == "Map").unwrap();
        assert_eq!(map.type_params, vec!["T", "U"]);
        assert_eq!(map.params.len(), 2);
        assert_eq!(map.calls, vec!["append".to_string(), "f".to_string()]);
        assert!(map.used_types.is_empty());

        let log = unit.functions.iter().find(|f| f.name == "Log").unwrap();
        assert_eq!(log.params[1], Param::new("args", "...any"));
    }

    #[test]
    fn values_split_multi_name_specs() {
        let unit = extract();
        let names: Vec<&str> = unit.constants.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["DefaultLimit", "maxLimit", "minLimit"]);
        assert_eq!(unit.constants[1].value.as_deref(), Some("500"));
        assert_eq!(unit.constants[2].value.as_deref(), Some("1"));
        assert!(!unit.constants[1].exported);
        assert_eq!(unit.variables.len(), 1);
        assert_eq!(unit.variables[0].name, "ErrNotFound");
    }
}
