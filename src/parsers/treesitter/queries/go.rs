pub const IMPORT_QUERY: &str = "
    (import_spec path: (_) @import_path)
";
