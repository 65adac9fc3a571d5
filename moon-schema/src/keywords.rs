/// A representative set of SQL reserved words shared by SQLite, PostgreSQL
/// and MySQL. Collection and column names are rejected outright rather than
/// quoted around, so a name that's fine on one backend doesn't silently
/// break on another.
pub const SQL_KEYWORDS: &[&str] = &[
    "select", "insert", "update", "delete", "from", "where", "table", "create", "drop", "alter",
    "index", "column", "primary", "key", "foreign", "references", "unique", "not", "null",
    "default", "check", "constraint", "join", "inner", "outer", "left", "right", "on", "as",
    "and", "or", "in", "is", "like", "between", "order", "by", "group", "having", "limit",
    "offset", "union", "all", "distinct", "into", "values", "set", "view", "trigger",
    "procedure", "function", "grant", "revoke", "transaction", "commit", "rollback", "begin",
    "end", "case", "when", "then", "else", "cast", "exists", "for", "with", "to", "add",
    "database", "schema", "user", "role", "password", "true", "false",
];

pub fn is_sql_keyword(name: &str) -> bool {
    SQL_KEYWORDS.contains(&name)
}
