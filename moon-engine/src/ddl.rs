//! Collection lifecycle: create/alter/drop table DDL compiled per dialect,
//! with a table-rebuild recipe (create-copy-swap) standing in wherever a
//! backend can't `ALTER TABLE ... MODIFY COLUMN` directly.

use moon_dialect::{CompiledStatement, Dialect};
use moon_schema::{validate, Collection, Column, SchemaError};

use crate::error::EngineError;

#[derive(Debug, Clone)]
pub enum AlterOp {
    RenameColumn { from: String, to: String },
    ModifyColumn { column: Column },
    AddColumn { column: Column },
    RemoveColumn { name: String },
}

/// Applies a batch of operations to `collection` in the fixed order
/// rename → modify → add → remove, returning the resulting shape. Pure: no
/// SQL is emitted here, so the result can be fully validated before a single
/// statement touches the database.
pub fn apply_ops(collection: &Collection, ops: &[AlterOp]) -> Result<Collection, EngineError> {
    let mut columns = collection.columns.clone();

    for op in ops {
        if let AlterOp::RenameColumn { from, to } = op {
            let idx = columns
                .iter()
                .position(|c| c.name == *from)
                .ok_or_else(|| EngineError::UnknownColumn(from.clone()))?;
            if columns[idx].system {
                return Err(EngineError::Schema(SchemaError::SystemCollectionProtected));
            }
            let normalized = validate::validate_column_name(to)?;
            columns[idx].name = normalized;
        }
    }
    for op in ops {
        if let AlterOp::ModifyColumn { column } = op {
            let idx = columns
                .iter()
                .position(|c| c.name == column.name)
                .ok_or_else(|| EngineError::UnknownColumn(column.name.clone()))?;
            if columns[idx].system {
                return Err(EngineError::Schema(SchemaError::SystemCollectionProtected));
            }
            columns[idx] = column.clone();
        }
    }
    for op in ops {
        if let AlterOp::AddColumn { column } = op {
            columns.push(column.clone());
        }
    }
    for op in ops {
        if let AlterOp::RemoveColumn { name } = op {
            let idx = columns
                .iter()
                .position(|c| c.name == *name)
                .ok_or_else(|| EngineError::UnknownColumn(name.clone()))?;
            if columns[idx].system {
                return Err(EngineError::Schema(SchemaError::SystemCollectionProtected));
            }
            columns.remove(idx);
        }
    }

    validate::validate_column_batch(&columns)?;
    Ok(Collection {
        name: collection.name.clone(),
        columns,
    })
}

fn column_ddl(dialect: &dyn Dialect, column: &Column) -> String {
    let sql_type = column.semantic_type.sql_type(dialect.backend(), column.effective_scale());
    let mut fragment = format!("{} {}", dialect.quote_ident(&column.name), sql_type);
    if !column.nullable {
        fragment.push_str(" NOT NULL");
    }
    fragment
}

pub fn compile_create_table(collection: &Collection, dialect: &dyn Dialect) -> Vec<CompiledStatement> {
    let mut sql = format!("CREATE TABLE {} (", dialect.quote_ident(&collection.name));
    sql.push_str(&format!("pkid {}, ", dialect.pkid_column_ddl()));
    for column in &collection.columns {
        sql.push_str(&column_ddl(dialect, column));
        sql.push_str(", ");
    }
    sql.truncate(sql.trim_end_matches(", ").len());
    sql.push(')');

    let mut statements = vec![CompiledStatement::new(sql, vec![])];
    for column in collection.user_columns().filter(|c| c.unique) {
        statements.push(CompiledStatement::new(
            format!(
                "CREATE UNIQUE INDEX {} ON {} ({})",
                dialect.unique_index_name(&collection.name, &column.name),
                dialect.quote_ident(&collection.name),
                dialect.quote_ident(&column.name),
            ),
            vec![],
        ));
    }
    for column in &collection.columns {
        if column.name == "id" {
            statements.push(CompiledStatement::new(
                format!(
                    "CREATE UNIQUE INDEX {} ON {} ({})",
                    dialect.unique_index_name(&collection.name, "id"),
                    dialect.quote_ident(&collection.name),
                    dialect.quote_ident("id"),
                ),
                vec![],
            ));
        }
    }
    statements
}

pub fn compile_drop_table(collection_name: &str, dialect: &dyn Dialect) -> CompiledStatement {
    CompiledStatement::new(format!("DROP TABLE {}", dialect.quote_ident(collection_name)), vec![])
}

/// Compiles the batch of ops into the statements needed to take the table
/// from `before`'s shape to `after`'s. Picks direct `ALTER TABLE` statements
/// when the dialect supports every requested operation kind directly, and
/// the create-copy-swap rebuild recipe otherwise (always the SQLite path
/// when a `ModifyColumn` is present, since SQLite never supports that one
/// in place).
pub fn compile_alter_batch(
    before: &Collection,
    after: &Collection,
    ops: &[AlterOp],
    dialect: &dyn Dialect,
) -> Vec<CompiledStatement> {
    let caps = dialect.alter_capabilities();
    let needs_rebuild = ops.iter().any(|op| match op {
        AlterOp::AddColumn { .. } => !caps.direct_add_column,
        AlterOp::RemoveColumn { .. } => !caps.direct_drop_column,
        AlterOp::RenameColumn { .. } => !caps.direct_rename_column,
        AlterOp::ModifyColumn { .. } => !caps.direct_modify_column,
    });

    if !needs_rebuild {
        return compile_direct_alter(before, ops, dialect);
    }
    compile_rebuild(before, after, ops, dialect)
}

fn compile_direct_alter(before: &Collection, ops: &[AlterOp], dialect: &dyn Dialect) -> Vec<CompiledStatement> {
    let table = dialect.quote_ident(&before.name);
    let mut statements = Vec::new();
    for op in ops {
        let sql = match op {
            AlterOp::RenameColumn { from, to } => format!(
                "ALTER TABLE {} RENAME COLUMN {} TO {}",
                table,
                dialect.quote_ident(from),
                dialect.quote_ident(to)
            ),
            AlterOp::ModifyColumn { column } => {
                let sql_type = column.semantic_type.sql_type(dialect.backend(), column.effective_scale());
                format!(
                    "ALTER TABLE {} ALTER COLUMN {} TYPE {}",
                    table,
                    dialect.quote_ident(&column.name),
                    sql_type
                )
            }
            AlterOp::AddColumn { column } => {
                format!("ALTER TABLE {} ADD COLUMN {}", table, column_ddl(dialect, column))
            }
            AlterOp::RemoveColumn { name } => {
                format!("ALTER TABLE {} DROP COLUMN {}", table, dialect.quote_ident(name))
            }
        };
        statements.push(CompiledStatement::new(sql, vec![]));
    }
    statements
}

/// `CREATE temp table with after's shape` → `INSERT INTO temp SELECT
/// matching before columns` → `DROP old` → `RENAME temp TO old name`.
/// Columns that exist in both `before` and `after` carry data across,
/// tracking through any rename in `ops`; a freshly added column is left at
/// its DDL default.
fn compile_rebuild(
    before: &Collection,
    after: &Collection,
    ops: &[AlterOp],
    dialect: &dyn Dialect,
) -> Vec<CompiledStatement> {
    let renamed_from: std::collections::HashMap<&str, &str> = ops
        .iter()
        .filter_map(|op| match op {
            AlterOp::RenameColumn { from, to } => Some((to.as_str(), from.as_str())),
            _ => None,
        })
        .collect();

    let tmp_name = format!("{}_rebuild", before.name);
    let tmp_collection = Collection {
        name: tmp_name.clone(),
        columns: after.columns.clone(),
    };
    let mut statements = compile_create_table(&tmp_collection, dialect);

    let mut dest_names = Vec::new();
    let mut src_names = Vec::new();
    for column in &after.columns {
        let source_name = renamed_from.get(column.name.as_str()).copied().unwrap_or(&column.name);
        if before.columns.iter().any(|b| b.name == source_name) {
            dest_names.push(dialect.quote_ident(&column.name));
            src_names.push(dialect.quote_ident(source_name));
        }
    }
    if !dest_names.is_empty() {
        statements.push(CompiledStatement::new(
            format!(
                "INSERT INTO {} ({}) SELECT {} FROM {}",
                dialect.quote_ident(&tmp_name),
                dest_names.join(", "),
                src_names.join(", "),
                dialect.quote_ident(&before.name)
            ),
            vec![],
        ));
    }

    statements.push(compile_drop_table(&before.name, dialect));
    statements.push(CompiledStatement::new(
        format!(
            "ALTER TABLE {} RENAME TO {}",
            dialect.quote_ident(&tmp_name),
            dialect.quote_ident(&after.name)
        ),
        vec![],
    ));
    statements
}
