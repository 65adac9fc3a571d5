//! Compiles a validated filter/sort/search/pagination descriptor into
//! parameterised SQL. Column names are only ever drawn from the collection's
//! own snapshot, never interpolated from the request; values always travel
//! as bound parameters.

use moon_dialect::{CompiledStatement, Dialect, RawValue, SemanticType, StatementBuilder};
use moon_identifier::Id;
use moon_schema::Collection;

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
    Like,
    Null,
    NotNull,
}

#[derive(Debug, Clone)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: Option<RawValue>,
}

#[derive(Debug, Clone)]
pub struct SortField {
    pub column: String,
    pub descending: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub filters: Vec<Filter>,
    pub sort: Vec<SortField>,
    pub search: Option<String>,
    pub fields: Option<Vec<String>>,
    pub limit: u32,
    pub after: Option<String>,
}

pub struct CompiledList {
    pub statement: CompiledStatement,
    /// Selected column names and their semantic types, in SELECT order —
    /// needed to decode the driver's row representation back to [`RawValue`].
    pub columns: Vec<(String, SemanticType)>,
    /// One more than the caller's requested page size; the caller trims the
    /// extra row and uses its presence to compute `meta.next`.
    pub fetch_limit: u32,
}

pub fn validate_query(
    query: &ListQuery,
    max_filters: usize,
    max_sort_fields: usize,
    max_page_size: u32,
) -> Result<(), EngineError> {
    if query.filters.len() > max_filters {
        return Err(EngineError::TooManyFilters(max_filters));
    }
    if query.sort.len() > max_sort_fields {
        return Err(EngineError::TooManySortFields(max_sort_fields));
    }
    if query.limit == 0 || query.limit > max_page_size {
        return Err(EngineError::PageSizeExceeded(max_page_size));
    }
    if let Some(after) = &query.after {
        if !after.is_empty() && !Id::is_valid(after) {
            return Err(EngineError::InvalidCursor);
        }
    }
    Ok(())
}

fn selected_columns<'c>(
    collection: &'c Collection,
    fields: &Option<Vec<String>>,
) -> Result<Vec<&'c moon_schema::Column>, EngineError> {
    match fields {
        None => Ok(collection.columns.iter().collect()),
        Some(names) => {
            let mut out = vec![collection.column("id").expect("id column always present")];
            for name in names {
                if name == "id" {
                    continue;
                }
                let column = collection
                    .column(name)
                    .ok_or_else(|| EngineError::UnknownColumn(name.clone()))?;
                out.push(column);
            }
            Ok(out)
        }
    }
}

/// Builds the `SELECT ... FROM ... WHERE ... ORDER BY ... LIMIT ...`
/// statement for `/{collection}:list`. The stable tiebreaker `id ASC` is
/// always appended after any user-requested sort; `after` becomes a half-open
/// `id > ?` predicate so a page never repeats or skips a row.
pub fn compile_list(
    collection: &Collection,
    query: &ListQuery,
    dialect: &dyn Dialect,
) -> Result<CompiledList, EngineError> {
    let columns = selected_columns(collection, &query.fields)?;
    let mut builder = StatementBuilder::new();
    builder.push_sql("SELECT ");
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            builder.push_sql(", ");
        }
        builder.push_ident(dialect, &column.name);
    }
    builder.push_sql(" FROM ");
    builder.push_ident(dialect, &collection.name);

    let mut where_started = false;
    for filter in &query.filters {
        let column = collection
            .column(&filter.column)
            .ok_or_else(|| EngineError::UnknownColumn(filter.column.clone()))?;
        render_filter(&mut builder, dialect, column, filter, &mut where_started);
    }
    if let Some(term) = &query.search {
        render_search(&mut builder, dialect, collection, term, &mut where_started);
    }
    if let Some(after) = &query.after {
        if !after.is_empty() {
            push_where_or_and(&mut builder, &mut where_started);
            builder.push_ident(dialect, "id");
            builder.push_sql(" > ");
            builder.push_param(dialect, RawValue::Text(after.clone()));
        }
    }

    builder.push_sql(" ORDER BY ");
    for sort in &query.sort {
        if collection.column(&sort.column).is_none() {
            return Err(EngineError::UnknownColumn(sort.column.clone()));
        }
        builder.push_ident(dialect, &sort.column);
        builder.push_sql(if sort.descending { " DESC, " } else { " ASC, " });
    }
    builder.push_ident(dialect, "id");
    builder.push_sql(" ASC ");

    let fetch_limit = query.limit + 1;
    builder.push_sql(&dialect.limit_offset_clause(fetch_limit, 0));

    let column_types = columns
        .iter()
        .map(|c| (c.name.clone(), c.semantic_type))
        .collect();

    Ok(CompiledList {
        statement: builder.build(),
        columns: column_types,
        fetch_limit,
    })
}

fn push_where_or_and(builder: &mut StatementBuilder, where_started: &mut bool) {
    if *where_started {
        builder.push_sql(" AND ");
    } else {
        builder.push_sql(" WHERE ");
        *where_started = true;
    }
}

/// Renders one `(column, op, value)` triple, prefixing `WHERE`/`AND` as
/// appropriate given how many clauses already preceded it.
fn render_filter(
    builder: &mut StatementBuilder,
    dialect: &dyn Dialect,
    column: &moon_schema::Column,
    filter: &Filter,
    where_started: &mut bool,
) {
    push_where_or_and(builder, where_started);
    builder.push_ident(dialect, &column.name);
    match filter.op {
        FilterOp::Eq => {
            builder.push_sql(" = ");
            bind(builder, dialect, filter);
        }
        FilterOp::Ne => {
            builder.push_sql(" != ");
            bind(builder, dialect, filter);
        }
        FilterOp::Gt => {
            builder.push_sql(" > ");
            bind(builder, dialect, filter);
        }
        FilterOp::Lt => {
            builder.push_sql(" < ");
            bind(builder, dialect, filter);
        }
        FilterOp::Gte => {
            builder.push_sql(" >= ");
            bind(builder, dialect, filter);
        }
        FilterOp::Lte => {
            builder.push_sql(" <= ");
            bind(builder, dialect, filter);
        }
        FilterOp::Like => {
            builder.push_sql(" LIKE ");
            bind(builder, dialect, filter);
        }
        FilterOp::Null => {
            builder.push_sql(" IS NULL");
        }
        FilterOp::NotNull => {
            builder.push_sql(" IS NOT NULL");
        }
    }
}

fn bind(builder: &mut StatementBuilder, dialect: &dyn Dialect, filter: &Filter) {
    let value = filter.value.clone().unwrap_or(RawValue::Null);
    builder.push_param(dialect, value);
}

/// Expands a search term into `OR`-joined `LIKE` clauses over every
/// string-typed column, escaping `%`/`_` so the term is matched literally.
fn render_search(
    builder: &mut StatementBuilder,
    dialect: &dyn Dialect,
    collection: &Collection,
    term: &str,
    where_started: &mut bool,
) {
    let string_columns: Vec<_> = collection.string_columns().collect();
    if string_columns.is_empty() || term.is_empty() {
        return;
    }
    let escaped = term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    let pattern = format!("%{}%", escaped);

    push_where_or_and(builder, where_started);
    builder.push_sql("(");
    for (i, column) in string_columns.iter().enumerate() {
        if i > 0 {
            builder.push_sql(" OR ");
        }
        builder.push_ident(dialect, &column.name);
        builder.push_sql(" LIKE ");
        builder.push_param(dialect, RawValue::Text(pattern.clone()));
        builder.push_sql(" ESCAPE '\\'");
    }
    builder.push_sql(")");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOp {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

/// Builds `SELECT agg(field) FROM collection WHERE ...` for
/// `/{collection}:count|sum|avg|min|max`. `field` is required and must be
/// numeric for everything but `count`.
pub fn compile_aggregate(
    collection: &Collection,
    op: AggregateOp,
    field: Option<&str>,
    filters: &[Filter],
    dialect: &dyn Dialect,
) -> Result<(CompiledStatement, SemanticType), EngineError> {
    let (expr, result_type) = match op {
        AggregateOp::Count => ("COUNT(*)".to_owned(), SemanticType::Integer),
        _ => {
            let name = field.ok_or(EngineError::InvalidAggregationField)?;
            let column = collection
                .column(name)
                .ok_or_else(|| EngineError::UnknownColumn(name.to_owned()))?;
            if !matches!(column.semantic_type, SemanticType::Integer | SemanticType::Decimal) {
                return Err(EngineError::InvalidAggregationField);
            }
            let func = match op {
                AggregateOp::Sum => "SUM",
                AggregateOp::Avg => "AVG",
                AggregateOp::Min => "MIN",
                AggregateOp::Max => "MAX",
                AggregateOp::Count => unreachable!(),
            };
            let result_type = match (op, column.semantic_type) {
                (AggregateOp::Min, t) | (AggregateOp::Max, t) => t,
                _ => SemanticType::Decimal,
            };
            (format!("{}({})", func, dialect.quote_ident(&column.name)), result_type)
        }
    };

    let mut builder = StatementBuilder::new();
    builder.push_sql("SELECT ");
    builder.push_sql(&expr);
    builder.push_sql(" FROM ");
    builder.push_ident(dialect, &collection.name);
    let mut where_started = false;
    for filter in filters {
        let column = collection
            .column(&filter.column)
            .ok_or_else(|| EngineError::UnknownColumn(filter.column.clone()))?;
        render_filter(&mut builder, dialect, column, filter, &mut where_started);
    }
    Ok((builder.build(), result_type))
}
