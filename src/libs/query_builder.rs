use serde_json::Value;

use crate::libs::ddl::{self, quote_ident, quote_literal};
use crate::libs::error::Result;
use crate::libs::schema::{FieldKind, TableDescriptor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonOp {
    Eq,
    Like,
}

#[derive(Debug, Clone, PartialEq)]
enum Condition {
    Eq {
        column: String,
        value: Value,
    },
    Like {
        column: String,
        pattern: String,
        case_insensitive: bool,
    },
    Json {
        column: String,
        path: Vec<String>,
        op: JsonOp,
        value: Value,
    },
}

/// Escapes `%`, `_` and `\` so `input` matches literally in a `LIKE` pattern.
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Row filter for reads against one table.
///
/// Columns are checked against the table descriptor when the filter is
/// rendered; values are always bound.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
    order: Option<(String, Direction)>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Equality on every entry of the map; `null` values match `IS NULL`.
    pub fn from_conditions(conditions: &serde_json::Map<String, Value>) -> Self {
        conditions
            .iter()
            .fold(Self::new(), |filter, (column, value)| filter.eq(column, value.clone()))
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Eq {
            column: column.to_string(),
            value: value.into(),
        });
        self
    }

    /// Substring match: `pattern` is wrapped in `%`. Wildcards inside it stay
    /// active, so pass caller input through [`escape_like`] first.
    pub fn like(mut self, column: &str, pattern: &str) -> Self {
        self.conditions.push(Condition::Like {
            column: column.to_string(),
            pattern: format!("%{}%", pattern), // wrap automatically
            case_insensitive: false,
        });
        self
    }

    /// Case-insensitive [`Filter::like`].
    pub fn ilike(mut self, column: &str, pattern: &str) -> Self {
        self.conditions.push(Condition::Like {
            column: column.to_string(),
            pattern: format!("%{}%", pattern),
            case_insensitive: true,
        });
        self
    }

    /// Compares the json document at `path` inside `column` with `value`.
    ///
    /// `Value::Null` matches an explicit json `null`; a missing key never matches.
    pub fn json_eq(mut self, column: &str, path: &[&str], value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Json {
            column: column.to_string(),
            path: path.iter().map(|p| p.to_string()).collect(),
            op: JsonOp::Eq,
            value: value.into(),
        });
        self
    }

    /// Matches the text form of the json document at `path` against a
    /// `LIKE` pattern, used verbatim.
    pub fn json_like(mut self, column: &str, path: &[&str], pattern: &str) -> Self {
        self.conditions.push(Condition::Json {
            column: column.to_string(),
            path: path.iter().map(|p| p.to_string()).collect(),
            op: JsonOp::Like,
            value: Value::String(pattern.to_string()),
        });
        self
    }

    pub fn order_by(mut self, column: &str, direction: Direction) -> Self {
        self.order = Some((column.to_string(), direction));
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    /// Renders the `SELECT` and its parameters for `table`.
    pub fn build(&self, table: &TableDescriptor) -> Result<(String, Vec<Value>)> {
        let mut params: Vec<Value> = Vec::new();
        let mut wheres: Vec<String> = Vec::with_capacity(self.conditions.len());

        for condition in &self.conditions {
            let clause = match condition {
                Condition::Eq { column, value } => {
                    let field = table.column(column)?;
                    if value.is_null() {
                        format!("{} IS NULL", quote_ident(column))
                    } else {
                        params.push(ddl::encode_param(field.kind, value));
                        format!(
                            "{} = {}",
                            quote_ident(column),
                            ddl::placeholder(params.len(), field.kind)
                        )
                    }
                }
                Condition::Like {
                    column,
                    pattern,
                    case_insensitive,
                } => {
                    let field = table.column(column)?;
                    let op = if *case_insensitive { "ILIKE" } else { "LIKE" };
                    params.push(Value::String(pattern.clone()));
                    let target = if field.kind == FieldKind::String {
                        quote_ident(column)
                    } else {
                        format!("{}::text", quote_ident(column))
                    };
                    format!("{} {} ${}", target, op, params.len())
                }
                Condition::Json {
                    column,
                    path,
                    op,
                    value,
                } => {
                    table.column(column)?;
                    let mut target = quote_ident(column);
                    for segment in path {
                        target.push_str("->");
                        target.push_str(&quote_literal(segment));
                    }
                    match op {
                        JsonOp::Eq => {
                            // json null is the document `null`, not SQL NULL
                            params.push(Value::String(value.to_string()));
                            format!("{} = ${}::JSONB", target, params.len())
                        }
                        JsonOp::Like => {
                            params.push(value.clone());
                            format!("({})::text LIKE ${}", target, params.len())
                        }
                    }
                }
            };
            wheres.push(clause);
        }

        let mut sql = ddl::select_record(table);
        if !wheres.is_empty() {
            sql.push_str(&format!(" WHERE {}", wheres.join(" AND ")));
        }
        if let Some((column, direction)) = &self.order {
            table.column(column)?;
            sql.push_str(&format!(" ORDER BY {} {}", quote_ident(column), direction.as_sql()));
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {}", offset));
        }
        Ok((sql, params))
    }
}
