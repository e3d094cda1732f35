//! Read and write shapes understood by every [`TableBackend`](crate::TableBackend).

use serde_json::Value;

/// One table row as returned by the backend.
pub type Row = serde_json::Map<String, Value>;

/// Row predicate. Backends combine multiple filters with AND.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq { column: String, value: Value },
    In { column: String, values: Vec<Value> },
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn is_in<I, V>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn column(&self) -> &str {
        match self {
            Filter::Eq { column, .. } | Filter::In { column, .. } => column,
        }
    }

    pub fn matches(&self, row: &Row) -> bool {
        let actual = row.get(self.column()).unwrap_or(&Value::Null);
        match self {
            Filter::Eq { value, .. } => actual == value,
            Filter::In { values, .. } => values.iter().any(|v| v == actual),
        }
    }

    /// PostgREST query parameter, e.g. `("published", "eq.true")`.
    pub fn to_param(&self) -> (String, String) {
        match self {
            Filter::Eq { column, value } if value.is_null() => {
                (column.clone(), "is.null".to_string())
            }
            Filter::Eq { column, value } => (column.clone(), format!("eq.{}", plain(value))),
            Filter::In { column, values } => {
                let list = values.iter().map(quoted).collect::<Vec<_>>().join(",");
                (column.clone(), format!("in.({list})"))
            }
        }
    }
}

fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn quoted(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
        other => other.to_string(),
    }
}

/// Sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

impl Order {
    pub fn to_param(&self) -> String {
        let direction = if self.ascending { "asc" } else { "desc" };
        format!("{}.{}", self.column, direction)
    }
}

/// How an embedded resource relates to the row it is attached to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relation {
    /// Child rows whose `foreign_key` equals the parent's `id`.
    HasMany { foreign_key: String },
    /// Single row whose `id` equals the parent's `local_key`; `null` when absent.
    BelongsTo { local_key: String },
}

/// Related resource expanded into each result row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Embed {
    pub alias: Option<String>,
    pub table: String,
    pub relation: Relation,
    pub columns: Vec<String>,
    pub embeds: Vec<Embed>,
}

impl Embed {
    pub fn has_many(table: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self::with_relation(
            table,
            Relation::HasMany {
                foreign_key: foreign_key.into(),
            },
        )
    }

    pub fn belongs_to(table: impl Into<String>, local_key: impl Into<String>) -> Self {
        Self::with_relation(
            table,
            Relation::BelongsTo {
                local_key: local_key.into(),
            },
        )
    }

    fn with_relation(table: impl Into<String>, relation: Relation) -> Self {
        Self {
            alias: None,
            table: table.into(),
            relation,
            columns: Vec::new(),
            embeds: Vec::new(),
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    /// Field name the embedded value appears under in the parent row.
    pub fn key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table)
    }

    fn render(&self) -> String {
        let inner = render_columns(&self.columns, &self.embeds);
        match &self.alias {
            Some(alias) => format!("{alias}:{}({inner})", self.table),
            None => format!("{}({inner})", self.table),
        }
    }
}

/// Empty columns with no embeds means every column; with embeds, only the embeds.
fn render_columns(columns: &[String], embeds: &[Embed]) -> String {
    if columns.is_empty() && embeds.is_empty() {
        return "*".to_string();
    }
    columns
        .iter()
        .cloned()
        .chain(embeds.iter().map(Embed::render))
        .collect::<Vec<_>>()
        .join(",")
}

/// Shaped read against one base table.
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub table: String,
    pub columns: Vec<String>,
    pub embeds: Vec<Embed>,
    pub filters: Vec<Filter>,
    pub order: Vec<Order>,
    pub limit: Option<usize>,
}

impl Select {
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            embeds: Vec::new(),
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
        }
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::eq(column, value))
    }

    pub fn is_in<I, V>(self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.filter(Filter::is_in(column, values))
    }

    pub fn order_asc(mut self, column: impl Into<String>) -> Self {
        self.order.push(Order {
            column: column.into(),
            ascending: true,
        });
        self
    }

    pub fn order_desc(mut self, column: impl Into<String>) -> Self {
        self.order.push(Order {
            column: column.into(),
            ascending: false,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Value of the PostgREST `select` parameter.
    pub fn select_param(&self) -> String {
        render_columns(&self.columns, &self.embeds)
    }

    /// Full PostgREST query string parameters for this read.
    pub fn query_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), self.select_param())];
        params.extend(self.filters.iter().map(Filter::to_param));
        if !self.order.is_empty() {
            let order = self
                .order
                .iter()
                .map(Order::to_param)
                .collect::<Vec<_>>()
                .join(",");
            params.push(("order".to_string(), order));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn renders_nested_embed_with_alias() {
        let query = Select::from("posts")
            .columns(["id", "title"])
            .embed(
                Embed::has_many("blog_post_categories", "post_id").embed(
                    Embed::belongs_to("blog_categories", "category_id")
                        .alias("category")
                        .columns(["id", "name", "slug"]),
                ),
            );

        assert_eq!(
            query.select_param(),
            "id,title,blog_post_categories(category:blog_categories(id,name,slug))"
        );
    }

    #[test]
    fn empty_projection_selects_everything() {
        assert_eq!(Select::from("services").select_param(), "*");
    }

    #[test]
    fn renders_filters_order_and_limit() {
        let params = Select::from("products")
            .eq("published", true)
            .is_in("id", ["a", "b\"c"])
            .order_desc("created_at")
            .limit(1)
            .query_params();

        assert_eq!(
            params,
            vec![
                ("select".to_string(), "*".to_string()),
                ("published".to_string(), "eq.true".to_string()),
                ("id".to_string(), "in.(\"a\",\"b\\\"c\")".to_string()),
                ("order".to_string(), "created_at.desc".to_string()),
                ("limit".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn null_equality_renders_as_is_null() {
        let (_, value) = Filter::eq("youtube_url", Value::Null).to_param();
        assert_eq!(value, "is.null");
    }

    #[test]
    fn filters_match_rows() {
        let r = row(json!({"id": "p1", "published": true}));
        assert!(Filter::eq("published", true).matches(&r));
        assert!(!Filter::eq("published", false).matches(&r));
        assert!(Filter::is_in("id", ["p0", "p1"]).matches(&r));
        assert!(Filter::eq("missing", Value::Null).matches(&r));
    }
}
