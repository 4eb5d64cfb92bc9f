//! The encoded query condition tree.
//!
//! Conditions are rendered in the order `conditions`, `JOIN`/`RLQUERY`
//! sub-queries, raw encoded query, sort clause, joined with `^`.

use crate::PRIMARY_KEY;

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    table: String,
    conditions: Vec<QueryCondition>,
    sub_queries: Vec<SubQuery>,
}

#[derive(Debug, Clone, PartialEq)]
enum SubQuery {
    Join(JoinQuery),
    RelatedList(RelatedListQuery),
}

/// `name`, operator, value, plus any `^OR` alternatives.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryCondition {
    term: Term,
    or: Vec<Term>,
}

#[derive(Debug, Clone, PartialEq)]
struct Term {
    name: String,
    operator: String,
    value: String,
}

/// `JOIN<table>.<field>=<join_table>.<field>!<conditions>`
#[derive(Debug, Clone, PartialEq)]
pub struct JoinQuery {
    join_table: String,
    primary_field: Option<String>,
    join_table_field: Option<String>,
    query: Query,
}

/// `RLQUERY<related_table>.<related_field>,<count condition>^...^ENDRLQUERY`
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedListQuery {
    related_table: String,
    related_field: String,
    count_condition: String,
    stop_at_relationship: bool,
    query: Query,
}

impl Query {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            conditions: vec![],
            sub_queries: vec![],
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty() && self.sub_queries.is_empty()
    }

    /// `name=value`
    pub fn add_query(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut QueryCondition {
        self.push(QueryCondition::new(name, "=", value))
    }

    /// `name<operator>value`, e.g. `("short_description", "LIKE", "error")`.
    pub fn add_query_with(
        &mut self,
        name: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut QueryCondition {
        self.push(QueryCondition::new(name, operator, value))
    }

    pub fn add_active_query(&mut self) -> &mut QueryCondition {
        self.add_query("active", "true")
    }

    pub fn add_null_query(&mut self, field: impl Into<String>) -> &mut QueryCondition {
        self.add_query_with(field, "", "ISEMPTY")
    }

    pub fn add_not_null_query(&mut self, field: impl Into<String>) -> &mut QueryCondition {
        self.add_query_with(field, "", "ISNOTEMPTY")
    }

    /// Join against `join_table`. Both fields default to `sys_id`.
    pub fn add_join_query(
        &mut self,
        join_table: impl Into<String>,
        primary_field: Option<&str>,
        join_table_field: Option<&str>,
    ) -> &mut JoinQuery {
        let join = JoinQuery {
            join_table: join_table.into(),
            primary_field: primary_field.map(str::to_string),
            join_table_field: join_table_field.map(str::to_string),
            query: Query::new(self.table.clone()),
        };
        self.sub_queries.push(SubQuery::Join(join));
        match self.sub_queries.last_mut() {
            Some(SubQuery::Join(join)) => join,
            _ => unreachable!(),
        }
    }

    /// Filter on a related list, e.g. incidents with at least one task SLA:
    /// `("task_sla", "task", ">0", false)`.
    pub fn add_rl_query(
        &mut self,
        related_table: impl Into<String>,
        related_field: impl Into<String>,
        count_condition: impl Into<String>,
        stop_at_relationship: bool,
    ) -> &mut RelatedListQuery {
        let related_table = related_table.into();
        let rl = RelatedListQuery {
            query: Query::new(related_table.clone()),
            related_table,
            related_field: related_field.into(),
            count_condition: count_condition.into(),
            stop_at_relationship,
        };
        self.sub_queries.push(SubQuery::RelatedList(rl));
        match self.sub_queries.last_mut() {
            Some(SubQuery::RelatedList(rl)) => rl,
            _ => unreachable!(),
        }
    }

    fn push(&mut self, condition: QueryCondition) -> &mut QueryCondition {
        let index = self.conditions.len();
        self.conditions.push(condition);
        &mut self.conditions[index]
    }

    /// Render the full `sysparm_query` value.
    pub fn generate_query(&self, encoded_query: Option<&str>, order_by: Option<&str>) -> String {
        let mut parts: Vec<String> = self.conditions.iter().map(QueryCondition::generate).collect();

        for sub_query in &self.sub_queries {
            parts.push(match sub_query {
                SubQuery::Join(join) => join.generate(&self.table),
                SubQuery::RelatedList(rl) => rl.generate(),
            });
        }

        parts.extend(encoded_query.map(str::to_string));
        parts.extend(order_by.map(str::to_string));

        parts.retain(|part| !part.is_empty());
        parts.join("^")
    }
}

impl core::fmt::Display for Query {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.write_str(&self.generate_query(None, None))
    }
}

impl QueryCondition {
    fn new(name: impl Into<String>, operator: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            term: Term::new(name, operator, value),
            or: vec![],
        }
    }

    /// `^OR<name>=<value>`
    pub fn add_or_condition(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.or.push(Term::new(name, "=", value));
        self
    }

    pub fn add_or_condition_with(
        &mut self,
        name: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.or.push(Term::new(name, operator, value));
        self
    }

    pub fn generate(&self) -> String {
        let mut out = self.term.to_string();
        for term in &self.or {
            out.push_str("^OR");
            out.push_str(&term.to_string());
        }
        out
    }
}

impl Term {
    fn new(name: impl Into<String>, operator: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }
}

impl core::fmt::Display for Term {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "{}{}{}", self.name, self.operator, self.value)
    }
}

impl JoinQuery {
    /// Conditions applied to the joined table.
    pub fn query(&mut self) -> &mut Query {
        &mut self.query
    }

    pub fn add_query(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut QueryCondition {
        self.query.add_query(name, value)
    }

    pub fn add_query_with(
        &mut self,
        name: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut QueryCondition {
        self.query.add_query_with(name, operator, value)
    }

    fn generate(&self, table: &str) -> String {
        let primary = self.primary_field.as_deref().unwrap_or(PRIMARY_KEY);
        let secondary = self.join_table_field.as_deref().unwrap_or(PRIMARY_KEY);
        // The `!` is required even when there are no conditions.
        format!(
            "JOIN{table}.{primary}={}.{secondary}!{}",
            self.join_table,
            self.query.generate_query(None, None)
        )
    }
}

impl RelatedListQuery {
    /// Conditions applied to the related records.
    pub fn query(&mut self) -> &mut Query {
        &mut self.query
    }

    pub fn add_query(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut QueryCondition {
        self.query.add_query(name, value)
    }

    pub fn add_query_with(
        &mut self,
        name: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut QueryCondition {
        self.query.add_query_with(name, operator, value)
    }

    fn generate(&self) -> String {
        let mut head = format!(
            "RLQUERY{}.{},{}",
            self.related_table, self.related_field, self.count_condition
        );
        if self.stop_at_relationship {
            head.push_str(",m2m");
        }

        let body = self.query.generate_query(None, None);
        if body.is_empty() {
            format!("{head}^ENDRLQUERY")
        } else {
            format!("{head}^{body}^ENDRLQUERY")
        }
    }
}
