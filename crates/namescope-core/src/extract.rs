//! Structural extraction of aliased fragments from a parsed statement.
//!
//! Walks the AST depth-first and collects every explicitly named fragment:
//! CTE definitions, aliased table references (including derived tables), and
//! aliased projection expressions. Implicit/default names are skipped.
//! Elements are emitted in tree order (a parent before the elements nested in
//! its defining text), which is stable and deterministic for a given input.
//!
//! The defining text of each element is sliced verbatim from the input using
//! the parser's span information; the AST display form is used only for the
//! rare nodes that carry no span.

use crate::error::ParseError;
use crate::parser::parse_statement_with_dialect;
use crate::types::{Dialect, ElementKind, Span, SqlElement};
use sqlparser::ast::{
    Expr, FunctionArg, FunctionArgExpr, FunctionArguments, GroupByExpr, JoinConstraint,
    JoinOperator, OrderByKind, Query, SelectItem, SetExpr, Spanned, Statement, TableFactor,
    TableWithJoins,
};
use sqlparser::tokenizer::Span as TokenSpan;
use std::fmt;

/// Scope entry used for anonymous derived tables and expression subqueries.
const ANONYMOUS_SCOPE: &str = "subquery";

/// Extracts all explicitly aliased elements from a single SQL statement.
///
/// Fails fast with a [`ParseError`] when the statement is not syntactically
/// valid; no partial extraction is attempted.
pub fn extract(sql: &str, dialect: Dialect) -> Result<Vec<SqlElement>, ParseError> {
    let statement = parse_statement_with_dialect(sql, dialect)?;
    let mut walker = ElementWalker::new(sql);
    walker.visit_statement(&statement);
    Ok(walker.elements)
}

struct ElementWalker<'a> {
    sql: &'a str,
    scope: Vec<String>,
    elements: Vec<SqlElement>,
}

impl<'a> ElementWalker<'a> {
    fn new(sql: &'a str) -> Self {
        Self {
            sql,
            scope: Vec::new(),
            elements: Vec::new(),
        }
    }

    fn emit(&mut self, kind: ElementKind, alias: &str, code: String, span: Option<Span>) {
        if alias.is_empty() || code.is_empty() {
            return;
        }
        self.elements.push(SqlElement {
            kind,
            alias: alias.to_string(),
            code,
            scope_path: self.scope.clone(),
            span,
        });
    }

    /// Verbatim source text for a node, with its byte range. Falls back to
    /// the node's display form when the parser reported no usable span.
    fn node_text<N: Spanned + fmt::Display>(&self, node: &N) -> (String, Option<Span>) {
        match self.byte_range(node.span()) {
            Some(span) => (self.sql[span.start..span.end].to_string(), Some(span)),
            None => (node.to_string(), None),
        }
    }

    fn byte_range(&self, token_span: TokenSpan) -> Option<Span> {
        let start = line_col_to_offset(
            self.sql,
            token_span.start.line as usize,
            token_span.start.column as usize,
        )?;
        let end = line_col_to_offset(
            self.sql,
            token_span.end.line as usize,
            token_span.end.column as usize,
        )?;
        (start < end).then_some(Span::new(start, end))
    }

    fn scoped<F: FnOnce(&mut Self)>(&mut self, name: &str, f: F) {
        self.scope.push(name.to_string());
        f(self);
        self.scope.pop();
    }

    fn visit_statement(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Query(query) => self.visit_query(query),
            Statement::Insert(insert) => {
                if let Some(ref source) = insert.source {
                    self.visit_query(source);
                }
            }
            Statement::CreateView { query, .. } => self.visit_query(query),
            Statement::CreateTable(create) => {
                if let Some(ref query) = create.query {
                    self.visit_query(query);
                }
            }
            _ => {}
        }
    }

    fn visit_query(&mut self, query: &Query) {
        if let Some(ref with) = query.with {
            for cte in &with.cte_tables {
                let alias = cte.alias.name.value.clone();
                let (code, span) = self.node_text(cte.query.as_ref());
                self.emit(ElementKind::Cte, &alias, code, span);
                self.scoped(&alias, |walker| walker.visit_query(&cte.query));
            }
        }

        self.visit_set_expr(&query.body);

        if let Some(ref order_by) = query.order_by {
            if let OrderByKind::Expressions(exprs) = &order_by.kind {
                for order_expr in exprs {
                    self.visit_expr(&order_expr.expr);
                }
            }
        }
    }

    fn visit_set_expr(&mut self, body: &SetExpr) {
        match body {
            SetExpr::Select(select) => {
                for item in &select.projection {
                    match item {
                        SelectItem::ExprWithAlias { expr, alias } => {
                            let (code, span) = self.node_text(expr);
                            self.emit(ElementKind::ColumnAlias, &alias.value, code, span);
                            self.visit_expr(expr);
                        }
                        SelectItem::UnnamedExpr(expr) => self.visit_expr(expr),
                        _ => {}
                    }
                }

                for table_with_joins in &select.from {
                    self.visit_table_with_joins(table_with_joins);
                }

                if let Some(ref selection) = select.selection {
                    self.visit_expr(selection);
                }
                if let GroupByExpr::Expressions(exprs, _) = &select.group_by {
                    for expr in exprs {
                        self.visit_expr(expr);
                    }
                }
                if let Some(ref having) = select.having {
                    self.visit_expr(having);
                }
                if let Some(ref qualify) = select.qualify {
                    self.visit_expr(qualify);
                }
            }
            SetExpr::Query(query) => self.visit_query(query),
            SetExpr::SetOperation { left, right, .. } => {
                self.visit_set_expr(left);
                self.visit_set_expr(right);
            }
            SetExpr::Insert(statement)
            | SetExpr::Update(statement)
            | SetExpr::Delete(statement) => self.visit_statement(statement),
            _ => {}
        }
    }

    fn visit_table_with_joins(&mut self, table_with_joins: &TableWithJoins) {
        self.visit_table_factor(&table_with_joins.relation);
        for join in &table_with_joins.joins {
            self.visit_table_factor(&join.relation);
            if let Some(expr) = join_constraint_expr(&join.join_operator) {
                self.visit_expr(expr);
            }
        }
    }

    fn visit_table_factor(&mut self, factor: &TableFactor) {
        match factor {
            TableFactor::Table { name, alias, .. } => {
                if let Some(alias) = alias {
                    let (code, span) = self.node_text(name);
                    self.emit(ElementKind::TableAlias, &alias.name.value, code, span);
                }
            }
            TableFactor::Derived {
                subquery, alias, ..
            } => {
                let scope_name = match alias {
                    Some(alias) => {
                        let (code, span) = self.node_text(subquery.as_ref());
                        self.emit(ElementKind::TableAlias, &alias.name.value, code, span);
                        alias.name.value.clone()
                    }
                    None => ANONYMOUS_SCOPE.to_string(),
                };
                self.scoped(&scope_name, |walker| walker.visit_query(subquery));
            }
            TableFactor::NestedJoin {
                table_with_joins,
                alias,
            } => {
                if let Some(alias) = alias {
                    let (code, span) = self.node_text(table_with_joins.as_ref());
                    self.emit(ElementKind::TableAlias, &alias.name.value, code, span);
                }
                self.visit_table_with_joins(table_with_joins);
            }
            _ => {}
        }
    }

    /// Recurses through an expression looking for subqueries; nothing else in
    /// an expression can introduce a named element.
    fn visit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Subquery(subquery) | Expr::Exists { subquery, .. } => {
                self.scoped(ANONYMOUS_SCOPE, |walker| walker.visit_query(subquery));
            }
            Expr::InSubquery { expr, subquery, .. } => {
                self.visit_expr(expr);
                self.scoped(ANONYMOUS_SCOPE, |walker| walker.visit_query(subquery));
            }
            Expr::BinaryOp { left, right, .. } => {
                self.visit_expr(left);
                self.visit_expr(right);
            }
            Expr::UnaryOp { expr, .. } => self.visit_expr(expr),
            Expr::Nested(inner) => self.visit_expr(inner),
            Expr::Cast { expr, .. } => self.visit_expr(expr),
            Expr::IsNull(inner) | Expr::IsNotNull(inner) => self.visit_expr(inner),
            Expr::Between {
                expr, low, high, ..
            } => {
                self.visit_expr(expr);
                self.visit_expr(low);
                self.visit_expr(high);
            }
            Expr::InList { expr, list, .. } => {
                self.visit_expr(expr);
                for item in list {
                    self.visit_expr(item);
                }
            }
            Expr::Case {
                operand,
                conditions,
                else_result,
                ..
            } => {
                if let Some(operand) = operand {
                    self.visit_expr(operand);
                }
                for case_when in conditions {
                    self.visit_expr(&case_when.condition);
                    self.visit_expr(&case_when.result);
                }
                if let Some(else_result) = else_result {
                    self.visit_expr(else_result);
                }
            }
            Expr::Function(func) => match &func.args {
                FunctionArguments::Subquery(subquery) => {
                    self.scoped(ANONYMOUS_SCOPE, |walker| walker.visit_query(subquery));
                }
                FunctionArguments::List(arg_list) => {
                    for arg in &arg_list.args {
                        match arg {
                            FunctionArg::Unnamed(FunctionArgExpr::Expr(expr))
                            | FunctionArg::Named {
                                arg: FunctionArgExpr::Expr(expr),
                                ..
                            } => self.visit_expr(expr),
                            _ => {}
                        }
                    }
                }
                FunctionArguments::None => {}
            },
            _ => {}
        }
    }
}

/// Returns the ON-clause expression of a join, when it has one.
fn join_constraint_expr(op: &JoinOperator) -> Option<&Expr> {
    let constraint = match op {
        JoinOperator::Join(c)
        | JoinOperator::Inner(c)
        | JoinOperator::Left(c)
        | JoinOperator::LeftOuter(c)
        | JoinOperator::Right(c)
        | JoinOperator::RightOuter(c)
        | JoinOperator::FullOuter(c)
        | JoinOperator::CrossJoin(c)
        | JoinOperator::Semi(c)
        | JoinOperator::LeftSemi(c)
        | JoinOperator::RightSemi(c)
        | JoinOperator::Anti(c)
        | JoinOperator::LeftAnti(c)
        | JoinOperator::RightAnti(c)
        | JoinOperator::StraightJoin(c) => c,
        _ => return None,
    };
    match constraint {
        JoinConstraint::On(expr) => Some(expr),
        _ => None,
    }
}

/// Converts a 1-indexed line/column position into a byte offset.
///
/// The parser reports columns in characters, so the column is walked via
/// `char_indices` rather than treated as a byte count.
fn line_col_to_offset(sql: &str, line: usize, column: usize) -> Option<usize> {
    if line == 0 || column == 0 {
        return None;
    }

    let bytes = sql.as_bytes();
    let mut current_line = 1;
    let mut offset = 0;

    while current_line < line {
        let remaining = bytes.get(offset..)?;
        let newline_pos = remaining.iter().position(|&b| b == b'\n')?;
        offset += newline_pos + 1;
        current_line += 1;
    }

    let line_start = offset;
    let remaining = bytes.get(line_start..)?;
    let line_len = remaining
        .iter()
        .position(|&b| b == b'\n')
        .unwrap_or(remaining.len());
    let line_end = line_start + line_len;
    let line_slice = &sql[line_start..line_end];

    let mut current_column = 1;
    for (rel_offset, _) in line_slice.char_indices() {
        if current_column == column {
            return Some(line_start + rel_offset);
        }
        current_column += 1;
    }

    // A column one past the end of the line is a valid exclusive endpoint.
    (column == current_column).then_some(line_end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract_generic(sql: &str) -> Vec<SqlElement> {
        extract(sql, Dialect::Generic).expect("extraction should succeed")
    }

    #[test]
    fn single_cte_is_extracted() {
        let sql = "WITH xyz AS (SELECT user_id, COUNT(*) AS total_orders FROM orders WHERE status = 'completed' GROUP BY user_id) SELECT * FROM xyz";
        let elements = extract_generic(sql);

        let ctes: Vec<_> = elements
            .iter()
            .filter(|e| e.kind == ElementKind::Cte)
            .collect();
        assert_eq!(ctes.len(), 1);
        assert_eq!(ctes[0].alias, "xyz");
        assert!(ctes[0].code.starts_with("SELECT user_id"));
        assert!(!ctes[0].code.contains("AS ("), "code must exclude the AS wrapper");
    }

    #[test]
    fn cte_body_aliases_are_scoped() {
        let sql = "WITH totals AS (SELECT COUNT(*) AS cnt FROM orders) SELECT * FROM totals";
        let elements = extract_generic(sql);

        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].kind, ElementKind::Cte);
        assert_eq!(elements[0].scope_path, Vec::<String>::new());
        assert_eq!(elements[1].kind, ElementKind::ColumnAlias);
        assert_eq!(elements[1].alias, "cnt");
        assert_eq!(elements[1].scope_path, vec!["totals".to_string()]);
    }

    #[test]
    fn code_is_verbatim_substring_of_input() {
        let sql = "WITH recent AS (SELECT id,  created_at FROM events)\nSELECT o.id, COUNT(*) AS n FROM recent AS o GROUP BY o.id";
        for element in extract_generic(sql) {
            assert!(
                sql.contains(&element.code),
                "code {:?} is not a verbatim substring",
                element.code
            );
            if let Some(span) = element.span {
                assert_eq!(&sql[span.start..span.end], element.code);
            }
        }
    }

    #[test]
    fn table_alias_code_is_table_name() {
        let elements = extract_generic("SELECT u.id FROM users AS u");
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].kind, ElementKind::TableAlias);
        assert_eq!(elements[0].alias, "u");
        assert_eq!(elements[0].code, "users");
    }

    #[test]
    fn bare_table_alias_without_as_keyword() {
        let elements = extract_generic("SELECT u.id FROM users u");
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].alias, "u");
    }

    #[test]
    fn derived_table_code_is_full_subquery() {
        let sql = "SELECT * FROM (SELECT id FROM users WHERE active = true) AS active_users";
        let elements = extract_generic(sql);
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].kind, ElementKind::TableAlias);
        assert_eq!(elements[0].alias, "active_users");
        assert_eq!(elements[0].code, "SELECT id FROM users WHERE active = true");
    }

    #[test]
    fn column_alias_with_adjacent_identifier_form() {
        let elements = extract_generic("SELECT COUNT(*) total FROM orders");
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].kind, ElementKind::ColumnAlias);
        assert_eq!(elements[0].alias, "total");
        assert_eq!(elements[0].code, "COUNT(*)");
    }

    #[test]
    fn unaliased_elements_are_skipped() {
        let elements = extract_generic("SELECT id, price * quantity FROM orders");
        assert!(elements.is_empty());
    }

    #[test]
    fn case_expression_alias() {
        let sql = "SELECT CASE WHEN x > 0 THEN 'yes' ELSE 'no' END AS flag FROM t";
        let elements = extract_generic(sql);
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].alias, "flag");
        assert!(elements[0].code.starts_with("CASE WHEN"));
    }

    #[test]
    fn duplicate_aliases_in_different_scopes_are_distinct() {
        let sql = "WITH a AS (SELECT 1 AS n), b AS (SELECT 2 AS n) SELECT * FROM a, b";
        let elements = extract_generic(sql);

        let ns: Vec<_> = elements.iter().filter(|e| e.alias == "n").collect();
        assert_eq!(ns.len(), 2);
        assert_eq!(ns[0].scope_path, vec!["a".to_string()]);
        assert_eq!(ns[1].scope_path, vec!["b".to_string()]);
    }

    #[test]
    fn nested_cte_inside_derived_table() {
        let sql = "SELECT * FROM (WITH inner_cte AS (SELECT 1 AS one) SELECT * FROM inner_cte) AS outer_ref";
        let elements = extract_generic(sql);

        let inner = elements
            .iter()
            .find(|e| e.alias == "inner_cte")
            .expect("nested CTE extracted");
        assert_eq!(inner.kind, ElementKind::Cte);
        assert_eq!(inner.scope_path, vec!["outer_ref".to_string()]);
    }

    #[test]
    fn cte_referencing_another_cte_is_not_inlined() {
        let sql = "WITH base AS (SELECT id FROM users), filtered AS (SELECT * FROM base WHERE id > 10) SELECT * FROM filtered";
        let elements = extract_generic(sql);

        let filtered = elements.iter().find(|e| e.alias == "filtered").unwrap();
        assert_eq!(filtered.code, "SELECT * FROM base WHERE id > 10");
        assert!(!filtered.code.contains("FROM users"));
    }

    #[test]
    fn subquery_in_where_clause_is_visited() {
        let sql =
            "SELECT id FROM orders WHERE user_id IN (SELECT id FROM (SELECT id FROM vips) AS v)";
        let elements = extract_generic(sql);

        let v = elements.iter().find(|e| e.alias == "v").unwrap();
        assert_eq!(v.kind, ElementKind::TableAlias);
        assert_eq!(v.scope_path, vec![ANONYMOUS_SCOPE.to_string()]);
    }

    #[test]
    fn elements_are_emitted_deterministically() {
        let sql = "WITH t AS (SELECT a AS x FROM foo) SELECT b AS y FROM t AS src";
        let first = extract_generic(sql);
        let second = extract_generic(sql);
        assert_eq!(first, second);
    }

    #[test]
    fn multiple_ctes_in_source_order() {
        let sql = "WITH first_cte AS (SELECT 1), second_cte AS (SELECT 2) SELECT * FROM first_cte, second_cte";
        let elements = extract_generic(sql);
        let names: Vec<_> = elements.iter().map(|e| e.alias.as_str()).collect();
        assert_eq!(names, vec!["first_cte", "second_cte"]);
    }

    #[test]
    fn malformed_sql_fails_fast() {
        let result = extract("SELECT * FROM", Dialect::Generic);
        assert!(result.is_err());
    }

    #[test]
    fn insert_select_source_is_walked() {
        let sql = "INSERT INTO archive SELECT id, price * 2 AS doubled FROM orders";
        let elements = extract_generic(sql);
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].alias, "doubled");
    }

    #[test]
    fn create_table_as_is_walked() {
        let sql = "CREATE TABLE snapshot AS SELECT COUNT(*) AS row_total FROM events";
        let elements = extract_generic(sql);
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].alias, "row_total");
    }

    #[test]
    fn union_branches_are_both_walked() {
        let sql = "SELECT id AS left_id FROM a UNION ALL SELECT id AS right_id FROM b";
        let elements = extract_generic(sql);
        let names: Vec<_> = elements.iter().map(|e| e.alias.as_str()).collect();
        assert_eq!(names, vec!["left_id", "right_id"]);
    }

    #[test]
    fn alias_case_is_preserved() {
        let elements = extract_generic(r#"SELECT COUNT(*) AS "TotalRows" FROM t"#);
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].alias, "TotalRows");
    }

    mod offsets {
        use super::*;

        #[test]
        fn single_line() {
            let sql = "SELECT * FROM users";
            assert_eq!(line_col_to_offset(sql, 1, 1), Some(0));
            assert_eq!(line_col_to_offset(sql, 1, 8), Some(7));
        }

        #[test]
        fn multi_line() {
            let sql = "SELECT *\nFROM users\nWHERE id = 1";
            assert_eq!(line_col_to_offset(sql, 2, 1), Some(9));
            assert_eq!(line_col_to_offset(sql, 3, 1), Some(20));
        }

        #[test]
        fn column_one_past_line_end_is_exclusive_endpoint() {
            let sql = "SELECT 1";
            assert_eq!(line_col_to_offset(sql, 1, 9), Some(8));
        }

        #[test]
        fn multibyte_characters_count_as_one_column() {
            let sql = "SELECT μ, f FROM t";
            assert_eq!(line_col_to_offset(sql, 1, 11), Some("SELECT μ, ".len()));
        }

        #[test]
        fn out_of_range_positions() {
            let sql = "SELECT 1";
            assert_eq!(line_col_to_offset(sql, 0, 1), None);
            assert_eq!(line_col_to_offset(sql, 1, 0), None);
            assert_eq!(line_col_to_offset(sql, 5, 1), None);
            assert_eq!(line_col_to_offset(sql, 1, 50), None);
        }
    }
}
