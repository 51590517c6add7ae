//! Structural+semantic complexity scoring (SSCS) for SQL statements.
//!
//! Each named component (every CTE, plus the main query) gets a structural
//! score from weighted AST node counts with a depth penalty for nested
//! subqueries, and a semantic penalty derived from how badly its aliases
//! match their code. `SSCS = structural * (1 + penalty)`.

use crate::analyzer::{AnalyzeError, Analyzer, DEFAULT_THRESHOLD};
use crate::embedding::Embedder;
use crate::parser::parse_statement_with_dialect;
use crate::types::{Dialect, ElementKind, SimilarityResult};
use serde::{Deserialize, Serialize};
use sqlparser::ast::{
    BinaryOperator, Expr, FunctionArg, FunctionArgExpr, FunctionArguments, GroupByExpr,
    JoinConstraint, JoinOperator, OrderByKind, Query, SelectItem, SetExpr, Statement, TableFactor,
    TableWithJoins,
};
#[cfg(feature = "tracing")]
use tracing::warn;

/// Weights for structural complexity. Branching logic and window functions
/// carry a higher cognitive load than plain clauses.
const JOIN_WEIGHT: f32 = 1.0;
const FILTER_WEIGHT: f32 = 1.0;
const GROUPING_WEIGHT: f32 = 1.0;
const HAVING_WEIGHT: f32 = 1.0;
const ORDERING_WEIGHT: f32 = 1.0;
const CASE_WEIGHT: f32 = 2.0;
const WINDOW_WEIGHT: f32 = 2.0;
const CONNECTOR_WEIGHT: f32 = 1.0;
const SUBQUERY_WEIGHT: f32 = 1.0;

/// Added to a node's weight per level of subquery nesting.
const DEPTH_PENALTY: f32 = 0.5;

/// Alpha in `SSCS = structural * (1 + alpha * mean_badness)`.
const SEMANTIC_WEIGHT: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplexityOptions {
    /// Components scoring above this are logged as too complex.
    pub complexity_threshold: f32,
    /// Alias similarity scores below this feed the semantic penalty.
    pub similarity_threshold: f32,
    pub dialect: Dialect,
}

impl Default for ComplexityOptions {
    fn default() -> Self {
        Self {
            complexity_threshold: 15.0,
            similarity_threshold: DEFAULT_THRESHOLD,
            dialect: Dialect::Generic,
        }
    }
}

/// Score breakdown for one component (a CTE or the main query).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentScore {
    pub name: String,
    pub sscs: f32,
    pub structural: f32,
    pub semantic_penalty: f32,
}

impl ComponentScore {
    fn new(name: impl Into<String>, structural: f32, semantic_penalty: f32) -> Self {
        Self {
            name: name.into(),
            sscs: structural * (1.0 + semantic_penalty),
            structural,
            semantic_penalty,
        }
    }
}

/// An alias whose similarity score fell below the threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LowSimilarityAlias {
    pub alias: String,
    pub kind: ElementKind,
    pub score: f32,
}

/// Summary of the alias similarity scores behind the semantic penalty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AliasStats {
    pub total: usize,
    pub low_similarity: Vec<LowSimilarityAlias>,
    pub average_similarity: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplexityReport {
    /// Per-CTE scores followed by the main query, source order.
    pub components: Vec<ComponentScore>,
    /// Whole-statement score: summed structure, statement-wide penalty.
    pub overall: ComponentScore,
    pub alias_stats: AliasStats,
}

/// Computes the SSCS report for one statement.
///
/// CTEs are treated as independent components: each starts at depth 0, which
/// rewards splitting deeply nested logic into named steps. The main query is
/// scored with its WITH clause excluded to avoid double counting.
pub fn complexity(
    sql: &str,
    embedder: &dyn Embedder,
    options: ComplexityOptions,
) -> Result<ComplexityReport, AnalyzeError> {
    let statement = parse_statement_with_dialect(sql, options.dialect)?;
    let scored = Analyzer::new(embedder)
        .with_dialect(options.dialect)
        .score_elements(sql)?;

    let mut components = Vec::new();
    let mut total_structural = 0.0f32;

    if let Some(query) = statement_query(&statement) {
        if let Some(ref with) = query.with {
            for cte in &with.cte_tables {
                let name = cte.alias.name.value.clone();
                let structural = query_score(&cte.query, 0);
                let cte_scored: Vec<SimilarityResult> = scored
                    .iter()
                    .filter(|r| r.element.scope_path.first() == Some(&name))
                    .cloned()
                    .collect();
                let penalty = semantic_penalty(&cte_scored, options.similarity_threshold);
                total_structural += structural;
                components.push(ComponentScore::new(name, structural, penalty));
            }
        }

        let main_structural = query_score_without_ctes(query);
        total_structural += main_structural;
        let statement_penalty = semantic_penalty(&scored, options.similarity_threshold);
        components.push(ComponentScore::new(
            "main query",
            main_structural,
            statement_penalty,
        ));
    }

    let statement_penalty = semantic_penalty(&scored, options.similarity_threshold);
    let overall = ComponentScore::new("overall", total_structural, statement_penalty);

    #[cfg(feature = "tracing")]
    for component in components.iter().chain(std::iter::once(&overall)) {
        if component.sscs > options.complexity_threshold {
            warn!(
                component = %component.name,
                sscs = component.sscs,
                threshold = options.complexity_threshold,
                "component exceeds complexity threshold"
            );
        }
    }
    #[cfg(not(feature = "tracing"))]
    let _ = options.complexity_threshold;

    let alias_stats = build_alias_stats(&scored, options.similarity_threshold);

    Ok(ComplexityReport {
        components,
        overall,
        alias_stats,
    })
}

/// Penalty is the mean "badness" (1 - score) of below-threshold aliases,
/// averaged over all scored elements and damped by [`SEMANTIC_WEIGHT`].
fn semantic_penalty(scored: &[SimilarityResult], threshold: f32) -> f32 {
    if scored.is_empty() {
        return 0.0;
    }
    let badness: f32 = scored
        .iter()
        .filter(|r| r.score < threshold)
        .map(|r| 1.0 - r.score)
        .sum();
    if badness == 0.0 {
        return 0.0;
    }
    SEMANTIC_WEIGHT * (badness / scored.len() as f32)
}

fn build_alias_stats(scored: &[SimilarityResult], threshold: f32) -> AliasStats {
    let low_similarity: Vec<LowSimilarityAlias> = scored
        .iter()
        .filter(|r| r.score < threshold)
        .map(|r| LowSimilarityAlias {
            alias: r.element.alias.clone(),
            kind: r.element.kind,
            score: r.score,
        })
        .collect();
    let average_similarity = if scored.is_empty() {
        0.0
    } else {
        scored.iter().map(|r| r.score).sum::<f32>() / scored.len() as f32
    };
    AliasStats {
        total: scored.len(),
        low_similarity,
        average_similarity,
    }
}

fn statement_query(stmt: &Statement) -> Option<&Query> {
    match stmt {
        Statement::Query(query) => Some(query),
        Statement::Insert(insert) => insert.source.as_deref(),
        Statement::CreateView { query, .. } => Some(query),
        Statement::CreateTable(create) => create.query.as_deref(),
        _ => None,
    }
}

fn weighted(base: f32, depth: u32) -> f32 {
    base + DEPTH_PENALTY * depth as f32
}

fn query_score(query: &Query, depth: u32) -> f32 {
    let mut score = 0.0;
    if let Some(ref with) = query.with {
        for cte in &with.cte_tables {
            score += query_score(&cte.query, depth);
        }
    }
    score + query_score_body(query, depth)
}

/// Main-query score: the WITH clause is excluded because each CTE is scored
/// as its own component.
fn query_score_without_ctes(query: &Query) -> f32 {
    query_score_body(query, 0)
}

fn query_score_body(query: &Query, depth: u32) -> f32 {
    let mut score = set_expr_score(&query.body, depth);
    if let Some(ref order_by) = query.order_by {
        if let OrderByKind::Expressions(exprs) = &order_by.kind {
            if !exprs.is_empty() {
                score += weighted(ORDERING_WEIGHT, depth);
                for order_expr in exprs {
                    score += expr_score(&order_expr.expr, depth);
                }
            }
        }
    }
    score
}

fn set_expr_score(body: &SetExpr, depth: u32) -> f32 {
    match body {
        SetExpr::Select(select) => {
            let mut score = 0.0;

            for item in &select.projection {
                if let SelectItem::UnnamedExpr(expr) | SelectItem::ExprWithAlias { expr, .. } =
                    item
                {
                    score += expr_score(expr, depth);
                }
            }

            for table_with_joins in &select.from {
                score += table_with_joins_score(table_with_joins, depth);
            }

            if let Some(ref selection) = select.selection {
                score += weighted(FILTER_WEIGHT, depth);
                score += expr_score(selection, depth);
            }
            if let GroupByExpr::Expressions(exprs, _) = &select.group_by {
                if !exprs.is_empty() {
                    score += weighted(GROUPING_WEIGHT, depth);
                    for expr in exprs {
                        score += expr_score(expr, depth);
                    }
                }
            }
            if let Some(ref having) = select.having {
                score += weighted(HAVING_WEIGHT, depth);
                score += expr_score(having, depth);
            }
            if let Some(ref qualify) = select.qualify {
                score += expr_score(qualify, depth);
            }

            score
        }
        SetExpr::Query(query) => query_score(query, depth),
        SetExpr::SetOperation { left, right, .. } => {
            set_expr_score(left, depth) + set_expr_score(right, depth)
        }
        _ => 0.0,
    }
}

fn table_with_joins_score(table_with_joins: &TableWithJoins, depth: u32) -> f32 {
    let mut score = table_factor_score(&table_with_joins.relation, depth);
    for join in &table_with_joins.joins {
        score += weighted(JOIN_WEIGHT, depth);
        score += table_factor_score(&join.relation, depth);
        if let Some(expr) = join_on_expr(&join.join_operator) {
            score += expr_score(expr, depth);
        }
    }
    score
}

fn table_factor_score(factor: &TableFactor, depth: u32) -> f32 {
    match factor {
        TableFactor::Derived { subquery, .. } => {
            weighted(SUBQUERY_WEIGHT, depth) + query_score(subquery, depth + 1)
        }
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => table_with_joins_score(table_with_joins, depth),
        _ => 0.0,
    }
}

fn join_on_expr(op: &JoinOperator) -> Option<&Expr> {
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

fn expr_score(expr: &Expr, depth: u32) -> f32 {
    match expr {
        Expr::BinaryOp { left, op, right } => {
            let connector = matches!(op, BinaryOperator::And | BinaryOperator::Or);
            let base = if connector {
                weighted(CONNECTOR_WEIGHT, depth)
            } else {
                0.0
            };
            base + expr_score(left, depth) + expr_score(right, depth)
        }
        Expr::UnaryOp { expr, .. } => expr_score(expr, depth),
        Expr::Nested(inner) => expr_score(inner, depth),
        Expr::Cast { expr, .. } => expr_score(expr, depth),
        Expr::IsNull(inner) | Expr::IsNotNull(inner) => expr_score(inner, depth),
        Expr::Between {
            expr, low, high, ..
        } => expr_score(expr, depth) + expr_score(low, depth) + expr_score(high, depth),
        Expr::InList { expr, list, .. } => {
            expr_score(expr, depth) + list.iter().map(|e| expr_score(e, depth)).sum::<f32>()
        }
        Expr::Case {
            operand,
            conditions,
            else_result,
            ..
        } => {
            let mut score = weighted(CASE_WEIGHT, depth);
            if let Some(operand) = operand {
                score += expr_score(operand, depth);
            }
            for case_when in conditions {
                score += expr_score(&case_when.condition, depth);
                score += expr_score(&case_when.result, depth);
            }
            if let Some(else_result) = else_result {
                score += expr_score(else_result, depth);
            }
            score
        }
        Expr::Function(func) => {
            let mut score = if func.over.is_some() {
                weighted(WINDOW_WEIGHT, depth)
            } else {
                0.0
            };
            match &func.args {
                FunctionArguments::Subquery(subquery) => {
                    score += weighted(SUBQUERY_WEIGHT, depth);
                    score += query_score(subquery, depth + 1);
                }
                FunctionArguments::List(arg_list) => {
                    for arg in &arg_list.args {
                        if let FunctionArg::Unnamed(FunctionArgExpr::Expr(expr))
                        | FunctionArg::Named {
                            arg: FunctionArgExpr::Expr(expr),
                            ..
                        } = arg
                        {
                            score += expr_score(expr, depth);
                        }
                    }
                }
                FunctionArguments::None => {}
            }
            score
        }
        Expr::Subquery(subquery) | Expr::Exists { subquery, .. } => {
            weighted(SUBQUERY_WEIGHT, depth) + query_score(subquery, depth + 1)
        }
        Expr::InSubquery { expr, subquery, .. } => {
            weighted(SUBQUERY_WEIGHT, depth)
                + expr_score(expr, depth)
                + query_score(subquery, depth + 1)
        }
        _ => 0.0,
    }
}
