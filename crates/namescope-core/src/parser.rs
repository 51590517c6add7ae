use crate::error::ParseError;
use crate::types::Dialect;
use sqlparser::ast::Statement;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

/// Parse a single SQL statement using the specified dialect.
///
/// The pipeline operates on one statement at a time; empty input and
/// multi-statement input both fail with a [`ParseError`] rather than being
/// partially analyzed.
pub fn parse_statement_with_dialect(
    sql: &str,
    dialect: Dialect,
) -> Result<Statement, ParseError> {
    let sqlparser_dialect = dialect.to_sqlparser_dialect();
    let statements = match Parser::parse_sql(sqlparser_dialect.as_ref(), sql) {
        Ok(statements) => statements,
        Err(primary_err) => {
            // Parity fallback: Generic dialect frequently fails on Postgres-specific
            // operators (`->>`, `::`) commonly used in warehouse SQL.
            if matches!(dialect, Dialect::Generic) && looks_like_postgres_syntax(sql) {
                let postgres = PostgreSqlDialect {};
                match Parser::parse_sql(&postgres, sql) {
                    Ok(statements) => statements,
                    Err(_) => return Err(ParseError::from(primary_err).with_dialect(dialect)),
                }
            } else {
                return Err(ParseError::from(primary_err).with_dialect(dialect));
            }
        }
    };

    let mut statements = statements.into_iter();
    let Some(first) = statements.next() else {
        return Err(ParseError::new("input contains no SQL statement").with_dialect(dialect));
    };
    if statements.next().is_some() {
        return Err(
            ParseError::new("expected a single SQL statement, found several")
                .with_dialect(dialect),
        );
    }

    Ok(first)
}

fn looks_like_postgres_syntax(sql: &str) -> bool {
    sql.contains("::") || sql.contains("->")
}

/// Parse a single SQL statement using the generic dialect.
pub fn parse_statement(sql: &str) -> Result<Statement, ParseError> {
    parse_statement_with_dialect(sql, Dialect::Generic)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_select() {
        let result = parse_statement("SELECT * FROM users");
        assert!(result.is_ok());
    }

    #[test]
    fn rejects_invalid_sql() {
        let result = parse_statement("SELECT * FROM");
        assert!(result.is_err());
    }

    #[test]
    fn rejects_empty_input() {
        let err = parse_statement("   ").unwrap_err();
        assert!(err.message.contains("no SQL statement"), "{}", err.message);
    }

    #[test]
    fn rejects_multiple_statements() {
        let err = parse_statement("SELECT 1; SELECT 2;").unwrap_err();
        assert!(err.message.contains("single SQL statement"), "{}", err.message);
    }

    #[test]
    fn trailing_semicolon_is_still_one_statement() {
        let result = parse_statement("SELECT * FROM users;");
        assert!(result.is_ok());
    }

    #[test]
    fn parses_cte() {
        let sql = r#"
            WITH active_users AS (
                SELECT * FROM users WHERE active = true
            )
            SELECT * FROM active_users
        "#;
        assert!(parse_statement(sql).is_ok());
    }

    #[test]
    fn parses_with_postgres_dialect() {
        let sql = "SELECT * FROM users WHERE name ILIKE '%test%'";
        assert!(parse_statement_with_dialect(sql, Dialect::Postgres).is_ok());
    }

    #[test]
    fn parses_with_snowflake_dialect() {
        let sql = "SELECT * FROM db.schema.table";
        assert!(parse_statement_with_dialect(sql, Dialect::Snowflake).is_ok());
    }

    #[test]
    fn generic_falls_back_for_postgres_cast_operator() {
        let sql = "SELECT workspace_id::text FROM usage_line_item";
        assert!(parse_statement(sql).is_ok());
    }

    #[test]
    fn parse_error_records_dialect() {
        let err = parse_statement_with_dialect("SELECT * FROM", Dialect::Mysql).unwrap_err();
        assert_eq!(err.dialect, Some(Dialect::Mysql));
    }
}
