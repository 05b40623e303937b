//! Allowlist validation for generated queries.
//!
//! Every check runs on every query so the result lists all checks attempted;
//! the reported reason is the first failure in check order.

use storesight_core::{Table, ValidationResult};

pub const DEFAULT_ROW_CAP: u32 = 100;

const BLOCKED_KEYWORDS: &[&str] = &[
    "DROP", "DELETE", "UPDATE", "INSERT", "ALTER", "EXEC", "EXECUTE", "TRUNCATE", "CREATE",
    "GRANT", "REVOKE", "MERGE", "REPLACE", "CALL", "ATTACH", "DETACH", "PRAGMA",
];

const ALLOWED_KEYWORDS: &[&str] = &[
    "SELECT", "FROM", "WHERE", "GROUP", "BY", "ORDER", "LIMIT", "JOIN", "ON", "AS", "AND", "OR",
    "HAVING", "LIKE", "ASC", "DESC", "DISTINCT",
];

/// Reserved words recognised as SQL syntax; anything here that is not in
/// `ALLOWED_KEYWORDS` is refused.
const RESERVED_KEYWORDS: &[&str] = &[
    "ALL", "ANALYZE", "ANY", "BEGIN", "BETWEEN", "CASE", "CAST", "COMMIT", "CROSS", "DATABASE",
    "DECLARE", "ELSE", "END", "ESCAPE", "EXCEPT", "EXISTS", "EXPLAIN", "FETCH", "FOR", "FULL",
    "GLOB", "HANDLER", "IF", "ILIKE", "IN", "INNER", "INTERSECT", "INTO", "IS", "KILL", "LEFT",
    "LOAD", "LOCK", "NATURAL", "NOT", "NULL", "OFFSET", "OUTER", "OUTFILE", "OVER", "PARTITION",
    "PROCEDURE", "REGEXP", "RETURNING", "RIGHT", "ROLLBACK", "SAVEPOINT", "SCHEMA", "SET",
    "SHOW", "SHUTDOWN", "SLEEP", "TABLE", "THEN", "UNION", "UNLOCK", "USE", "USING", "VACUUM",
    "VALUES", "VIEW", "WHEN", "WINDOW", "WITH",
];

const ALLOWED_FUNCTIONS: &[&str] = &["SUM", "COUNT", "AVG", "MAX", "MIN", "LOWER"];

const COMMENT_MARKERS: &[&str] = &["--", "/*", "*/", "#"];

pub const CHECK_NAMES: [&str; 10] = [
    "non_empty",
    "statement_separator",
    "inline_comments",
    "blocked_keywords",
    "read_only",
    "balanced_literals",
    "allowed_keywords",
    "allowed_functions",
    "allowed_tables",
    "row_limit",
];

#[derive(Clone, Debug, PartialEq, Eq)]
enum Token {
    Word(String),
    Number(String),
    Literal,
    Symbol(char),
}

impl Token {
    fn word(&self) -> Option<&str> {
        match self {
            Self::Word(word) => Some(word),
            _ => None,
        }
    }
}

struct Scan {
    tokens: Vec<Token>,
    balanced: bool,
}

#[derive(Clone, Debug)]
pub struct QueryValidator {
    row_cap: u32,
}

impl Default for QueryValidator {
    fn default() -> Self {
        Self { row_cap: DEFAULT_ROW_CAP }
    }
}

impl QueryValidator {
    pub fn new(row_cap: u32) -> Self {
        Self { row_cap }
    }

    pub fn validate(&self, query: &str) -> ValidationResult {
        let scan = scan(query);

        let outcomes = [
            check_non_empty(query),
            check_statement_separator(query),
            check_inline_comments(query),
            check_blocked_keywords(query),
            check_read_only(&scan.tokens),
            check_balanced_literals(&scan),
            check_allowed_keywords(&scan.tokens),
            check_allowed_functions(&scan.tokens),
            check_allowed_tables(&scan.tokens),
            self.check_row_limit(&scan.tokens),
        ];

        let reason = outcomes.iter().find_map(|outcome| outcome.clone().err());
        ValidationResult {
            passed: reason.is_none(),
            checks: CHECK_NAMES.iter().map(|name| (*name).to_string()).collect(),
            reason,
        }
    }

    fn check_row_limit(&self, tokens: &[Token]) -> Result<(), String> {
        for (index, token) in tokens.iter().enumerate() {
            if !token.word().is_some_and(|word| word.eq_ignore_ascii_case("LIMIT")) {
                continue;
            }
            let value = match tokens.get(index + 1) {
                Some(Token::Number(number)) => number.parse::<u64>().ok(),
                _ => None,
            };
            match value {
                None => return Err("malformed query: LIMIT must be an integer".to_string()),
                Some(rows) if rows > u64::from(self.row_cap) => {
                    return Err(format!(
                        "unsafe operation: LIMIT {rows} exceeds the {} row cap",
                        self.row_cap
                    ));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

fn check_non_empty(query: &str) -> Result<(), String> {
    if query.trim().is_empty() {
        return Err("malformed query: query is empty".to_string());
    }
    Ok(())
}

fn check_statement_separator(query: &str) -> Result<(), String> {
    if query.contains(';') {
        return Err("unsafe operation: statement separator `;` is not permitted".to_string());
    }
    Ok(())
}

fn check_inline_comments(query: &str) -> Result<(), String> {
    match COMMENT_MARKERS.iter().find(|marker| query.contains(*marker)) {
        Some(marker) => Err(format!("unsafe operation: comment marker `{marker}` is not permitted")),
        None => Ok(()),
    }
}

/// Scans raw words, literal contents included.
fn check_blocked_keywords(query: &str) -> Result<(), String> {
    let blocked = query
        .split(|character: char| !(character.is_ascii_alphanumeric() || character == '_'))
        .map(str::to_ascii_uppercase)
        .find(|word| BLOCKED_KEYWORDS.contains(&word.as_str()));

    match blocked {
        Some(keyword) => Err(format!("unsafe operation: `{keyword}` is not permitted")),
        None => Ok(()),
    }
}

fn check_read_only(tokens: &[Token]) -> Result<(), String> {
    match tokens.first().and_then(Token::word) {
        Some(word) if word.eq_ignore_ascii_case("SELECT") => Ok(()),
        _ => Err("not read-only: query must begin with SELECT".to_string()),
    }
}

fn check_balanced_literals(scan: &Scan) -> Result<(), String> {
    if scan.balanced {
        Ok(())
    } else {
        Err("malformed query: unterminated string literal".to_string())
    }
}

fn check_allowed_keywords(tokens: &[Token]) -> Result<(), String> {
    let refused = tokens.iter().filter_map(Token::word).map(str::to_ascii_uppercase).find(|word| {
        RESERVED_KEYWORDS.contains(&word.as_str()) && !ALLOWED_KEYWORDS.contains(&word.as_str())
    });

    match refused {
        Some(keyword) => Err(format!("unsafe operation: keyword `{keyword}` is not allowed")),
        None => Ok(()),
    }
}

fn check_allowed_functions(tokens: &[Token]) -> Result<(), String> {
    for pair in tokens.windows(2) {
        let [Token::Word(word), Token::Symbol('(')] = pair else {
            continue;
        };
        let upper = word.to_ascii_uppercase();
        if ALLOWED_KEYWORDS.contains(&upper.as_str()) {
            continue;
        }
        if !ALLOWED_FUNCTIONS.contains(&upper.as_str()) {
            return Err(format!("unsafe operation: function `{upper}` is not allowed"));
        }
    }
    Ok(())
}

fn check_allowed_tables(tokens: &[Token]) -> Result<(), String> {
    let mut referenced = 0_usize;

    for (index, token) in tokens.iter().enumerate() {
        let introduces_table = token
            .word()
            .is_some_and(|word| word.eq_ignore_ascii_case("FROM") || word.eq_ignore_ascii_case("JOIN"));
        if introduces_table {
            match tokens.get(index + 1) {
                Some(Token::Word(name)) if Table::is_allowed(name) => referenced += 1,
                Some(Token::Word(name)) => {
                    return Err(format!("unsafe table: `{name}` is not an allowed table"))
                }
                _ => return Err("unsafe table: expected a table name".to_string()),
            }
        }

        if let (Token::Word(qualifier), Some(Token::Symbol('.'))) = (token, tokens.get(index + 1)) {
            if !Table::is_allowed(qualifier) {
                return Err(format!("unsafe table: `{qualifier}` is not an allowed table"));
            }
        }
    }

    if referenced == 0 {
        return Err("unsafe table: query does not reference an allowed table".to_string());
    }
    Ok(())
}

/// Single pass tokenizer. Quoted text (`'`, `"`, and backticks) collapses to
/// one literal token; `''` inside a single-quoted literal is an escape.
fn scan(query: &str) -> Scan {
    let characters = query.chars().collect::<Vec<_>>();
    let mut tokens = Vec::new();
    let mut index = 0;

    while index < characters.len() {
        let character = characters[index];

        if character.is_whitespace() {
            index += 1;
        } else if matches!(character, '\'' | '"' | '`') {
            let mut cursor = index + 1;
            let mut closed = false;
            while cursor < characters.len() {
                if characters[cursor] == character {
                    if character == '\'' && characters.get(cursor + 1) == Some(&'\'') {
                        cursor += 2;
                        continue;
                    }
                    closed = true;
                    break;
                }
                cursor += 1;
            }
            if !closed {
                tokens.push(Token::Literal);
                return Scan { tokens, balanced: false };
            }
            tokens.push(Token::Literal);
            index = cursor + 1;
        } else if character.is_ascii_digit() {
            let start = index;
            while index < characters.len()
                && (characters[index].is_ascii_digit() || characters[index] == '.')
            {
                index += 1;
            }
            tokens.push(Token::Number(characters[start..index].iter().collect()));
        } else if character.is_alphanumeric() || character == '_' {
            let start = index;
            while index < characters.len()
                && (characters[index].is_alphanumeric() || characters[index] == '_')
            {
                index += 1;
            }
            tokens.push(Token::Word(characters[start..index].iter().collect()));
        } else {
            tokens.push(Token::Symbol(character));
            index += 1;
        }
    }

    Scan { tokens, balanced: true }
}
