use regex::Regex;
use std::sync::OnceLock;

use crate::error::QueryError;

fn string_literals() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"'(?:[^'\\]|\\.)*'|"(?:[^"\\]|\\.)*""#).expect("static regex"))
}

fn write_clauses() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(CREATE|MERGE|SET|DELETE|DETACH|REMOVE|DROP|FOREACH|LOAD\s+CSV)\b|\bCALL\s+(apoc\.(create|merge|refactor|periodic|do|cypher|nodes|trigger|load|import)|dbms\.)",
        )
        .expect("static regex")
    })
}

fn files_param() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$files\b").expect("static regex"))
}

fn fences() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*```[A-Za-z]*\s*$").expect("static regex"))
}

/// Strip code fences, a leading "cypher:" marker and trailing semicolons from model output
pub fn clean_statement(raw: &str) -> String {
    let without_fences = fences().replace_all(raw, "");
    let trimmed = without_fences.trim();
    let trimmed = trimmed
        .strip_prefix("cypher:")
        .or_else(|| trimmed.strip_prefix("Cypher:"))
        .unwrap_or(trimmed);
    trimmed.trim().trim_end_matches(';').trim().to_string()
}

/// Accept only read statements that filter on the `$files` allowlist
pub fn check_read_only(statement: &str) -> Result<(), QueryError> {
    let unsafe_query = |reason: String| QueryError::UnsafeQuery {
        statement: statement.to_string(),
        reason,
    };

    if statement.trim().is_empty() {
        return Err(unsafe_query("empty statement".to_string()));
    }

    // literals may legitimately contain words like "set"
    let code = string_literals().replace_all(statement, "''");

    if let Some(m) = write_clauses().find(&code) {
        return Err(unsafe_query(format!("contains write clause '{}'", m.as_str().trim())));
    }
    if !files_param().is_match(&code) {
        return Err(unsafe_query("does not filter on $files".to_string()));
    }
    Ok(())
}
