/// FTS5 expression matching any query term. Terms are quoted so user
/// punctuation never reaches the FTS5 parser.
pub(super) fn to_fts_query(query_text: &str) -> String {
    query_text
        .split_whitespace()
        .map(|token| token.replace('"', ""))
        .filter(|token| token.chars().any(char::is_alphanumeric))
        .map(|token| format!("\"{token}\""))
        .collect::<Vec<String>>()
        .join(" OR ")
}
