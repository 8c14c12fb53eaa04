//! Pre-evaluation security validation for template text.
//!
//! Runs before parsing (token-level checks over the raw source) and after
//! parsing (nesting-depth check over the AST). Either stage failing means
//! the template is never evaluated.

use crate::ast::Node;

/// Tokens that are never allowed to appear, case-insensitively, anywhere a
/// template identifier or field segment could be written.
const BANNED_SUBSTRINGS: &[&str] = &["exec", "system", "cmd", "eval", "run"];

/// Maximum nesting depth of `if`/`range` blocks.
pub const MAX_DEPTH: usize = 10;

/// A template failed security validation.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum SecurityError {
    /// An identifier or field segment contained a banned substring.
    #[error("identifier '{0}' contains a disallowed token")]
    BannedToken(String),
    /// The template contained shell-style `${VAR}` expansion.
    #[error("shell-style expansion '${{...}}' is not allowed")]
    ShellExpansion,
    /// The template contained a backtick-enclosed substring.
    #[error("backtick-enclosed text is not allowed")]
    Backtick,
    /// The template contained a path-traversal literal.
    #[error("path traversal literal ('../' or '..\\\\') is not allowed")]
    PathTraversal,
    /// The parsed template's nesting depth exceeded [`MAX_DEPTH`].
    #[error("template nesting depth {0} exceeds the maximum of {MAX_DEPTH}")]
    TooDeep(usize),
}

/// Validate the raw template source before it is parsed.
///
/// Checks, in order: banned identifier substrings, shell-style `${VAR}`
/// expansion (explicitly allowing the literal `${{` prefix used by a
/// literal `$` followed by a template expression), backtick-enclosed
/// text, and path-traversal literals.
pub fn validate_source(text: &str) -> Result<(), SecurityError> {
    check_banned_identifiers(text)?;
    check_shell_expansion(text)?;
    check_backticks(text)?;
    check_path_traversal(text)?;
    Ok(())
}

fn check_banned_identifiers(text: &str) -> Result<(), SecurityError> {
    for word in tokenize_words(text) {
        let lower = word.to_ascii_lowercase();
        if BANNED_SUBSTRINGS.iter().any(|bad| lower.contains(bad)) {
            return Err(SecurityError::BannedToken(word.to_string()));
        }
    }
    Ok(())
}

/// Split `text` into identifier-like words: runs of alphanumerics, `_`, and
/// `.` (so that field chains like `.env.cmdExec` are scanned as a whole and
/// also as their dot-separated segments).
fn tokenize_words(text: &str) -> Vec<&str> {
    let mut words = Vec::new();
    let bytes = text.as_bytes();
    let mut start: Option<usize> = None;
    for (i, b) in bytes.iter().enumerate() {
        let is_word = b.is_ascii_alphanumeric() || *b == b'_' || *b == b'.';
        match (is_word, start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                words.push(&text[s..i]);
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        words.push(&text[s..]);
    }
    // Also push each dot-separated segment of chains so `.env.exec_me`
    // flags on the `exec_me` segment even if the whole chain otherwise
    // looked benign.
    let mut out = Vec::with_capacity(words.len() * 2);
    for w in words {
        out.push(w);
        if w.contains('.') {
            out.extend(w.split('.').filter(|s| !s.is_empty()));
        }
    }
    out
}

fn check_shell_expansion(text: &str) -> Result<(), SecurityError> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while let Some(pos) = text[i..].find("${") {
        let abs = i + pos;
        // `${{` is the allowed literal-$ followed by a Go-style template.
        if bytes.get(abs + 2) == Some(&b'{') {
            i = abs + 3;
            continue;
        }
        return Err(SecurityError::ShellExpansion);
    }
    Ok(())
}

fn check_backticks(text: &str) -> Result<(), SecurityError> {
    if text.contains('`') {
        return Err(SecurityError::Backtick);
    }
    Ok(())
}

fn check_path_traversal(text: &str) -> Result<(), SecurityError> {
    if text.contains("../") || text.contains("..\\") {
        return Err(SecurityError::PathTraversal);
    }
    Ok(())
}

/// Validate the nesting depth of a parsed template's AST.
pub fn validate_depth(nodes: &[Node]) -> Result<(), SecurityError> {
    let depth = max_depth(nodes, 1);
    if depth > MAX_DEPTH {
        return Err(SecurityError::TooDeep(depth));
    }
    Ok(())
}

fn max_depth(nodes: &[Node], current: usize) -> usize {
    let mut deepest = current;
    for node in nodes {
        let sub = match node {
            Node::If { then, els, .. } => {
                let then_depth = max_depth(then, current + 1);
                let else_depth = els
                    .as_ref()
                    .map(|e| max_depth(e, current + 1))
                    .unwrap_or(current);
                then_depth.max(else_depth)
            }
            Node::Range { body, .. } => max_depth(body, current + 1),
            Node::Text(_) | Node::Print(_) => current,
        };
        deepest = deepest.max(sub);
    }
    deepest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_banned_identifier() {
        assert!(matches!(
            validate_source("{{.env.execPath}}"),
            Err(SecurityError::BannedToken(_))
        ));
    }

    #[test]
    fn rejects_shell_expansion() {
        assert_eq!(
            validate_source("hello ${HOME}"),
            Err(SecurityError::ShellExpansion)
        );
    }

    #[test]
    fn allows_literal_dollar_template() {
        assert!(validate_source("price: ${{.env.amount}}").is_ok());
    }

    #[test]
    fn rejects_backtick() {
        assert_eq!(validate_source("`id`"), Err(SecurityError::Backtick));
    }

    #[test]
    fn rejects_path_traversal() {
        assert_eq!(
            validate_source("../etc/passwd"),
            Err(SecurityError::PathTraversal)
        );
        assert_eq!(
            validate_source("..\\windows\\system32"),
            Err(SecurityError::PathTraversal)
        );
    }

    #[test]
    fn accepts_plain_field_access() {
        assert!(validate_source("{{.env.rid}} and {{.auth.a1}}").is_ok());
    }
}
