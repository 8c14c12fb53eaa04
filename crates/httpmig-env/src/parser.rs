//! Recursive-descent parser for the `{{ }}` template mini-language.

use crate::ast::{Cond, FieldPath, Node, Operand, PrintExpr};

/// A template failed to parse.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    /// An opening `{{` had no matching `}}`.
    #[error("unterminated '{{{{' tag")]
    UnterminatedTag,
    /// An `{{if}}`/`{{range}}` had no matching `{{end}}`.
    #[error("unterminated '{{{{{0}}}}}' block")]
    UnterminatedBlock(&'static str),
    /// A stray `{{else}}` or `{{end}}` with no opening block.
    #[error("unexpected '{{{{{0}}}}}' with no open block")]
    UnexpectedCloser(&'static str),
    /// The tag body did not match any known grammar production.
    #[error("could not parse tag: '{0}'")]
    MalformedTag(String),
}

/// Parse `text` into a flat sequence of top-level [`Node`]s.
pub fn parse(text: &str) -> Result<Vec<Node>, ParseError> {
    let tags = lex(text)?;
    let mut iter = tags.into_iter().peekable();
    let nodes = parse_block(&mut iter)?;
    Ok(nodes)
}

/// Raw lexical item: either literal text or the trimmed contents of a
/// `{{ ... }}` tag.
enum Tag {
    Text(String),
    Directive(String),
}

fn lex(text: &str) -> Result<Vec<Tag>, ParseError> {
    let mut tags = Vec::new();
    let mut rest = text;
    loop {
        match rest.find("{{") {
            None => {
                if !rest.is_empty() {
                    tags.push(Tag::Text(rest.to_string()));
                }
                break;
            }
            Some(start) => {
                if start > 0 {
                    tags.push(Tag::Text(rest[..start].to_string()));
                }
                let after_open = &rest[start + 2..];
                let end = after_open
                    .find("}}")
                    .ok_or(ParseError::UnterminatedTag)?;
                let inner = after_open[..end].trim().to_string();
                tags.push(Tag::Directive(inner));
                rest = &after_open[end + 2..];
            }
        }
    }
    Ok(tags)
}

type TagIter = std::iter::Peekable<std::vec::IntoIter<Tag>>;

/// Parse a sequence of nodes up to (but not consuming) the next `else` or
/// `end` directive, or end of input.
fn parse_block(iter: &mut TagIter) -> Result<Vec<Node>, ParseError> {
    let mut nodes = Vec::new();
    while let Some(tag) = iter.peek() {
        match tag {
            Tag::Directive(d) if d == "end" || d == "else" => break,
            _ => {}
        }
        let tag = iter.next().expect("peeked");
        match tag {
            Tag::Text(t) => nodes.push(Node::Text(t)),
            Tag::Directive(d) => nodes.push(parse_directive(&d, iter)?),
        }
    }
    Ok(nodes)
}

fn parse_directive(directive: &str, iter: &mut TagIter) -> Result<Node, ParseError> {
    if let Some(rest) = directive.strip_prefix("if ") {
        let cond = parse_cond(rest.trim())?;
        let then = parse_block(iter)?;
        let els = match iter.peek() {
            Some(Tag::Directive(d)) if d == "else" => {
                iter.next();
                let body = parse_block(iter)?;
                Some(body)
            }
            _ => None,
        };
        expect_end(iter, "if")?;
        Ok(Node::If { cond, then, els })
    } else if let Some(rest) = directive.strip_prefix("range ") {
        let field = parse_field(rest.trim())?;
        let body = parse_block(iter)?;
        expect_end(iter, "range")?;
        Ok(Node::Range { field, body })
    } else if directive == "end" || directive == "else" {
        Err(ParseError::UnexpectedCloser("end"))
    } else {
        Ok(Node::Print(parse_print(directive)?))
    }
}

fn expect_end(iter: &mut TagIter, block: &'static str) -> Result<(), ParseError> {
    match iter.next() {
        Some(Tag::Directive(d)) if d == "end" => Ok(()),
        _ => Err(ParseError::UnterminatedBlock(block)),
    }
}

fn parse_print(body: &str) -> Result<PrintExpr, ParseError> {
    let parts = split_ws(body);
    match parts.as_slice() {
        [field] => Ok(PrintExpr::Field(parse_field(field)?)),
        [kw, field] if *kw == "len" => Ok(PrintExpr::Len(parse_field(field)?)),
        [kw, field, lit] if *kw == "default" => {
            Ok(PrintExpr::Default(parse_field(field)?, parse_literal(lit)?))
        }
        _ => Err(ParseError::MalformedTag(body.to_string())),
    }
}

fn parse_cond(body: &str) -> Result<Cond, ParseError> {
    let parts = split_ws(body);
    match parts.as_slice() {
        [field] => Ok(Cond::Truthy(parse_field(field)?)),
        [kw, a, b] if *kw == "eq" => Ok(Cond::Eq(parse_operand(a)?, parse_operand(b)?)),
        [kw, a, b] if *kw == "ne" => Ok(Cond::Ne(parse_operand(a)?, parse_operand(b)?)),
        _ => Err(ParseError::MalformedTag(body.to_string())),
    }
}

fn parse_operand(token: &str) -> Result<Operand, ParseError> {
    if let Some(inner) = token.strip_prefix("len(").and_then(|s| s.strip_suffix(')')) {
        return Ok(Operand::Len(parse_field(inner.trim())?));
    }
    if token.starts_with('"') {
        return Ok(Operand::Literal(parse_literal(token)?));
    }
    Ok(Operand::Field(parse_field(token)?))
}

fn parse_field(token: &str) -> Result<FieldPath, ParseError> {
    if token == "." {
        return Ok(FieldPath::Current);
    }
    let segs: Vec<&str> = token.split('.').filter(|s| !s.is_empty()).collect();
    match segs.as_slice() {
        ["env", key] => Ok(FieldPath::Env((*key).to_string())),
        ["auth", name] => Ok(FieldPath::Auth((*name).to_string())),
        _ => Err(ParseError::MalformedTag(token.to_string())),
    }
}

fn parse_literal(token: &str) -> Result<String, ParseError> {
    let t = token.trim();
    if t.len() >= 2 && t.starts_with('"') && t.ends_with('"') {
        Ok(t[1..t.len() - 1].to_string())
    } else {
        Err(ParseError::MalformedTag(token.to_string()))
    }
}

/// Split on whitespace, but keep a double-quoted literal (which may
/// contain spaces) as a single token.
fn split_ws(body: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let bytes = body.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        while i < bytes.len() && bytes[i] == b' ' {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }
        let start = i;
        if bytes[i] == b'"' {
            i += 1;
            while i < bytes.len() && bytes[i] != b'"' {
                i += 1;
            }
            if i < bytes.len() {
                i += 1;
            }
        } else {
            while i < bytes.len() && bytes[i] != b' ' {
                i += 1;
            }
        }
        out.push(&body[start..i]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_field() {
        let nodes = parse("hello {{.env.name}}!").unwrap();
        assert_eq!(nodes.len(), 3);
        assert!(matches!(nodes[1], Node::Print(PrintExpr::Field(_))));
    }

    #[test]
    fn parses_if_else() {
        let nodes = parse("{{if .env.rid}}yes{{else}}no{{end}}").unwrap();
        assert_eq!(nodes.len(), 1);
        match &nodes[0] {
            Node::If { then, els, .. } => {
                assert_eq!(then.len(), 1);
                assert!(els.is_some());
            }
            _ => panic!("expected If"),
        }
    }

    #[test]
    fn parses_eq_condition() {
        let nodes = parse(r#"{{if eq .env.k "v"}}yes{{end}}"#).unwrap();
        match &nodes[0] {
            Node::If {
                cond: Cond::Eq(Operand::Field(_), Operand::Literal(lit)),
                ..
            } => assert_eq!(lit, "v"),
            _ => panic!("expected eq condition"),
        }
    }

    #[test]
    fn parses_range() {
        let nodes = parse("{{range .env.items}}[{{.}}]{{end}}").unwrap();
        match &nodes[0] {
            Node::Range { body, .. } => assert_eq!(body.len(), 3),
            _ => panic!("expected Range"),
        }
    }

    #[test]
    fn unterminated_tag_errors() {
        assert_eq!(parse("{{.env.x"), Err(ParseError::UnterminatedTag));
    }

    #[test]
    fn unterminated_block_errors() {
        assert_eq!(
            parse("{{if .env.x}}no end"),
            Err(ParseError::UnterminatedBlock("if"))
        );
    }
}
