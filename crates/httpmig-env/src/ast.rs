//! Parsed representation of a `{{ }}` template.

/// A dotted field reference: `.env.K` or `.auth.N`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldPath {
    /// `.env.K` — consults `local` then `global`.
    Env(String),
    /// `.auth.N` — consults `auth`.
    Auth(String),
    /// `.` — the current range-loop value; only valid inside a `range` body.
    Current,
}

/// An operand to a comparison: a field reference, a string literal, or a
/// `len` of a field reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// A field reference.
    Field(FieldPath),
    /// A quoted string literal.
    Literal(String),
    /// `len FIELD` — the decimal length of the resolved field value.
    Len(FieldPath),
}

/// The condition of an `{{if ...}}` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cond {
    /// Bare field reference: true when the resolved value is non-empty.
    Truthy(FieldPath),
    /// `eq A B`.
    Eq(Operand, Operand),
    /// `ne A B`.
    Ne(Operand, Operand),
}

/// What a `{{ ... }}` print tag evaluates to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrintExpr {
    /// Bare field reference.
    Field(FieldPath),
    /// `len FIELD`.
    Len(FieldPath),
    /// `default FIELD "fallback"` — the field's value, or `fallback` if
    /// the field resolves to an empty string.
    Default(FieldPath, String),
}

/// One node of a parsed template body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Literal text, copied through unchanged.
    Text(String),
    /// `{{ EXPR }}`.
    Print(PrintExpr),
    /// `{{if COND}} then {{else}} els {{end}}`.
    If {
        /// The branch condition.
        cond: Cond,
        /// Rendered when `cond` is true.
        then: Vec<Node>,
        /// Rendered when `cond` is false, if an `{{else}}` clause is present.
        els: Option<Vec<Node>>,
    },
    /// `{{range FIELD}} body {{end}}` — iterates the comma-separated
    /// elements of the field's resolved value, binding each element as the
    /// current-value field (`.`) within `body`.
    Range {
        /// Field whose value is split on `,` to iterate.
        field: FieldPath,
        /// Body rendered once per element.
        body: Vec<Node>,
    },
}
