//! Search filters parsed from query parameters such as `amount=>=100`.

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Gt,
    Ge,
    Lt,
    Le,
    Ne,
}

impl Operator {
    pub fn as_sql(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Ne => "!=",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Two-character prefixes first so `>=` is not read as `>`.
const PREFIXES: [(&str, Operator); 5] = [
    (">=", Operator::Ge),
    ("<=", Operator::Le),
    ("!=", Operator::Ne),
    (">", Operator::Gt),
    ("<", Operator::Lt),
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterExpression {
    pub column: String,
    pub operator: Operator,
    /// Value with the operator prefix removed.
    pub raw_value: String,
}

impl FilterExpression {
    pub fn parse(column: &str, raw: &str) -> Self {
        let (operator, value) = PREFIXES
            .iter()
            .find_map(|(prefix, op)| raw.strip_prefix(prefix).map(|rest| (*op, rest)))
            .unwrap_or((Operator::Eq, raw));
        FilterExpression {
            column: column.to_string(),
            operator,
            raw_value: value.to_string(),
        }
    }
}

/// One expression per (column, value) pair; repeated columns yield several expressions.
pub fn parse_filters(params: &[(String, String)]) -> Vec<FilterExpression> {
    params
        .iter()
        .map(|(column, raw)| FilterExpression::parse(column, raw))
        .collect()
}
