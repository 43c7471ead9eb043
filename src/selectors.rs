//! Vector selector extraction from PromQL expressions.
//!
//! The expression is parsed with `promql-parser` and walked depth-first.
//! Every vector selector is rendered into a canonical string: the metric
//! name followed by its label matchers sorted by name, operator and value.
//! Offsets and `@` modifiers are dropped since probes always run at "now".

use crate::error::{Error, Result};
use promql_parser::label::{MatchOp, Matcher};
use promql_parser::parser::{self, Expr, VectorSelector};

const METRIC_NAME_LABEL: &str = "__name__";

#[derive(Debug, Clone, PartialEq, Eq)]
/// A vector selector referenced by an expression.
pub struct Selector {
    text: String,
    metric_name: Option<String>,
}

impl Selector {
    /// Canonical selector text, e.g. `up{job="node"}`.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Metric name from the selector name or its `__name__` matcher.
    pub fn metric_name(&self) -> Option<&str> {
        self.metric_name.as_deref()
    }

    fn from_vector_selector(vs: &VectorSelector) -> Self {
        let plain = &vs.matchers.matchers;
        let alternatives = &vs.matchers.or_matchers;
        // `{__name__="up"}` prints as `up`; alternatives each carry their own name
        let name = vs.name.clone().filter(|n| !n.is_empty()).or_else(|| {
            plain
                .iter()
                .find(|m| m.name == METRIC_NAME_LABEL && matches!(m.op, MatchOp::Equal))
                .map(|m| m.value.clone())
        });

        let mut text = name.clone().unwrap_or_default();
        if alternatives.is_empty() {
            let rendered = render_matchers(plain, name.as_deref());
            if !rendered.is_empty() {
                text.push('{');
                text.push_str(&rendered);
                text.push('}');
            }
        } else {
            let rendered: Vec<String> = alternatives
                .iter()
                .map(|alt| render_matchers(alt, name.as_deref()))
                .collect();
            text.push('{');
            text.push_str(&rendered.join(" or "));
            text.push('}');
        }

        let metric_name = name.or_else(|| {
            plain
                .iter()
                .chain(alternatives.iter().flatten())
                .find(|m| m.name == METRIC_NAME_LABEL)
                .map(|m| m.value.clone())
        });
        Selector { text, metric_name }
    }
}

/// Sorted `label<op>"value"` list, without the matcher already printed as the name.
fn render_matchers(matchers: &[Matcher], name: Option<&str>) -> String {
    let mut kept: Vec<&Matcher> = matchers
        .iter()
        .filter(|m| {
            !(m.name == METRIC_NAME_LABEL
                && matches!(m.op, MatchOp::Equal)
                && Some(m.value.as_str()) == name)
        })
        .collect();
    kept.sort_by(|a, b| {
        a.name
            .cmp(&b.name)
            .then(op_str(&a.op).cmp(op_str(&b.op)))
            .then(a.value.cmp(&b.value))
    });
    kept.iter()
        .map(|m| format!("{}{}{}", m.name, op_str(&m.op), quote_value(&m.value)))
        .collect::<Vec<_>>()
        .join(",")
}

/// Double-quote a matcher value as it appeared in the source.
///
/// The parser keeps escape sequences verbatim, so only bare `"` (possible in
/// single-quoted or backtick strings) needs escaping.
fn quote_value(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    out.push('"');
    let mut escaped = false;
    for c in raw.chars() {
        if c == '"' && !escaped {
            out.push('\\');
        }
        escaped = c == '\\' && !escaped;
        out.push(c);
    }
    out.push('"');
    out
}

fn op_str(op: &MatchOp) -> &'static str {
    match op {
        MatchOp::Equal => "=",
        MatchOp::NotEqual => "!=",
        MatchOp::Re(_) => "=~",
        MatchOp::NotRe(_) => "!~",
    }
}

/// Parse `expression` and return its vector selectors in traversal order.
///
/// Duplicates are kept: `up == 1 and up` yields `up` twice.
pub fn extract_selectors(expression: &str) -> Result<Vec<Selector>> {
    let expr = parser::parse(expression).map_err(|e| Error::Parse(format!("{e:?}")))?;
    let mut selectors = Vec::new();
    collect_selectors(&expr, &mut selectors);
    Ok(selectors)
}

fn collect_selectors(expr: &Expr, out: &mut Vec<Selector>) {
    match expr {
        Expr::VectorSelector(vs) => out.push(Selector::from_vector_selector(vs)),
        Expr::MatrixSelector(ms) => out.push(Selector::from_vector_selector(&ms.vs)),
        Expr::Call(call) => {
            for arg in &call.args.args {
                collect_selectors(arg, out);
            }
        }
        Expr::Aggregate(agg) => {
            if let Some(param) = &agg.param {
                collect_selectors(param, out);
            }
            collect_selectors(&agg.expr, out);
        }
        Expr::Binary(bin) => {
            collect_selectors(&bin.lhs, out);
            collect_selectors(&bin.rhs, out);
        }
        Expr::Paren(paren) => collect_selectors(&paren.expr, out),
        Expr::Unary(unary) => collect_selectors(&unary.expr, out),
        Expr::Subquery(sq) => collect_selectors(&sq.expr, out),
        Expr::Extension(_) | Expr::NumberLiteral(_) | Expr::StringLiteral(_) => {}
    }
}
