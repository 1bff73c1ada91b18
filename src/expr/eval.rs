//! Filter evaluation
//!
//! Folds a compiled postfix program over one task. Operands push typed
//! variants onto a stack; operators pop and combine them. Identifiers
//! resolve late: first as task attributes, then as virtual attributes
//! (`id`, `tags.count`), then `rc.<key>` configuration, then dates and
//! durations, and finally as plain text.

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::config::Configuration;
use crate::date::{DateParser, DateParsing};
use crate::duration::Duration;
use crate::error::QueryError;
use crate::expr::lexer::{Modifier, Op, Selector};
use crate::expr::parser::{Filter, Node};
use crate::task::{Task, DATE_ATTRIBUTES};

/// Everything evaluation needs besides the task itself. `now` is the
/// invocation clock; the parser carries dateformat and weekstart.
pub struct EvalContext<'a> {
    pub now: DateTime<Utc>,
    pub parser: &'a DateParser,
    pub config: &'a Configuration,
}

/// A value on the evaluation stack.
#[derive(Debug, Clone, PartialEq)]
enum Variant {
    Bool(bool),
    Number(f64),
    Text(String),
    Date(DateTime<Utc>),
    Duration(i64),
}

impl Variant {
    fn truthy(&self) -> bool {
        match self {
            Variant::Bool(b) => *b,
            Variant::Number(n) => *n != 0.0,
            Variant::Text(s) => !s.is_empty(),
            Variant::Date(_) => true,
            Variant::Duration(d) => *d != 0,
        }
    }

    fn text(&self) -> String {
        match self {
            Variant::Bool(b) => b.to_string(),
            Variant::Number(n) => n.to_string(),
            Variant::Text(s) => s.clone(),
            Variant::Date(d) => d.timestamp().to_string(),
            Variant::Duration(d) => d.to_string(),
        }
    }
}

/// The semantic type an attribute's values carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Date,
    Duration,
    Numeric,
    Text,
}

fn attribute_kind(name: &str, config: &Configuration) -> Kind {
    if DATE_ATTRIBUTES.contains(&name) {
        return Kind::Date;
    }
    match name {
        "imask" | "urgency" => Kind::Numeric,
        "recur" => Kind::Duration,
        _ => match config.get(&format!("uda.{name}.type")).map(|t| t.as_str()) {
            Some("date") => Kind::Date,
            Some("duration") => Kind::Duration,
            Some("numeric") => Kind::Numeric,
            _ => Kind::Text,
        },
    }
}

impl Filter {
    /// Evaluate this filter against one task. An empty filter matches
    /// everything.
    pub fn matches(&self, task: &Task, ctx: &EvalContext) -> Result<bool, QueryError> {
        if self.is_empty() {
            return Ok(true);
        }

        let mut stack: Vec<Variant> = Vec::new();
        for node in self.nodes() {
            match node {
                Node::Sequence(selectors) => {
                    stack.push(Variant::Bool(sequence_matches(selectors, task)));
                }
                Node::TagPresent(tag) => stack.push(Variant::Bool(task.has_tag(tag))),
                Node::TagAbsent(tag) => stack.push(Variant::Bool(!task.has_tag(tag))),
                Node::Word(word) => stack.push(Variant::Bool(word_search(task, word))),
                Node::Regex(pattern) => {
                    let regex = compile(pattern)?;
                    stack.push(Variant::Bool(regex.is_match(task.description())));
                }
                Node::Attr {
                    name,
                    modifier,
                    value,
                } => stack.push(Variant::Bool(attr_matches(
                    task, name, *modifier, value, ctx,
                ))),
                Node::Constant(text) => stack.push(Variant::Text(text.clone())),
                Node::DomRef(name) => stack.push(resolve_dom(name, task, ctx)),
                Node::UnOp(op) => {
                    let operand = pop(&mut stack, op)?;
                    stack.push(Variant::Bool(!operand.truthy()));
                }
                Node::BinOp(op) => {
                    let right = pop(&mut stack, op)?;
                    let left = pop(&mut stack, op)?;
                    stack.push(apply(*op, left, right, ctx)?);
                }
            }
        }

        match stack.len() {
            1 => Ok(stack[0].truthy()),
            _ => Err(QueryError::Evaluation {
                message: "filter did not reduce to a single value".to_string(),
            }),
        }
    }
}

fn pop(stack: &mut Vec<Variant>, op: &Op) -> Result<Variant, QueryError> {
    stack.pop().ok_or_else(|| QueryError::MissingOperand {
        operator: format!("{op:?}").to_lowercase(),
    })
}

fn compile(pattern: &str) -> Result<Regex, QueryError> {
    Regex::new(pattern).map_err(|e| QueryError::BadRegex {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

fn sequence_matches(selectors: &[Selector], task: &Task) -> bool {
    selectors.iter().any(|selector| match selector {
        Selector::Id(id) => task.id() == *id,
        Selector::IdRange(low, high) => (*low..=*high).contains(&task.id()),
        Selector::Uuid(uuid) => task.uuid() == Some(*uuid),
    })
}

/// Bare-word search: description or any annotation contains the word.
fn word_search(task: &Task, word: &str) -> bool {
    if task.description().contains(word) {
        return true;
    }
    task.annotations()
        .iter()
        .any(|a| a.description.contains(word))
}

/// Resolve an expression identifier against the task and the DOM.
fn resolve_dom(name: &str, task: &Task, ctx: &EvalContext) -> Variant {
    // Numeric literal
    if let Ok(number) = name.parse::<f64>() {
        return Variant::Number(number);
    }

    // Virtual attributes
    match name {
        "id" => return Variant::Number(task.id() as f64),
        "tags.count" => return Variant::Number(task.tag_count() as f64),
        "annotations.count" => return Variant::Number(task.annotation_count() as f64),
        _ => {}
    }

    // Task attribute, typed by its declared kind
    if let Some(value) = task.get(name) {
        return match attribute_kind(name, ctx.config) {
            Kind::Date => task
                .get_date(name)
                .map(Variant::Date)
                .unwrap_or_else(|| Variant::Text(value.to_string())),
            Kind::Duration => Duration::parse(value)
                .map(|d| Variant::Duration(d.seconds()))
                .unwrap_or_else(|_| Variant::Text(value.to_string())),
            Kind::Numeric => value
                .parse()
                .map(Variant::Number)
                .unwrap_or_else(|_| Variant::Text(value.to_string())),
            Kind::Text => Variant::Text(value.to_string()),
        };
    }
    // An absent attribute with a known name is empty, not a date word.
    if crate::task::RESERVED_ATTRIBUTES.contains(&name) {
        return Variant::Text(String::new());
    }

    // Configuration
    if let Some(key) = name.strip_prefix("rc.") {
        return Variant::Text(ctx.config.get_or(key, ""));
    }

    // Named dates and durations
    if let Ok(date) = ctx.parser.parse_synonym(name, ctx.now) {
        return Variant::Date(date);
    }
    if name.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '+') {
        if let Ok(duration) = Duration::parse(name) {
            return Variant::Duration(duration.seconds());
        }
    }

    Variant::Text(name.to_string())
}

/// Apply a binary operator.
fn apply(op: Op, left: Variant, right: Variant, ctx: &EvalContext) -> Result<Variant, QueryError> {
    match op {
        Op::And => Ok(Variant::Bool(left.truthy() && right.truthy())),
        Op::Or => Ok(Variant::Bool(left.truthy() || right.truthy())),
        Op::Xor => Ok(Variant::Bool(left.truthy() ^ right.truthy())),
        Op::Not => Ok(Variant::Bool(!right.truthy())),

        Op::Lt | Op::Le | Op::Eq | Op::Ne | Op::Ge | Op::Gt => {
            let ordering = compare(&left, &right, ctx);
            let result = match op {
                Op::Lt => ordering == std::cmp::Ordering::Less,
                Op::Le => ordering != std::cmp::Ordering::Greater,
                Op::Eq => ordering == std::cmp::Ordering::Equal,
                Op::Ne => ordering != std::cmp::Ordering::Equal,
                Op::Ge => ordering != std::cmp::Ordering::Less,
                Op::Gt => ordering == std::cmp::Ordering::Greater,
                _ => unreachable!(),
            };
            Ok(Variant::Bool(result))
        }

        Op::Add | Op::Sub => arithmetic(op, left, right),

        Op::Mul | Op::Div => {
            let (Some(l), Some(r)) = (as_number(&left), as_number(&right)) else {
                return Err(QueryError::Evaluation {
                    message: "multiplicative operators need numeric operands".to_string(),
                });
            };
            if op == Op::Div {
                if r == 0.0 {
                    return Err(QueryError::Evaluation {
                        message: "division by zero".to_string(),
                    });
                }
                Ok(Variant::Number(l / r))
            } else {
                Ok(Variant::Number(l * r))
            }
        }

        Op::Match | Op::NoMatch => {
            let regex = compile(&right.text())?;
            let matched = regex.is_match(&left.text());
            Ok(Variant::Bool(if op == Op::Match {
                matched
            } else {
                !matched
            }))
        }
    }
}

/// Compare with coercion: dates dominate, then numbers, then durations,
/// then plain string ordering.
fn compare(left: &Variant, right: &Variant, ctx: &EvalContext) -> std::cmp::Ordering {
    if let (Some(l), Some(r)) = (as_date(left, ctx), as_date(right, ctx)) {
        if matches!(left, Variant::Date(_)) || matches!(right, Variant::Date(_)) {
            return l.cmp(&r);
        }
    }
    if matches!(left, Variant::Number(_)) || matches!(right, Variant::Number(_)) {
        if let (Some(l), Some(r)) = (as_number(left), as_number(right)) {
            return l.partial_cmp(&r).unwrap_or(std::cmp::Ordering::Equal);
        }
    }
    if matches!(left, Variant::Duration(_)) || matches!(right, Variant::Duration(_)) {
        if let (Some(l), Some(r)) = (as_duration(left), as_duration(right)) {
            return l.cmp(&r);
        }
    }
    left.text().cmp(&right.text())
}

fn arithmetic(op: Op, left: Variant, right: Variant) -> Result<Variant, QueryError> {
    let sign = if op == Op::Sub { -1 } else { 1 };
    match (&left, &right) {
        (Variant::Date(l), Variant::Date(r)) if op == Op::Sub => {
            Ok(Variant::Duration((*l - *r).num_seconds()))
        }
        (Variant::Date(l), Variant::Duration(r)) => {
            Ok(Variant::Date(*l + chrono::Duration::seconds(sign * r)))
        }
        (Variant::Date(l), Variant::Number(r)) => Ok(Variant::Date(
            *l + chrono::Duration::seconds(sign * *r as i64),
        )),
        (Variant::Duration(l), Variant::Duration(r)) => Ok(Variant::Duration(l + sign * r)),
        _ => {
            let (Some(l), Some(r)) = (as_number(&left), as_number(&right)) else {
                return Err(QueryError::Evaluation {
                    message: "additive operators need numeric, date or duration operands"
                        .to_string(),
                });
            };
            Ok(Variant::Number(l + sign as f64 * r))
        }
    }
}

fn as_number(v: &Variant) -> Option<f64> {
    match v {
        Variant::Number(n) => Some(*n),
        Variant::Text(s) => s.parse().ok(),
        Variant::Duration(d) => Some(*d as f64),
        Variant::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Variant::Date(_) => None,
    }
}

fn as_date(v: &Variant, ctx: &EvalContext) -> Option<DateTime<Utc>> {
    match v {
        Variant::Date(d) => Some(*d),
        Variant::Number(n) => crate::date::from_epoch(*n as i64),
        Variant::Text(s) => ctx.parser.parse_date(s, ctx.now).ok(),
        _ => None,
    }
}

fn as_duration(v: &Variant) -> Option<i64> {
    match v {
        Variant::Duration(d) => Some(*d),
        Variant::Number(n) => Some(*n as i64),
        Variant::Text(s) => Duration::parse(s).ok().map(|d| d.seconds()),
        _ => None,
    }
}

// -- Attribute clauses -------------------------------------------------------

/// Evaluate `name[.modifier]:value` against the task. Filtering on
/// `description` fans out over the annotations: positive modifiers
/// pass when description OR any annotation matches, negative modifiers
/// only when description AND every annotation pass.
fn attr_matches(
    task: &Task,
    name: &str,
    modifier: Option<Modifier>,
    target: &str,
    ctx: &EvalContext,
) -> bool {
    let kind = attribute_kind(name, ctx.config);

    if name == "description" {
        let annotations = task.annotations();
        let candidates: Vec<Option<String>> = std::iter::once(Some(task.description().to_string()))
            .chain(annotations.into_iter().map(|a| Some(a.description)))
            .collect();

        let negative = modifier.is_some_and(|m| m.is_negative());
        if negative {
            candidates
                .iter()
                .all(|c| candidate_matches(c.as_deref(), modifier, target, kind, ctx))
        } else {
            candidates
                .iter()
                .any(|c| candidate_matches(c.as_deref(), modifier, target, kind, ctx))
        }
    } else {
        candidate_matches(task.get(name), modifier, target, kind, ctx)
    }
}

fn candidate_matches(
    candidate: Option<&str>,
    modifier: Option<Modifier>,
    target: &str,
    kind: Kind,
    ctx: &EvalContext,
) -> bool {
    let Some(modifier) = modifier else {
        // No modifier: an empty target matches absence, anything else
        // is an exact (type-aware) match.
        if target.is_empty() {
            return candidate.is_none_or(|v| v.is_empty());
        }
        return candidate.is_some_and(|v| typed_eq(v, target, kind, ctx));
    };

    match modifier {
        Modifier::Is => candidate.is_some_and(|v| typed_eq(v, target, kind, ctx)),
        Modifier::Isnt => !candidate.is_some_and(|v| typed_eq(v, target, kind, ctx)),
        Modifier::Has => candidate.is_some_and(|v| v.contains(target)),
        Modifier::Hasnt => !candidate.is_some_and(|v| v.contains(target)),
        Modifier::Startswith => candidate.is_some_and(|v| v.starts_with(target)),
        Modifier::Endswith => candidate.is_some_and(|v| v.ends_with(target)),
        Modifier::Word => candidate.is_some_and(|v| contains_word(v, target)),
        Modifier::Noword => !candidate.is_some_and(|v| contains_word(v, target)),
        Modifier::Before => typed_less(candidate, target, kind, ctx),
        Modifier::After => typed_greater(candidate, target, kind, ctx),
        Modifier::Under | Modifier::Below => typed_less(candidate, target, kind, ctx),
        Modifier::Over | Modifier::Above => typed_greater(candidate, target, kind, ctx),
        Modifier::None => candidate.is_none_or(|v| v.is_empty()),
        Modifier::Any => candidate.is_some_and(|v| !v.is_empty()),
    }
}

fn typed_eq(value: &str, target: &str, kind: Kind, ctx: &EvalContext) -> bool {
    match kind {
        Kind::Date => match (parse_stored_date(value), ctx.parser.parse_date(target, ctx.now)) {
            (Some(v), Ok(t)) => v == t,
            _ => value == target,
        },
        Kind::Duration => match (Duration::parse(value), Duration::parse(target)) {
            (Ok(v), Ok(t)) => v == t,
            _ => value == target,
        },
        Kind::Numeric => match (value.parse::<f64>(), target.parse::<f64>()) {
            (Ok(v), Ok(t)) => v == t,
            _ => value == target,
        },
        Kind::Text => value == target,
    }
}

fn typed_less(candidate: Option<&str>, target: &str, kind: Kind, ctx: &EvalContext) -> bool {
    typed_ordering(candidate, target, kind, ctx)
        .is_some_and(|o| o == std::cmp::Ordering::Less)
}

fn typed_greater(candidate: Option<&str>, target: &str, kind: Kind, ctx: &EvalContext) -> bool {
    typed_ordering(candidate, target, kind, ctx)
        .is_some_and(|o| o == std::cmp::Ordering::Greater)
}

fn typed_ordering(
    candidate: Option<&str>,
    target: &str,
    kind: Kind,
    ctx: &EvalContext,
) -> Option<std::cmp::Ordering> {
    let value = candidate?;
    match kind {
        Kind::Date => {
            let v = parse_stored_date(value)?;
            let t = ctx.parser.parse_date(target, ctx.now).ok()?;
            Some(v.cmp(&t))
        }
        Kind::Duration => {
            let v = Duration::parse(value).ok()?;
            let t = Duration::parse(target).ok()?;
            Some(v.cmp(&t))
        }
        Kind::Numeric => {
            let v: f64 = value.parse().ok()?;
            let t: f64 = target.parse().ok()?;
            v.partial_cmp(&t)
        }
        Kind::Text => {
            // Numeric when both sides look numeric, else lexicographic.
            if let (Ok(v), Ok(t)) = (value.parse::<f64>(), target.parse::<f64>()) {
                v.partial_cmp(&t)
            } else {
                Some(value.cmp(target))
            }
        }
    }
}

/// Stored date attributes are epoch seconds.
fn parse_stored_date(value: &str) -> Option<DateTime<Utc>> {
    value.parse::<i64>().ok().and_then(crate::date::from_epoch)
}

/// Whole-word containment: the word appears delimited by non-alphanumerics.
fn contains_word(text: &str, word: &str) -> bool {
    if word.is_empty() {
        return false;
    }
    let mut start = 0;
    while let Some(pos) = text[start..].find(word) {
        let begin = start + pos;
        let end = begin + word.len();
        let left_ok = begin == 0
            || !text[..begin]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric());
        let right_ok = end >= text.len()
            || !text[end..].chars().next().is_some_and(|c| c.is_alphanumeric());
        if left_ok && right_ok {
            return true;
        }
        start = begin + word.len();
        if start >= text.len() {
            break;
        }
    }
    false
}
