//! Filter tokenizer
//!
//! Classifies the raw filter arguments into tokens: ID sequences,
//! UUIDs, tags, attribute clauses with modifiers, bare-word searches,
//! `/regex/` patterns, and algebraic expressions (any argument opening
//! with a parenthesis is sub-lexed into operators and atoms).

use std::str::FromStr;

use uuid::Uuid;

use crate::error::QueryError;
use crate::nibbler::Nibbler;

/// Attribute modifiers. Positive modifiers pass when the comparison
/// holds; negative modifiers invert it (and invert the quantifier over
/// annotations when filtering descriptions).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    Is,
    Isnt,
    Has,
    Hasnt,
    Startswith,
    Endswith,
    Word,
    Noword,
    Before,
    After,
    Under,
    Over,
    Above,
    Below,
    None,
    Any,
}

impl Modifier {
    pub fn is_negative(&self) -> bool {
        matches!(
            self,
            Modifier::Isnt | Modifier::Hasnt | Modifier::Noword | Modifier::None
        )
    }
}

impl FromStr for Modifier {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "is" => Ok(Modifier::Is),
            "isnt" => Ok(Modifier::Isnt),
            "has" => Ok(Modifier::Has),
            "hasnt" => Ok(Modifier::Hasnt),
            "startswith" => Ok(Modifier::Startswith),
            "endswith" => Ok(Modifier::Endswith),
            "word" => Ok(Modifier::Word),
            "noword" => Ok(Modifier::Noword),
            "before" => Ok(Modifier::Before),
            "after" => Ok(Modifier::After),
            "under" => Ok(Modifier::Under),
            "over" => Ok(Modifier::Over),
            "above" => Ok(Modifier::Above),
            "below" => Ok(Modifier::Below),
            "none" => Ok(Modifier::None),
            "any" => Ok(Modifier::Any),
            _ => Err(()),
        }
    }
}

/// One element of an ID/UUID sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    Id(u32),
    IdRange(u32, u32),
    Uuid(Uuid),
}

/// Operators usable inside algebraic expressions (and the word forms
/// usable anywhere).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    And,
    Or,
    Xor,
    Not,
    Lt,
    Le,
    Eq,
    Ne,
    Ge,
    Gt,
    Add,
    Sub,
    Mul,
    Div,
    Match,
    NoMatch,
}

impl Op {
    /// Shunting-yard precedence: `! ~` > `* /` > `+ -` > relational >
    /// `and` > `xor` > `or`.
    pub fn precedence(&self) -> u8 {
        match self {
            Op::Not | Op::Match | Op::NoMatch => 7,
            Op::Mul | Op::Div => 6,
            Op::Add | Op::Sub => 5,
            Op::Lt | Op::Le | Op::Eq | Op::Ne | Op::Ge | Op::Gt => 4,
            Op::And => 3,
            Op::Xor => 2,
            Op::Or => 1,
        }
    }

    pub fn is_unary(&self) -> bool {
        matches!(self, Op::Not)
    }
}

/// A classified filter token, tagged with the index of the argument it
/// came from for error reporting.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// ID/UUID whitelist element(s), e.g. `1,3-5,7`.
    Sequence(Vec<Selector>),
    /// `+tag`
    TagPlus(String),
    /// `-tag`
    TagMinus(String),
    /// `name[.modifier]:value`
    Attr {
        name: String,
        modifier: Option<Modifier>,
        value: String,
    },
    /// Bare word: substring search over description and annotations.
    Word(String),
    /// `/pattern/`: regex over the description.
    Regex(String),
    /// Quoted or slash-delimited literal inside an expression.
    Literal(String),
    /// Unresolved identifier/number inside an expression; resolution
    /// happens at evaluation time against the task and DOM.
    Atom(String),
    Operator(Op),
    OpenParen,
    CloseParen,
}

/// Tokenize the filter arguments.
pub fn tokenize(args: &[String]) -> Result<Vec<(Token, usize)>, QueryError> {
    let mut tokens = Vec::new();
    for (index, arg) in args.iter().enumerate() {
        classify(arg, index, &mut tokens)?;
    }
    Ok(tokens)
}

fn classify(
    arg: &str,
    index: usize,
    tokens: &mut Vec<(Token, usize)>,
) -> Result<(), QueryError> {
    if arg.is_empty() {
        return Ok(());
    }

    // Algebraic expression
    if arg.starts_with('(') {
        return sublex(arg, index, tokens);
    }

    // Word operators are usable between any clauses.
    if let Some(op) = word_operator(arg) {
        tokens.push((Token::Operator(op), index));
        return Ok(());
    }

    // Tags
    if let Some(tag) = arg.strip_prefix('+') {
        if !tag.is_empty() && !tag.contains(char::is_whitespace) {
            tokens.push((Token::TagPlus(tag.to_string()), index));
            return Ok(());
        }
    }
    if let Some(tag) = arg.strip_prefix('-') {
        if !tag.is_empty()
            && !tag.contains(char::is_whitespace)
            && !tag.bytes().all(|b| b.is_ascii_digit())
        {
            tokens.push((Token::TagMinus(tag.to_string()), index));
            return Ok(());
        }
    }

    // Regex
    if arg.len() >= 2 && arg.starts_with('/') && arg.ends_with('/') {
        tokens.push((Token::Regex(arg[1..arg.len() - 1].to_string()), index));
        return Ok(());
    }

    // ID / UUID sequences
    if let Some(selectors) = try_sequence(arg, index)? {
        tokens.push((Token::Sequence(selectors), index));
        return Ok(());
    }

    // Attribute clause
    if let Some(token) = try_attribute(arg, index)? {
        tokens.push((token, index));
        return Ok(());
    }

    // Anything left is a substring search.
    tokens.push((Token::Word(arg.to_string()), index));
    Ok(())
}

fn word_operator(word: &str) -> Option<Op> {
    match word {
        "and" => Some(Op::And),
        "or" => Some(Op::Or),
        "xor" => Some(Op::Xor),
        "not" => Some(Op::Not),
        _ => None,
    }
}

/// Try to read the argument as a comma-separated list of IDs, ID
/// ranges and UUIDs. Returns Ok(None) when the argument is not
/// sequence-shaped at all; a malformed range inside a sequence-shaped
/// argument is an error, not a fallback.
fn try_sequence(arg: &str, index: usize) -> Result<Option<Vec<Selector>>, QueryError> {
    let shaped = arg
        .bytes()
        .all(|b| b.is_ascii_hexdigit() || b == b'-' || b == b',');
    if !shaped {
        return Ok(None);
    }

    let mut selectors = Vec::new();
    for element in arg.split(',') {
        if element.is_empty() {
            return Ok(None);
        }
        if let Ok(uuid) = Uuid::parse_str(element) {
            selectors.push(Selector::Uuid(uuid));
            continue;
        }
        if let Some((low, high)) = element.split_once('-') {
            let (Ok(low), Ok(high)) = (low.parse::<u32>(), high.parse::<u32>()) else {
                return Ok(None);
            };
            if high < low {
                return Err(QueryError::MalformedRange {
                    range: arg.to_string(),
                    index,
                });
            }
            selectors.push(Selector::IdRange(low, high));
            continue;
        }
        let Ok(id) = element.parse::<u32>() else {
            return Ok(None);
        };
        selectors.push(Selector::Id(id));
    }
    Ok(Some(selectors))
}

/// Try to read the argument as `name[.modifier]:value`.
fn try_attribute(arg: &str, index: usize) -> Result<Option<Token>, QueryError> {
    let Some((spec, value)) = arg.split_once(':') else {
        return Ok(None);
    };
    if spec.is_empty() {
        return Ok(None);
    }

    let (name, modifier_text) = match spec.split_once('.') {
        Some((name, modifier)) => (name, Some(modifier)),
        None => (spec, None),
    };

    if !is_identifier(name) {
        return Ok(None);
    }

    let modifier = match modifier_text {
        None => None,
        Some(text) => Some(Modifier::from_str(text).map_err(|_| {
            QueryError::UnknownModifier {
                modifier: text.to_string(),
                index,
            }
        })?),
    };

    Ok(Some(Token::Attr {
        name: name.to_string(),
        modifier,
        value: value.to_string(),
    }))
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Sub-lex a parenthesized expression into operators, literals and
/// atoms.
fn sublex(
    expression: &str,
    index: usize,
    tokens: &mut Vec<(Token, usize)>,
) -> Result<(), QueryError> {
    let mut n = Nibbler::new(expression);

    while !n.depleted() {
        n.skip_ws();
        if n.depleted() {
            break;
        }

        if n.skip('(') {
            tokens.push((Token::OpenParen, index));
        } else if n.skip(')') {
            tokens.push((Token::CloseParen, index));
        } else if n.get_literal("<=") {
            tokens.push((Token::Operator(Op::Le), index));
        } else if n.get_literal(">=") {
            tokens.push((Token::Operator(Op::Ge), index));
        } else if n.get_literal("!=") {
            tokens.push((Token::Operator(Op::Ne), index));
        } else if n.get_literal("!~") {
            tokens.push((Token::Operator(Op::NoMatch), index));
        } else if n.skip('<') {
            tokens.push((Token::Operator(Op::Lt), index));
        } else if n.skip('>') {
            tokens.push((Token::Operator(Op::Gt), index));
        } else if n.skip('=') {
            tokens.push((Token::Operator(Op::Eq), index));
        } else if n.skip('~') {
            tokens.push((Token::Operator(Op::Match), index));
        } else if n.skip('!') {
            tokens.push((Token::Operator(Op::Not), index));
        } else if n.skip('+') {
            tokens.push((Token::Operator(Op::Add), index));
        } else if n.skip('-') {
            tokens.push((Token::Operator(Op::Sub), index));
        } else if n.skip('*') {
            tokens.push((Token::Operator(Op::Mul), index));
        } else if n.skip('/') {
            // A leading slash is a regex literal when it closes; a
            // division otherwise.
            n.save();
            if let Some(pattern) = n.get_until('/') {
                if n.skip('/') {
                    tokens.push((Token::Literal(pattern), index));
                    continue;
                }
            }
            n.restore();
            tokens.push((Token::Operator(Op::Div), index));
        } else if let Some(text) = n.get_quoted('"', true) {
            tokens.push((Token::Literal(text), index));
        } else if let Some(text) = n.get_quoted('\'', true) {
            tokens.push((Token::Literal(text), index));
        } else if let Some(atom) = n.get_until_one_of(" \t()<>=!~+-*/'\"") {
            if atom.is_empty() {
                // An unexpected character the grammar has no rule for.
                return Err(QueryError::UnrecognizedToken {
                    token: expression.to_string(),
                    index,
                });
            }
            match word_operator(&atom) {
                Some(op) => tokens.push((Token::Operator(op), index)),
                None => tokens.push((Token::Atom(atom), index)),
            }
        }
    }
    Ok(())
}
