//! Filter compilation
//!
//! Builds a postfix program from the token stream. Adjacent clauses get
//! an implicit `and` between them; explicit operators and parentheses
//! follow the precedence ladder via shunting-yard. The result is a flat
//! node list the evaluator folds over each task.

use regex::Regex;

use crate::error::QueryError;
use crate::expr::lexer::{tokenize, Modifier, Op, Selector, Token};

/// One node of the compiled postfix program.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// ID/UUID whitelist clause.
    Sequence(Vec<Selector>),
    TagPresent(String),
    TagAbsent(String),
    Attr {
        name: String,
        modifier: Option<Modifier>,
        value: String,
    },
    /// Substring search over description and annotations.
    Word(String),
    /// Regex over the description.
    Regex(String),
    /// Quoted literal inside an expression.
    Constant(String),
    /// Late-bound identifier inside an expression.
    DomRef(String),
    BinOp(Op),
    UnOp(Op),
}

impl Node {
    fn is_operand(&self) -> bool {
        !matches!(self, Node::BinOp(_) | Node::UnOp(_))
    }
}

/// A compiled filter.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Filter {
    postfix: Vec<Node>,
    /// Set when the filter consists solely of sequence clauses, which
    /// lets the loader treat it as a plain ID whitelist.
    sequence: Option<Vec<Selector>>,
}

impl Filter {
    /// Compile filter arguments into a postfix program.
    pub fn parse(args: &[String]) -> Result<Self, QueryError> {
        let tokens = tokenize(args)?;

        // Sequence fast path: every token is an ID/UUID clause.
        let all_sequences = !tokens.is_empty()
            && tokens
                .iter()
                .all(|(t, _)| matches!(t, Token::Sequence(_)));
        let sequence = all_sequences.then(|| {
            tokens
                .iter()
                .flat_map(|(t, _)| match t {
                    Token::Sequence(selectors) => selectors.clone(),
                    _ => Vec::new(),
                })
                .collect()
        });

        let postfix = to_postfix(&tokens)?;
        Ok(Self { postfix, sequence })
    }

    /// An empty filter matches every task.
    pub fn is_empty(&self) -> bool {
        self.postfix.is_empty()
    }

    /// The whitelist, when this is a sequence-only filter.
    pub fn sequence(&self) -> Option<&[Selector]> {
        self.sequence.as_deref()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.postfix
    }
}

fn operand_node(token: &Token) -> Result<Option<Node>, QueryError> {
    let node = match token {
        Token::Sequence(selectors) => Node::Sequence(selectors.clone()),
        Token::TagPlus(tag) => Node::TagPresent(tag.clone()),
        Token::TagMinus(tag) => Node::TagAbsent(tag.clone()),
        Token::Attr {
            name,
            modifier,
            value,
        } => Node::Attr {
            name: name.clone(),
            modifier: *modifier,
            value: value.clone(),
        },
        Token::Word(word) => Node::Word(word.clone()),
        Token::Regex(pattern) => {
            // Validate the pattern at compile time.
            Regex::new(pattern).map_err(|e| QueryError::BadRegex {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
            Node::Regex(pattern.clone())
        }
        Token::Literal(text) => Node::Constant(text.clone()),
        Token::Atom(text) => Node::DomRef(text.clone()),
        Token::Operator(_) | Token::OpenParen | Token::CloseParen => return Ok(None),
    };
    Ok(Some(node))
}

/// Shunting-yard conversion with implicit `and` insertion.
fn to_postfix(tokens: &[(Token, usize)]) -> Result<Vec<Node>, QueryError> {
    #[derive(Debug, Clone, Copy, PartialEq)]
    enum StackItem {
        Op(Op),
        Paren,
    }

    let mut output: Vec<Node> = Vec::new();
    let mut stack: Vec<StackItem> = Vec::new();
    // True when the previous token completed an operand, meaning a new
    // operand (or open paren, or unary not) needs a joining `and`.
    let mut after_operand = false;

    let push_op = |op: Op, stack: &mut Vec<StackItem>, output: &mut Vec<Node>| {
        while let Some(StackItem::Op(top)) = stack.last() {
            let pop = if op.is_unary() {
                top.precedence() > op.precedence()
            } else {
                top.precedence() >= op.precedence()
            };
            if !pop {
                break;
            }
            let top = *top;
            stack.pop();
            output.push(if top.is_unary() {
                Node::UnOp(top)
            } else {
                Node::BinOp(top)
            });
        }
        stack.push(StackItem::Op(op));
    };

    for (token, _index) in tokens {
        match token {
            Token::Operator(op) => {
                if after_operand && op.is_unary() {
                    push_op(Op::And, &mut stack, &mut output);
                }
                push_op(*op, &mut stack, &mut output);
                after_operand = false;
            }
            Token::OpenParen => {
                if after_operand {
                    push_op(Op::And, &mut stack, &mut output);
                }
                stack.push(StackItem::Paren);
                after_operand = false;
            }
            Token::CloseParen => {
                loop {
                    match stack.pop() {
                        Some(StackItem::Op(op)) => output.push(if op.is_unary() {
                            Node::UnOp(op)
                        } else {
                            Node::BinOp(op)
                        }),
                        Some(StackItem::Paren) => break,
                        None => return Err(QueryError::UnbalancedParens),
                    }
                }
                after_operand = true;
            }
            operand => {
                if after_operand {
                    push_op(Op::And, &mut stack, &mut output);
                }
                if let Some(node) = operand_node(operand)? {
                    output.push(node);
                }
                after_operand = true;
            }
        }
    }

    while let Some(item) = stack.pop() {
        match item {
            StackItem::Op(op) => output.push(if op.is_unary() {
                Node::UnOp(op)
            } else {
                Node::BinOp(op)
            }),
            StackItem::Paren => return Err(QueryError::UnbalancedParens),
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_filter() {
        let filter = Filter::parse(&[]).unwrap();
        assert!(filter.is_empty());
        assert!(filter.sequence().is_none());
    }

    #[test]
    fn implicit_and_between_clauses() {
        let filter = Filter::parse(&args(&["+home", "project:Garden"])).unwrap();
        assert_eq!(filter.nodes().len(), 3);
        assert_eq!(filter.nodes()[2], Node::BinOp(Op::And));
    }

    #[test]
    fn sequence_only_detection() {
        let filter = Filter::parse(&args(&["1,3-5", "7"])).unwrap();
        let sequence = filter.sequence().unwrap();
        assert_eq!(sequence.len(), 3);

        let mixed = Filter::parse(&args(&["1,3", "+home"])).unwrap();
        assert!(mixed.sequence().is_none());
    }

    #[test]
    fn explicit_or_beats_implicit_and() {
        // a or b c  parses as  (a or b) and c ... with precedence and >
        // or, shunting-yard yields a b c and or: or applied last? No:
        // and binds tighter, so c joins b first in the output program.
        let filter = Filter::parse(&args(&["+a", "or", "+b", "+c"])).unwrap();
        let nodes = filter.nodes();
        assert_eq!(
            nodes,
            &[
                Node::TagPresent("a".to_string()),
                Node::TagPresent("b".to_string()),
                Node::TagPresent("c".to_string()),
                Node::BinOp(Op::And),
                Node::BinOp(Op::Or),
            ]
        );
    }

    #[test]
    fn parenthesized_expression_compiles() {
        let filter = Filter::parse(&args(&["(due<eom or priority=H)"])).unwrap();
        let nodes = filter.nodes();
        assert_eq!(
            nodes,
            &[
                Node::DomRef("due".to_string()),
                Node::DomRef("eom".to_string()),
                Node::BinOp(Op::Lt),
                Node::DomRef("priority".to_string()),
                Node::DomRef("H".to_string()),
                Node::BinOp(Op::Eq),
                Node::BinOp(Op::Or),
            ]
        );
    }

    #[test]
    fn unbalanced_parens_rejected() {
        assert_matches!(
            Filter::parse(&args(&["(due<eom"])),
            Err(QueryError::UnbalancedParens)
        );
        assert_matches!(
            Filter::parse(&args(&["(due<eom))"])),
            Err(QueryError::UnbalancedParens)
        );
    }

    #[test]
    fn bad_regex_rejected_at_compile_time() {
        assert_matches!(
            Filter::parse(&args(&["/[unclosed/"])),
            Err(QueryError::BadRegex { .. })
        );
    }

    #[test]
    fn unary_not() {
        let filter = Filter::parse(&args(&["not", "+home"])).unwrap();
        assert_eq!(
            filter.nodes(),
            &[
                Node::TagPresent("home".to_string()),
                Node::UnOp(Op::Not),
            ]
        );
    }
}
