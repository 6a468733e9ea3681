//! Query lexing and boolean evaluation.
//!
//! Boolean expressions are evaluated with two stacks (operand page sets and
//! pending operators). Precedence is OR < AND < NOT and equal precedence pops
//! before pushing, so chains associate to the left.

use crate::error::QueryError;
use crate::suggest::Suggester;
use crate::PageSet;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    LParen,
    RParen,
    And,
    Or,
    Not,
    Term(String),
    Phrase(String),
    /// A term written with a trailing `*`, awaiting expansion.
    Wildcard(String),
}

impl Token {
    pub fn is_operator(&self) -> bool {
        matches!(self, Token::And | Token::Or | Token::Not)
    }
}

/// Split a raw query into tokens, left to right.
///
/// Keywords are recognized only in upper case; "and" is an ordinary term.
/// A quote without a closing partner runs to the end of the input. Characters
/// that are neither word characters, quotes nor parentheses separate tokens.
pub fn lex(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();
    while let Some((start, ch)) = chars.next() {
        match ch {
            '(' => tokens.push(Token::LParen),
            ')' => tokens.push(Token::RParen),
            '"' => {
                let mut phrase = String::new();
                for (_, c) in chars.by_ref() {
                    if c == '"' {
                        break;
                    }
                    phrase.push(c);
                }
                let phrase = phrase.trim();
                if !phrase.is_empty() {
                    tokens.push(Token::Phrase(phrase.to_string()));
                }
            }
            c if is_word_char(c) => {
                let mut end = start + c.len_utf8();
                while let Some(&(i, next)) = chars.peek() {
                    if !is_word_char(next) {
                        break;
                    }
                    end = i + next.len_utf8();
                    chars.next();
                }
                let word = &input[start..end];
                if matches!(chars.peek(), Some(&(_, '*'))) {
                    chars.next();
                    tokens.push(Token::Wildcard(word.to_string()));
                    continue;
                }
                tokens.push(match word {
                    "AND" => Token::And,
                    "OR" => Token::Or,
                    "NOT" => Token::Not,
                    _ => Token::Term(word.to_string()),
                });
            }
            _ => {}
        }
    }
    tokens
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// True when the query uses AND, OR or NOT and must be evaluated as set algebra.
pub fn is_boolean(tokens: &[Token]) -> bool {
    tokens.iter().any(Token::is_operator)
}

/// Distinct terms and phrases in order of first appearance, keywords excluded.
///
/// Literals are matched case-insensitively, so repeats are detected on the
/// Unicode lowercase form.
pub fn literals(tokens: &[Token]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out: Vec<String> = Vec::new();
    for token in tokens {
        let text = match token {
            Token::Term(t) | Token::Phrase(t) | Token::Wildcard(t) => t,
            _ => continue,
        };
        if seen.insert(text.to_lowercase()) {
            out.push(text.clone());
        }
    }
    out
}

/// Replace wildcard tokens with their completions.
///
/// In boolean mode the completions become a parenthesized OR group so the
/// surrounding operators still see a single operand. A wildcard with no
/// completion falls back to its bare stem.
pub fn expand_wildcards(tokens: Vec<Token>, suggester: &dyn Suggester, limit: usize) -> Vec<Token> {
    let boolean = is_boolean(&tokens);
    let mut out = Vec::with_capacity(tokens.len());
    for token in tokens {
        let stem = match token {
            Token::Wildcard(stem) => stem,
            other => {
                out.push(other);
                continue;
            }
        };
        let completions = suggester.complete(&stem, limit);
        if completions.is_empty() {
            out.push(Token::Term(stem));
        } else if boolean {
            out.push(Token::LParen);
            for (i, suggestion) in completions.into_iter().enumerate() {
                if i > 0 {
                    out.push(Token::Or);
                }
                out.push(Token::Term(suggestion.term));
            }
            out.push(Token::RParen);
        } else {
            out.extend(completions.into_iter().map(|s| Token::Term(s.term)));
        }
    }
    out
}

/// Source of operand page sets for the evaluator.
pub trait Resolve {
    /// Pages where `term` occurs as a complete word.
    fn term(&self, term: &str) -> PageSet;
    /// Pages whose text contains `phrase`, ignoring case.
    fn phrase(&self, phrase: &str) -> PageSet;
    /// Every page in the corpus, for unary NOT.
    fn universe(&self) -> PageSet;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Open,
    Or,
    And,
    Difference,
    Complement,
}

impl Op {
    fn precedence(self) -> u8 {
        match self {
            Op::Open => 0,
            Op::Or => 1,
            Op::And => 2,
            Op::Difference | Op::Complement => 3,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Op::Open => "(",
            Op::Or => "OR",
            Op::And => "AND",
            Op::Difference | Op::Complement => "NOT",
        }
    }
}

struct Evaluator<'r, R: Resolve + ?Sized> {
    resolver: &'r R,
    operands: Vec<PageSet>,
    operators: Vec<Op>,
}

impl<'r, R: Resolve + ?Sized> Evaluator<'r, R> {
    fn apply(&mut self, op: Op) -> Result<(), QueryError> {
        let missing = QueryError::MissingOperand(op.name());
        let result: PageSet = match op {
            Op::Open => return Err(QueryError::UnbalancedParenthesis),
            Op::Complement => {
                let set = self.operands.pop().ok_or(missing)?;
                self.resolver.universe().difference(&set).copied().collect()
            }
            Op::And | Op::Or | Op::Difference => {
                let right = self.operands.pop().ok_or_else(|| missing.clone())?;
                let left = self.operands.pop().ok_or(missing)?;
                match op {
                    Op::And => left.intersection(&right).copied().collect(),
                    Op::Or => left.union(&right).copied().collect(),
                    _ => left.difference(&right).copied().collect(),
                }
            }
        };
        self.operands.push(result);
        Ok(())
    }

    /// Apply pending operators that bind at least as tightly, then push `op`.
    fn push_binary(&mut self, op: Op) -> Result<(), QueryError> {
        while let Some(&top) = self.operators.last() {
            if top == Op::Open || top.precedence() < op.precedence() {
                break;
            }
            self.operators.pop();
            self.apply(top)?;
        }
        self.operators.push(op);
        Ok(())
    }

    fn push_operand(&mut self, set: PageSet, expect_operand: bool) -> Result<(), QueryError> {
        if !expect_operand {
            self.push_binary(Op::And)?;
        }
        self.operands.push(set);
        Ok(())
    }
}

/// Evaluate a boolean token stream to the set of qualifying pages.
///
/// NOT is a binary difference when an operand precedes it and a unary
/// complement against the whole corpus otherwise. Operands written side by
/// side are joined with an implicit AND.
pub fn evaluate<R: Resolve + ?Sized>(tokens: &[Token], resolver: &R) -> Result<PageSet, QueryError> {
    if tokens.is_empty() {
        return Err(QueryError::Empty);
    }
    let mut eval = Evaluator { resolver, operands: Vec::new(), operators: Vec::new() };
    let mut expect_operand = true;

    for token in tokens {
        match token {
            Token::Term(term) | Token::Wildcard(term) => {
                let set = resolver.term(term);
                eval.push_operand(set, expect_operand)?;
                expect_operand = false;
            }
            Token::Phrase(phrase) => {
                let set = resolver.phrase(phrase);
                eval.push_operand(set, expect_operand)?;
                expect_operand = false;
            }
            Token::LParen => {
                if !expect_operand {
                    eval.push_binary(Op::And)?;
                }
                eval.operators.push(Op::Open);
                expect_operand = true;
            }
            Token::RParen => {
                if expect_operand {
                    return Err(match eval.operators.last() {
                        Some(&op) if op != Op::Open => QueryError::MissingOperand(op.name()),
                        Some(_) => QueryError::MissingOperand("()"),
                        None => QueryError::UnbalancedParenthesis,
                    });
                }
                loop {
                    match eval.operators.pop() {
                        None => return Err(QueryError::UnbalancedParenthesis),
                        Some(Op::Open) => break,
                        Some(op) => eval.apply(op)?,
                    }
                }
            }
            Token::And | Token::Or => {
                let op = if *token == Token::And { Op::And } else { Op::Or };
                if expect_operand {
                    return Err(QueryError::MissingOperand(op.name()));
                }
                eval.push_binary(op)?;
                expect_operand = true;
            }
            Token::Not => {
                if expect_operand {
                    eval.operators.push(Op::Complement);
                } else {
                    eval.push_binary(Op::Difference)?;
                    expect_operand = true;
                }
            }
        }
    }

    if expect_operand {
        return Err(match eval.operators.last() {
            Some(&op) if op != Op::Open => QueryError::MissingOperand(op.name()),
            _ => QueryError::UnbalancedParenthesis,
        });
    }
    while let Some(op) = eval.operators.pop() {
        eval.apply(op)?;
    }
    match eval.operands.len() {
        1 => Ok(eval.operands.pop().unwrap_or_default()),
        0 => Err(QueryError::Empty),
        _ => Err(QueryError::MissingOperand("AND")),
    }
}
