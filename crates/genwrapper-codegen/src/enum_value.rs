//! Evaluation of enumerator initialisers.
//!
//! Only the constant expressions that show up in practice are understood:
//! integer literals, references to earlier enumerators, unary `- ~ +`,
//! binary `* + - << >> & ^ |` and parentheses.

use std::collections::HashMap;

use crate::type_names;

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Num(i64),
    Name(String),
    Op(&'static str),
    Open,
    Close,
}

fn parse_literal(text: &str) -> Option<i64> {
    let digits = text.trim_end_matches(['u', 'U', 'l', 'L']);
    let (radix, body) = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        (16, hex)
    } else if digits.len() > 1 && digits.starts_with('0') {
        (8, &digits[1..])
    } else {
        (10, digits)
    };
    // values beyond i64 are kept by their bit pattern, as C would
    u64::from_str_radix(body, radix).ok().map(|v| v as i64)
}

fn lex(text: &str) -> Option<Vec<Tok>> {
    const OPS: [&str; 9] = ["<<", ">>", "*", "+", "-", "&", "^", "|", "~"];
    let mut tokens = Vec::new();
    let mut rest = text.trim();

    while let Some(c) = rest.chars().next() {
        if c.is_whitespace() {
            rest = rest.trim_start();
            continue;
        }
        if c == '(' || c == ')' {
            tokens.push(if c == '(' { Tok::Open } else { Tok::Close });
            rest = &rest[1..];
            continue;
        }
        if let Some(op) = OPS.iter().find(|op| rest.starts_with(**op)) {
            tokens.push(Tok::Op(*op));
            rest = &rest[op.len()..];
            continue;
        }
        let end = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == ':'))
            .unwrap_or(rest.len());
        if end == 0 {
            return None;
        }
        let word = &rest[..end];
        if word.starts_with(|c: char| c.is_ascii_digit()) {
            tokens.push(Tok::Num(parse_literal(word)?));
        } else {
            tokens.push(Tok::Name(word.to_string()));
        }
        rest = &rest[end..];
    }

    Some(tokens)
}

fn precedence(op: &str) -> Option<u8> {
    match op {
        "*" => Some(5),
        "+" | "-" => Some(4),
        "<<" | ">>" => Some(3),
        "&" => Some(2),
        "^" => Some(1),
        "|" => Some(0),
        _ => None,
    }
}

struct Parser<'a> {
    tokens: Vec<Tok>,
    pos: usize,
    known: &'a HashMap<String, i64>,
}

impl Parser<'_> {
    fn next(&mut self) -> Option<Tok> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    fn lookup(&self, name: &str) -> Option<i64> {
        self.known
            .get(name)
            .or_else(|| self.known.get(type_names::last_segment(name)))
            .copied()
    }

    fn unary(&mut self) -> Option<i64> {
        match self.next()? {
            Tok::Num(n) => Some(n),
            Tok::Name(name) => self.lookup(&name),
            Tok::Op("-") => self.unary().map(i64::wrapping_neg),
            Tok::Op("+") => self.unary(),
            Tok::Op("~") => self.unary().map(|v| !v),
            Tok::Open => {
                let value = self.binary(0)?;
                (self.next()? == Tok::Close).then_some(value)
            }
            _ => None,
        }
    }

    fn binary(&mut self, min_prec: u8) -> Option<i64> {
        let mut lhs = self.unary()?;
        while let Some(Tok::Op(op)) = self.peek() {
            let op = *op;
            let Some(prec) = precedence(op) else {
                return None;
            };
            if prec < min_prec {
                break;
            }
            self.pos += 1;
            let rhs = self.binary(prec + 1)?;
            lhs = match op {
                "*" => lhs.wrapping_mul(rhs),
                "+" => lhs.wrapping_add(rhs),
                "-" => lhs.wrapping_sub(rhs),
                "<<" => lhs.checked_shl(u32::try_from(rhs).ok()?)?,
                ">>" => lhs.checked_shr(u32::try_from(rhs).ok()?)?,
                "&" => lhs & rhs,
                "^" => lhs ^ rhs,
                "|" => lhs | rhs,
                _ => return None,
            };
        }
        Some(lhs)
    }
}

/// Evaluate an initialiser, resolving names against `known` enumerators.
///
/// Names may be qualified; the unqualified spelling is tried as well.
pub fn evaluate(expr: &str, known: &HashMap<String, i64>) -> Option<i64> {
    let mut parser = Parser {
        tokens: lex(expr)?,
        pos: 0,
        known,
    };
    let value = parser.binary(0)?;
    (parser.pos == parser.tokens.len()).then_some(value)
}
