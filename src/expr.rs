/*
Copyright 2025 Connor Nolan

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

use std::collections::HashMap;
use std::sync::OnceLock;

use pest::Parser;
use pest::iterators::Pair;
use pest::pratt_parser::{Assoc, Op, PrattParser};

use crate::errors::AssemblyError;
use crate::{Rule, Z80Parser};

fn pratt() -> &'static PrattParser<Rule> {
    static PRATT: OnceLock<PrattParser<Rule>> = OnceLock::new();
    PRATT.get_or_init(|| {
        PrattParser::new()
            .op(Op::infix(Rule::add_op, Assoc::Left))
            .op(Op::infix(Rule::mul_op, Assoc::Left))
    })
}

/// Evaluates an arithmetic expression (§4.1) against the symbol table built so
/// far and the `len()` table of DB-string labels.
pub fn evaluate(
    text: &str,
    line: usize,
    symbols: &HashMap<String, i64>,
    db_lengths: &HashMap<String, usize>,
) -> Result<i64, AssemblyError> {
    let trimmed = text.trim();
    let mut pairs = Z80Parser::parse(Rule::expr, trimmed)
        .map_err(|_| AssemblyError::Syntax { line })?;
    let expr_pair = pairs.next().ok_or(AssemblyError::Syntax { line })?;
    let body = expr_pair
        .into_inner()
        .find(|p| p.as_rule() == Rule::expr_body)
        .ok_or(AssemblyError::Syntax { line })?;
    eval_expr(body, line, symbols, db_lengths)
}

fn eval_expr(
    pair: Pair<Rule>,
    line: usize,
    symbols: &HashMap<String, i64>,
    db_lengths: &HashMap<String, usize>,
) -> Result<i64, AssemblyError> {
    debug_assert_eq!(pair.as_rule(), Rule::expr_body);
    let inner = pair.into_inner();
    pratt()
        .map_primary(|primary| eval_unary(primary, line, symbols, db_lengths))
        .map_infix(|lhs, op, rhs| {
            let lhs = lhs?;
            let rhs = rhs?;
            match op.as_str() {
                "+" => Ok(lhs + rhs),
                "-" => Ok(lhs - rhs),
                "*" => Ok(lhs * rhs),
                "/" => {
                    if rhs == 0 {
                        Err(AssemblyError::DivisionByZero { line })
                    } else {
                        Ok(lhs / rhs)
                    }
                }
                other => unreachable!("unexpected binary operator {other}"),
            }
        })
        .parse(inner)
}

fn eval_unary(
    pair: Pair<Rule>,
    line: usize,
    symbols: &HashMap<String, i64>,
    db_lengths: &HashMap<String, usize>,
) -> Result<i64, AssemblyError> {
    debug_assert_eq!(pair.as_rule(), Rule::unary_expr);
    let text = pair.as_str();
    let negations = text.chars().take_while(|c| *c == '-').count();
    let atom = pair
        .into_inner()
        .next()
        .expect("unary_expr always contains an atom");
    let value = eval_atom(atom, line, symbols, db_lengths)?;
    Ok(if negations % 2 == 1 { -value } else { value })
}

fn eval_atom(
    pair: Pair<Rule>,
    line: usize,
    symbols: &HashMap<String, i64>,
    db_lengths: &HashMap<String, usize>,
) -> Result<i64, AssemblyError> {
    debug_assert_eq!(pair.as_rule(), Rule::atom);
    let inner = pair.into_inner().next().expect("atom always has one child");
    match inner.as_rule() {
        Rule::func_call => eval_func_call(inner, line, symbols, db_lengths),
        Rule::number => parse_number(inner.as_str(), line),
        Rule::char_lit => parse_char_literal(inner.as_str(), line),
        Rule::ident => {
            let name = inner.as_str().to_uppercase();
            symbols
                .get(&name)
                .copied()
                .ok_or(AssemblyError::UnknownSymbol { line, name })
        }
        Rule::expr_body => eval_expr(inner, line, symbols, db_lengths),
        other => unreachable!("unexpected atom child {other:?}"),
    }
}

fn eval_func_call(
    pair: Pair<Rule>,
    line: usize,
    symbols: &HashMap<String, i64>,
    db_lengths: &HashMap<String, usize>,
) -> Result<i64, AssemblyError> {
    let text = pair.as_str();
    let lower = text.to_ascii_lowercase();
    if lower.starts_with("len") {
        let ident = pair
            .into_inner()
            .next()
            .expect("len() always names an identifier")
            .as_str()
            .to_uppercase();
        db_lengths
            .get(&ident)
            .map(|len| *len as i64)
            .ok_or_else(|| AssemblyError::BadFunctionArgument {
                line,
                func: "len".to_string(),
                reason: format!("'{ident}' is not a DB string label"),
            })
    } else if lower.starts_with("chr") {
        let inner_expr = pair
            .into_inner()
            .next()
            .expect("chr() always wraps an expression");
        let value = eval_expr(inner_expr, line, symbols, db_lengths)?;
        if (0..=255).contains(&value) {
            Ok(value)
        } else {
            Err(AssemblyError::BadFunctionArgument {
                line,
                func: "chr".to_string(),
                reason: format!("{value} is out of range 0..=255"),
            })
        }
    } else {
        Err(AssemblyError::UnknownFunction {
            line,
            name: text.to_string(),
        })
    }
}

/// Parses a number literal per §4.1: decimal, `$FF`, `0xFF`, `FFH`, `%10101`.
pub fn parse_number(text: &str, line: usize) -> Result<i64, AssemblyError> {
    let bad = || AssemblyError::BadNumber {
        line,
        text: text.to_string(),
    };
    if let Some(rest) = text.strip_prefix('$') {
        i64::from_str_radix(rest, 16).map_err(|_| bad())
    } else if let Some(rest) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        i64::from_str_radix(rest, 16).map_err(|_| bad())
    } else if let Some(rest) = text.strip_prefix('%') {
        i64::from_str_radix(rest, 2).map_err(|_| bad())
    } else if let Some(rest) = text
        .strip_suffix('H')
        .or_else(|| text.strip_suffix('h'))
    {
        i64::from_str_radix(rest, 16).map_err(|_| bad())
    } else {
        text.parse::<i64>().map_err(|_| bad())
    }
}

/// Decodes a single escape-processed character from a `'...'` literal body
/// (quotes already stripped).
fn decode_escapes(body: &str) -> Vec<u8> {
    let mut out = Vec::new();
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push(b'\n'),
                Some('t') => out.push(b'\t'),
                Some('r') => out.push(b'\r'),
                Some('0') => out.push(0),
                Some('\\') => out.push(b'\\'),
                Some('\'') => out.push(b'\''),
                Some('"') => out.push(b'"'),
                Some(other) => {
                    let mut buf = [0u8; 4];
                    out.extend_from_slice(other.encode_utf8(&mut buf).as_bytes())
                }
                None => {}
            }
        } else {
            let mut buf = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
        }
    }
    out
}

pub fn parse_char_literal(text: &str, line: usize) -> Result<i64, AssemblyError> {
    let body = &text[1..text.len() - 1];
    let bytes = decode_escapes(body);
    match bytes.len() {
        0 => Err(AssemblyError::EmptyCharLiteral { line }),
        1 => Ok(bytes[0] as i64),
        _ => Err(AssemblyError::OverlongCharLiteral { line }),
    }
}

/// Escape-processes a `"..."` string literal body (quotes already stripped)
/// into the raw byte sequence emitted for DB data.
pub fn decode_string_escapes(body: &str) -> Vec<u8> {
    decode_escapes(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(text: &str) -> i64 {
        evaluate(text, 1, &HashMap::new(), &HashMap::new()).unwrap()
    }

    #[test]
    fn multiplicative_binds_tighter_than_additive() {
        assert_eq!(eval("2+3*4"), 14);
        assert_eq!(eval("10-2/2"), 9);
        assert_eq!(eval("2*3+4*5"), 26);
    }

    #[test]
    fn parentheses_override_precedence() {
        assert_eq!(eval("(2+3)*4"), 20);
    }
}
