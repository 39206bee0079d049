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

use pest::Parser;
use pest::iterators::Pair;

use crate::ast::ParsedLine;
use crate::errors::AssemblyError;
use crate::{Rule, Z80Parser};

/// Splits operands out of an `operand_list` pair, trimming each one.
fn collect_operands(pair: Pair<Rule>) -> Vec<String> {
    pair.into_inner()
        .filter(|p| p.as_rule() == Rule::operand)
        .map(|p| p.as_str().trim().to_string())
        .collect()
}

/// Parses one line of source into a [`ParsedLine`] per the §4.1 line
/// grammar. Each line is parsed independently so a malformed line never
/// disturbs the parse of its neighbours.
pub fn parse_line(line_number: usize, source: &str) -> Result<ParsedLine, AssemblyError> {
    let without_comment_len = source.len();
    let mut pairs = Z80Parser::parse(Rule::line, source).map_err(|_| AssemblyError::Syntax {
        line: line_number,
    })?;
    let line_pair = pairs
        .next()
        .and_then(|p| p.into_inner().next())
        .ok_or(AssemblyError::Syntax { line: line_number })?;

    let _ = without_comment_len;
    let mut result = ParsedLine {
        line_number,
        label: None,
        mnemonic: None,
        operands: Vec::new(),
        source: source.to_string(),
    };

    match line_pair.as_rule() {
        Rule::empty_line => {}
        Rule::label_only_line => {
            let label_colon = line_pair
                .into_inner()
                .find(|p| p.as_rule() == Rule::label_colon)
                .expect("label_only_line always has a label_colon");
            result.label = Some(strip_colon(label_colon.as_str()));
        }
        Rule::equ_line => {
            let mut inner = line_pair.into_inner();
            let label = inner
                .next()
                .expect("equ_line always names a label")
                .as_str()
                .to_string();
            // second child is the equ_kw token, skip it
            let _kw = inner.next();
            let expr_operand = inner
                .next()
                .expect("equ_line always carries an expression operand")
                .as_str()
                .trim()
                .to_string();
            result.label = Some(label);
            result.mnemonic = Some("EQU".to_string());
            result.operands = vec![expr_operand];
        }
        Rule::mnemonic_line => {
            for child in line_pair.into_inner() {
                match child.as_rule() {
                    Rule::label_colon => result.label = Some(strip_colon(child.as_str())),
                    Rule::ident => result.mnemonic = Some(child.as_str().to_uppercase()),
                    Rule::operand_list => result.operands = collect_operands(child),
                    _ => {}
                }
            }
        }
        other => unreachable!("unexpected top-level line rule {other:?}"),
    }

    Ok(result)
}

fn strip_colon(text: &str) -> String {
    text.trim_end_matches(':').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nop() {
        let line = parse_line(1, "NOP").unwrap();
        assert_eq!(line.mnemonic.as_deref(), Some("NOP"));
        assert!(line.operands.is_empty());
        assert!(line.label.is_none());
    }

    #[test]
    fn parses_label_and_instruction() {
        let line = parse_line(1, "LOOP: LD A,0xFF").unwrap();
        assert_eq!(line.label.as_deref(), Some("LOOP"));
        assert_eq!(line.mnemonic.as_deref(), Some("LD"));
        assert_eq!(line.operands, vec!["A".to_string(), "0xFF".to_string()]);
    }

    #[test]
    fn parses_label_only() {
        let line = parse_line(1, "LOOP:").unwrap();
        assert_eq!(line.label.as_deref(), Some("LOOP"));
        assert!(line.mnemonic.is_none());
    }

    #[test]
    fn parses_equ() {
        let line = parse_line(1, "WIDTH EQU 40").unwrap();
        assert_eq!(line.label.as_deref(), Some("WIDTH"));
        assert_eq!(line.mnemonic.as_deref(), Some("EQU"));
        assert_eq!(line.operands, vec!["40".to_string()]);
    }

    #[test]
    fn operand_commas_inside_parens_do_not_split() {
        let line = parse_line(1, "LD A,(HL)").unwrap();
        assert_eq!(line.operands, vec!["A".to_string(), "(HL)".to_string()]);
    }

    #[test]
    fn blank_and_comment_lines() {
        let blank = parse_line(1, "").unwrap();
        assert!(blank.mnemonic.is_none() && blank.label.is_none());
        let commented = parse_line(2, "   ; just a comment").unwrap();
        assert!(commented.mnemonic.is_none() && commented.label.is_none());
    }

    #[test]
    fn string_operand_with_comma_inside() {
        let line = parse_line(1, "MSG: DB \"a,b\"").unwrap();
        assert_eq!(line.operands, vec!["\"a,b\"".to_string()]);
    }
}
