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

/// A single source line after the lexical pass. Immutable once built; both
/// assembler passes walk the same `Vec<ParsedLine>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    pub line_number: usize,
    pub label: Option<String>,
    pub mnemonic: Option<String>,
    pub operands: Vec<String>,
    pub source: String,
}

impl ParsedLine {
    pub fn is_equ(&self) -> bool {
        self.mnemonic.as_deref() == Some("EQU")
    }
}

/// The sum-type view of a parsed line the driver actually dispatches on.
/// `ParsedLine`'s (mnemonic, operands) pair remains the data the instruction
/// table and expression engine consume; this enum just names the cases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind<'a> {
    Empty,
    LabelOnly(&'a str),
    EquDef { label: &'a str, expr: &'a str },
    Org(&'a str),
    End,
    Data { kind: DataKind, operands: &'a [String] },
    Instruction { mnemonic: &'a str, operands: &'a [String] },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    Byte,
    Word,
    Space,
}

impl ParsedLine {
    pub fn kind(&self) -> LineKind<'_> {
        match (&self.mnemonic, self.operands.as_slice()) {
            (None, _) => match &self.label {
                Some(l) => LineKind::LabelOnly(l),
                None => LineKind::Empty,
            },
            (Some(m), ops) if m == "EQU" => LineKind::EquDef {
                label: self.label.as_deref().unwrap_or_default(),
                expr: ops.first().map(String::as_str).unwrap_or_default(),
            },
            (Some(m), ops) if m == "ORG" => LineKind::Org(ops.first().map(String::as_str).unwrap_or_default()),
            (Some(m), _) if m == "END" => LineKind::End,
            (Some(m), ops) if m == "DB" || m == "DEFB" => LineKind::Data {
                kind: DataKind::Byte,
                operands: ops,
            },
            (Some(m), ops) if m == "DEFW" => LineKind::Data {
                kind: DataKind::Word,
                operands: ops,
            },
            (Some(m), ops) if m == "DEFS" => LineKind::Data {
                kind: DataKind::Space,
                operands: ops,
            },
            (Some(m), ops) => LineKind::Instruction {
                mnemonic: m,
                operands: ops,
            },
        }
    }
}

/// True iff `operand`'s outer parentheses enclose the entire token (§4.1
/// "operand classification"). This is the only thing distinguishing a memory
/// reference like `(HL)` from an immediate like `(5+3)*2`.
pub fn is_memory_reference(operand: &str) -> bool {
    let bytes = operand.as_bytes();
    if bytes.first() != Some(&b'(') || bytes.last() != Some(&b')') {
        return false;
    }
    let mut depth = 0i32;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 && i != bytes.len() - 1 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

pub fn strip_outer_parens(operand: &str) -> &str {
    operand
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(operand)
        .trim()
}

pub fn is_string_literal(operand: &str) -> bool {
    operand.len() >= 2 && operand.starts_with('"') && operand.ends_with('"')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_reference_classification() {
        assert!(is_memory_reference("($8000)"));
        assert!(is_memory_reference("(HL+1)"));
        assert!(is_memory_reference("(HL)"));
        assert!(!is_memory_reference("(5+3)*2"));
        assert!(!is_memory_reference("5"));
        assert!(!is_memory_reference("(5)*2"));
    }

    #[test]
    fn strips_outer_parens() {
        assert_eq!(strip_outer_parens("($8000)"), "$8000");
        assert_eq!(strip_outer_parens("(HL+1)"), "HL+1");
    }
}
