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

pub mod listing;
pub mod symbol_table;

use tracing::debug;

use crate::ast::{DataKind, LineKind, ParsedLine, is_string_literal, strip_outer_parens};
use crate::errors::AssemblyError;
use crate::expr::{self, decode_string_escapes};
use crate::instruction_table::{self, PatternTok};
use crate::parser;
use symbol_table::{DbLengths, SymbolTable};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionDetail {
    pub start_address: Option<u16>,
    pub source: String,
    pub opcodes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyFailure {
    pub line: usize,
    pub address: u16,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssemblerResult {
    Success {
        load_address: u16,
        details: Vec<InstructionDetail>,
    },
    Failure {
        errors: Vec<AssemblyFailure>,
    },
}

/// Assembles a full program in one synchronous call (§4.3, §5). Splits the
/// source into lines, runs pass 1 (symbol table + sizing) and, only if pass 1
/// is clean, pass 2 (byte emission).
pub fn assemble(source: &str) -> AssemblerResult {
    let mut errors: Vec<AssemblyFailure> = Vec::new();
    let lines: Vec<ParsedLine> = source
        .lines()
        .enumerate()
        .map(|(i, text)| match parser::parse_line(i + 1, text) {
            Ok(parsed) => parsed,
            Err(e) => {
                errors.push(AssemblyFailure {
                    line: i + 1,
                    address: 0,
                    message: e.to_string(),
                });
                ParsedLine {
                    line_number: i + 1,
                    label: None,
                    mnemonic: None,
                    operands: Vec::new(),
                    source: text.to_string(),
                }
            }
        })
        .collect();

    if !errors.is_empty() {
        return AssemblerResult::Failure { errors };
    }

    let mut symbols = SymbolTable::new();
    let mut db_lengths = DbLengths::new();
    let mut details: Vec<InstructionDetail> = Vec::with_capacity(lines.len());
    let mut counter: u16 = 0;
    let mut load_address: Option<u16> = None;
    let mut stopped = false;

    debug!(lines = lines.len(), "pass 1 starting");
    for line in &lines {
        if stopped {
            details.push(InstructionDetail {
                start_address: None,
                source: line.source.clone(),
                opcodes: Vec::new(),
            });
            continue;
        }
        let start = counter;
        details.push(InstructionDetail {
            start_address: Some(start),
            source: line.source.clone(),
            opcodes: Vec::new(),
        });

        match run_pass1_line(line, &mut symbols, &mut db_lengths, &mut counter, &mut load_address) {
            Ok(end_of_program) => {
                if end_of_program {
                    stopped = true;
                }
            }
            Err(e) => errors.push(AssemblyFailure {
                line: line.line_number,
                address: start,
                message: e.to_string(),
            }),
        }
    }
    debug!(error_count = errors.len(), "pass 1 finished");

    if !errors.is_empty() {
        return AssemblerResult::Failure { errors };
    }

    let load_address = load_address.unwrap_or(0);
    counter = load_address;
    stopped = false;
    debug!(load_address, "pass 2 starting");
    for (line, detail) in lines.iter().zip(details.iter_mut()) {
        if stopped {
            continue;
        }
        detail.start_address = Some(counter);
        match run_pass2_line(line, &symbols, &db_lengths, &mut counter) {
            Ok((bytes, end_of_program)) => {
                detail.opcodes = bytes;
                if end_of_program {
                    stopped = true;
                }
            }
            Err(e) => errors.push(AssemblyFailure {
                line: line.line_number,
                address: counter,
                message: e.to_string(),
            }),
        }
    }

    if !errors.is_empty() {
        return AssemblerResult::Failure { errors };
    }
    let total_bytes: usize = details.iter().map(|d| d.opcodes.len()).sum();
    debug!(total_bytes, "pass 2 finished");

    AssemblerResult::Success {
        load_address,
        details,
    }
}

/// Returns `Ok(true)` when this line was `END` (processing should stop after it).
fn run_pass1_line(
    line: &ParsedLine,
    symbols: &mut SymbolTable,
    db_lengths: &mut DbLengths,
    counter: &mut u16,
    load_address: &mut Option<u16>,
) -> Result<bool, AssemblyError> {
    let ln = line.line_number;

    if let LineKind::Org(expr_text) = line.kind() {
        let value = expr::evaluate(expr_text, ln, symbols, db_lengths)?;
        let addr = value as u16;
        if load_address.is_none() {
            *load_address = Some(addr);
        }
        *counter = addr;
    }

    if let Some(label) = &line.label
        && !line.is_equ()
    {
        insert_symbol(symbols, label, *counter as i64, ln)?;
    }

    match line.kind() {
        LineKind::EquDef { label, expr: expr_text } => {
            if label.is_empty() {
                return Err(AssemblyError::EquWithoutLabel { line: ln });
            }
            let value = expr::evaluate(expr_text, ln, symbols, db_lengths)?;
            insert_symbol(symbols, label, value, ln)?;
            Ok(false)
        }
        LineKind::End => Ok(true),
        LineKind::Data { kind, operands } => {
            if kind == DataKind::Byte
                && let (Some(label), [single]) = (&line.label, operands)
                && is_string_literal(single)
            {
                db_lengths.insert(label.to_uppercase(), raw_char_count(single));
            }
            let size = data_size(kind, operands, ln, symbols, db_lengths)?;
            *counter = counter.wrapping_add(size as u16);
            Ok(false)
        }
        LineKind::Instruction { mnemonic, operands } => {
            let def = resolve_instruction(mnemonic, operands, ln)?;
            *counter = counter.wrapping_add(def.encoded_len() as u16);
            Ok(false)
        }
        LineKind::Empty | LineKind::LabelOnly(_) | LineKind::Org(_) => Ok(false),
    }
}

/// Returns the emitted bytes for this line, and `true` if it was `END`.
fn run_pass2_line(
    line: &ParsedLine,
    symbols: &SymbolTable,
    db_lengths: &DbLengths,
    counter: &mut u16,
) -> Result<(Vec<u8>, bool), AssemblyError> {
    let ln = line.line_number;
    match line.kind() {
        LineKind::Org(expr_text) => {
            let value = expr::evaluate(expr_text, ln, symbols, db_lengths)?;
            *counter = value as u16;
            Ok((Vec::new(), false))
        }
        LineKind::EquDef { .. } => Ok((Vec::new(), false)),
        LineKind::End => Ok((Vec::new(), true)),
        LineKind::Empty | LineKind::LabelOnly(_) => Ok((Vec::new(), false)),
        LineKind::Data { kind, operands } => {
            let bytes = emit_data(kind, operands, ln, symbols, db_lengths)?;
            *counter = counter.wrapping_add(bytes.len() as u16);
            Ok((bytes, false))
        }
        LineKind::Instruction { mnemonic, operands } => {
            let def = resolve_instruction(mnemonic, operands, ln)?;
            let start = *counter;
            let total_len = def.encoded_len() as u16;
            let mut bytes = def.prefix.clone();
            for (tok, operand) in def.pattern.iter().zip(operands.iter()) {
                match tok {
                    PatternTok::Literal(_) => {}
                    PatternTok::StringTok => {
                        let body = &operand[1..operand.len() - 1];
                        bytes.extend(decode_string_escapes(body));
                    }
                    PatternTok::Imm8 => {
                        let value = expr::evaluate(operand, ln, symbols, db_lengths)?;
                        if !(-128..=255).contains(&value) {
                            return Err(AssemblyError::ValueOutOfRange {
                                line: ln,
                                value,
                                context: "8-bit immediate".to_string(),
                            });
                        }
                        bytes.push((value & 0xFF) as u8);
                    }
                    PatternTok::Imm16 => {
                        let value = expr::evaluate(operand, ln, symbols, db_lengths)?;
                        if !(-32_768..=65_535).contains(&value) {
                            return Err(AssemblyError::ValueOutOfRange {
                                line: ln,
                                value,
                                context: "16-bit immediate".to_string(),
                            });
                        }
                        let v = (value & 0xFFFF) as u16;
                        bytes.push((v & 0xFF) as u8);
                        bytes.push((v >> 8) as u8);
                    }
                    PatternTok::Mem8 => {
                        let inner = strip_outer_parens(operand);
                        let value = expr::evaluate(inner, ln, symbols, db_lengths)?;
                        if !(0..=255).contains(&value) {
                            return Err(AssemblyError::ValueOutOfRange {
                                line: ln,
                                value,
                                context: "port/8-bit memory operand".to_string(),
                            });
                        }
                        bytes.push(value as u8);
                    }
                    PatternTok::Mem16 => {
                        let inner = strip_outer_parens(operand);
                        let value = expr::evaluate(inner, ln, symbols, db_lengths)?;
                        let v = (value & 0xFFFF) as u16;
                        bytes.push((v & 0xFF) as u8);
                        bytes.push((v >> 8) as u8);
                    }
                    PatternTok::Relative => {
                        let target = expr::evaluate(operand, ln, symbols, db_lengths)?;
                        let offset = target - (start as i64 + total_len as i64);
                        if !(-128..=126).contains(&offset) {
                            return Err(AssemblyError::RelativeOutOfRange { line: ln, offset });
                        }
                        bytes.push(offset as i8 as u8);
                    }
                }
            }
            *counter = counter.wrapping_add(total_len);
            Ok((bytes, false))
        }
    }
}

fn insert_symbol(symbols: &mut SymbolTable, label: &str, value: i64, line: usize) -> Result<(), AssemblyError> {
    let key = label.to_uppercase();
    if symbols.insert(key.clone(), value).is_some() {
        return Err(AssemblyError::DuplicateLabel { line, name: key });
    }
    Ok(())
}

fn raw_char_count(string_operand: &str) -> usize {
    string_operand[1..string_operand.len() - 1].chars().count()
}

fn data_size(
    kind: DataKind,
    operands: &[String],
    line: usize,
    symbols: &SymbolTable,
    db_lengths: &DbLengths,
) -> Result<usize, AssemblyError> {
    match kind {
        DataKind::Byte => Ok(operands
            .iter()
            .map(|op| if is_string_literal(op) { raw_char_count(op) } else { 1 })
            .sum()),
        DataKind::Word => Ok(operands.len() * 2),
        DataKind::Space => {
            let size_expr = operands.first().map(String::as_str).unwrap_or("0");
            let size = expr::evaluate(size_expr, line, symbols, db_lengths)?;
            Ok(size.max(0) as usize)
        }
    }
}

fn emit_data(
    kind: DataKind,
    operands: &[String],
    line: usize,
    symbols: &SymbolTable,
    db_lengths: &DbLengths,
) -> Result<Vec<u8>, AssemblyError> {
    match kind {
        DataKind::Byte => {
            let mut bytes = Vec::new();
            for op in operands {
                if is_string_literal(op) {
                    bytes.extend(decode_string_escapes(&op[1..op.len() - 1]));
                } else {
                    let value = expr::evaluate(op, line, symbols, db_lengths)?;
                    bytes.push((value & 0xFF) as u8);
                }
            }
            Ok(bytes)
        }
        DataKind::Word => {
            let mut bytes = Vec::new();
            for op in operands {
                let value = expr::evaluate(op, line, symbols, db_lengths)?;
                let v = (value & 0xFFFF) as u16;
                bytes.push((v & 0xFF) as u8);
                bytes.push((v >> 8) as u8);
            }
            Ok(bytes)
        }
        DataKind::Space => {
            let size = expr::evaluate(
                operands.first().map(String::as_str).unwrap_or("0"),
                line,
                symbols,
                db_lengths,
            )?
            .max(0) as usize;
            let fill = match operands.get(1) {
                Some(f) => (expr::evaluate(f, line, symbols, db_lengths)? & 0xFF) as u8,
                None => 0,
            };
            Ok(vec![fill; size])
        }
    }
}

fn resolve_instruction<'a>(
    mnemonic: &str,
    operands: &[String],
    line: usize,
) -> Result<&'a instruction_table::InstructionDefinition, AssemblyError> {
    instruction_table::lookup(mnemonic, operands).ok_or_else(|| {
        if instruction_table::mnemonic_known(mnemonic) {
            AssemblyError::InvalidOperands {
                line,
                mnemonic: mnemonic.to_string(),
            }
        } else {
            AssemblyError::UnknownMnemonic {
                line,
                mnemonic: mnemonic.to_string(),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assemble_ok(source: &str) -> (u16, Vec<InstructionDetail>) {
        match assemble(source) {
            AssemblerResult::Success { load_address, details } => (load_address, details),
            AssemblerResult::Failure { errors } => panic!("expected success, got {errors:?}"),
        }
    }

    #[test]
    fn nop_alone() {
        let (_load, details) = assemble_ok("NOP");
        assert_eq!(details[0].opcodes, vec![0x00]);
    }

    #[test]
    fn ld_a_then_store() {
        let (_load, details) = assemble_ok("LD A,0xFF\nLD (0x1234),A");
        assert_eq!(details[0].opcodes, vec![0x3E, 0xFF]);
        assert_eq!(details[1].opcodes, vec![0x32, 0x34, 0x12]);
    }

    #[test]
    fn forward_branch_range() {
        let mut src = String::from("JR TARGET\n");
        for _ in 0..126 {
            src.push_str("NOP\n");
        }
        src.push_str("TARGET: HALT\n");
        let (_load, details) = assemble_ok(&src);
        assert_eq!(details[0].opcodes, vec![0x18, 126]);

        let mut too_far = String::from("JR TARGET\n");
        for _ in 0..127 {
            too_far.push_str("NOP\n");
        }
        too_far.push_str("TARGET: HALT\n");
        match assemble(&too_far) {
            AssemblerResult::Failure { errors } => {
                assert!(errors[0].message.contains("out of range"));
            }
            AssemblerResult::Success { .. } => panic!("expected range failure"),
        }
    }

    #[test]
    fn org_directive_relocates_without_changing_load_address() {
        let src = "ORG 0x1000\nLD A,0x42\nNOP\nORG 0x2000\nLD B,0x55\nRET\nORG 0x1002\nJP SUBROUTINE\nSUBROUTINE EQU 0x2000";
        let (load, details) = assemble_ok(src);
        assert_eq!(load, 0x1000);
        assert_eq!(details[1].opcodes, vec![0x3E, 0x42]);
        assert_eq!(details[2].opcodes, vec![0x00]);
        assert_eq!(details[4].opcodes, vec![0x06, 0x55]);
        assert_eq!(details[5].opcodes, vec![0xC9]);
        assert_eq!(details[7].opcodes, vec![0xC3, 0x00, 0x20]);
        assert_eq!(details[7].start_address, Some(0x1002));
    }

    #[test]
    fn duplicate_label_is_an_error() {
        match assemble("FOO: NOP\nFOO: NOP") {
            AssemblerResult::Failure { errors } => assert!(errors[0].message.contains("duplicate")),
            AssemblerResult::Success { .. } => panic!("expected duplicate label error"),
        }
    }

    #[test]
    fn equ_without_label_is_an_error() {
        match assemble("EQU 5") {
            AssemblerResult::Failure { errors } => assert!(errors[0].message.contains("EQU requires a label")),
            AssemblerResult::Success { .. } => panic!("expected EQU-without-label error"),
        }
    }

    #[test]
    fn db_string_and_len() {
        let (_load, details) = assemble_ok("MSG: DB \"hi\"\nN EQU len(MSG)\nLD A,N");
        assert_eq!(details[0].opcodes, b"hi".to_vec());
        assert_eq!(details[2].opcodes, vec![0x3E, 2]);
    }
}
