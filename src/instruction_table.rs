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

use std::collections::HashSet;
use std::sync::OnceLock;

use tracing::debug;

use crate::ast::{is_memory_reference, is_string_literal};

/// A position in an instruction's operand pattern: either a literal token
/// (register name, condition code, bit index) or a class of operand the
/// matcher must classify syntactically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternTok {
    Literal(&'static str),
    Imm8,
    Imm16,
    Mem8,
    Mem16,
    Relative,
    StringTok,
}

#[derive(Debug, Clone)]
pub struct InstructionDefinition {
    pub mnemonic: &'static str,
    pub pattern: Vec<PatternTok>,
    pub prefix: Vec<u8>,
}

impl InstructionDefinition {
    /// Total byte length a match against this row produces.
    pub fn encoded_len(&self) -> usize {
        self.prefix.len()
            + self
                .pattern
                .iter()
                .map(|tok| match tok {
                    PatternTok::Imm8 | PatternTok::Mem8 | PatternTok::Relative => 1,
                    PatternTok::Imm16 | PatternTok::Mem16 => 2,
                    PatternTok::Literal(_) | PatternTok::StringTok => 0,
                })
                .sum::<usize>()
    }

    fn has_generic_slot(&self) -> bool {
        self.pattern.iter().any(|tok| {
            matches!(
                tok,
                PatternTok::Imm8 | PatternTok::Imm16 | PatternTok::Mem16 | PatternTok::Relative
            )
        })
    }
}

const REGS8: [&str; 8] = ["B", "C", "D", "E", "H", "L", "(HL)", "A"];
const REGS16: [&str; 4] = ["BC", "DE", "HL", "SP"];
const PUSH_POP_REGS: [&str; 4] = ["BC", "DE", "HL", "AF"];
const CONDITIONS: [&str; 4] = ["NZ", "Z", "NC", "C"];

fn push(table: &mut Vec<InstructionDefinition>, mnemonic: &'static str, pattern: Vec<PatternTok>, prefix: Vec<u8>) {
    table.push(InstructionDefinition {
        mnemonic,
        pattern,
        prefix,
    });
}

fn build_table() -> Vec<InstructionDefinition> {
    let mut t = Vec::new();

    // 8-bit LD r,r' (skip (HL),(HL) which is HALT).
    for (di, dst) in REGS8.iter().enumerate() {
        for (si, src) in REGS8.iter().enumerate() {
            if di == 6 && si == 6 {
                continue;
            }
            push(
                &mut t,
                "LD",
                vec![PatternTok::Literal(dst), PatternTok::Literal(src)],
                vec![0x40 + ((di as u8) << 3) + si as u8],
            );
        }
    }
    // LD r,n
    for (ri, r) in REGS8.iter().enumerate() {
        push(
            &mut t,
            "LD",
            vec![PatternTok::Literal(r), PatternTok::Imm8],
            vec![0x06 + ((ri as u8) << 3)],
        );
    }
    // LD A,(BC)/(DE) and LD (BC)/(DE),A
    push(&mut t, "LD", vec![PatternTok::Literal("A"), PatternTok::Literal("(BC)")], vec![0x0A]);
    push(&mut t, "LD", vec![PatternTok::Literal("A"), PatternTok::Literal("(DE)")], vec![0x1A]);
    push(&mut t, "LD", vec![PatternTok::Literal("(BC)"), PatternTok::Literal("A")], vec![0x02]);
    push(&mut t, "LD", vec![PatternTok::Literal("(DE)"), PatternTok::Literal("A")], vec![0x12]);
    // LD A,(nn) / LD (nn),A
    push(&mut t, "LD", vec![PatternTok::Literal("A"), PatternTok::Mem16], vec![0x3A]);
    push(&mut t, "LD", vec![PatternTok::Mem16, PatternTok::Literal("A")], vec![0x32]);
    // LD dd,nn
    for (di, dd) in REGS16.iter().enumerate() {
        push(
            &mut t,
            "LD",
            vec![PatternTok::Literal(dd), PatternTok::Imm16],
            vec![0x01 + ((di as u8) << 4)],
        );
    }
    // LD HL,(nn) / LD (nn),HL
    push(&mut t, "LD", vec![PatternTok::Literal("HL"), PatternTok::Mem16], vec![0x2A]);
    push(&mut t, "LD", vec![PatternTok::Mem16, PatternTok::Literal("HL")], vec![0x22]);

    // PUSH / POP
    for (qi, qq) in PUSH_POP_REGS.iter().enumerate() {
        push(&mut t, "PUSH", vec![PatternTok::Literal(qq)], vec![0xC5 + ((qi as u8) << 4)]);
        push(&mut t, "POP", vec![PatternTok::Literal(qq)], vec![0xC1 + ((qi as u8) << 4)]);
    }

    // Arithmetic: ADD A,r / ADC A,r (H, n only) / SUB r / SBC A,r / AND r / OR r / XOR r / CP r.
    let reg_arith: [(&str, u8); 4] = [("SUB", 0x90), ("AND", 0xA0), ("XOR", 0xA8), ("OR", 0xB0)];
    for (mnemonic, base) in reg_arith {
        for (ri, r) in REGS8.iter().enumerate() {
            push(&mut t, mnemonic, vec![PatternTok::Literal(r)], vec![base + ri as u8]);
        }
    }
    for (ri, r) in REGS8.iter().enumerate() {
        push(&mut t, "CP", vec![PatternTok::Literal(r)], vec![0xB8 + ri as u8]);
    }
    for (ri, r) in REGS8.iter().enumerate() {
        push(
            &mut t,
            "ADD",
            vec![PatternTok::Literal("A"), PatternTok::Literal(r)],
            vec![0x80 + ri as u8],
        );
        push(
            &mut t,
            "SBC",
            vec![PatternTok::Literal("A"), PatternTok::Literal(r)],
            vec![0x98 + ri as u8],
        );
    }
    // ADC restricted to A,H and A,n per the instruction catalogue.
    push(&mut t, "ADC", vec![PatternTok::Literal("A"), PatternTok::Literal("H")], vec![0x8C]);
    push(&mut t, "ADC", vec![PatternTok::Literal("A"), PatternTok::Imm8], vec![0xCE]);
    // Immediate forms.
    push(&mut t, "ADD", vec![PatternTok::Literal("A"), PatternTok::Imm8], vec![0xC6]);
    push(&mut t, "SUB", vec![PatternTok::Imm8], vec![0xD6]);
    push(&mut t, "AND", vec![PatternTok::Imm8], vec![0xE6]);
    push(&mut t, "OR", vec![PatternTok::Imm8], vec![0xF6]);
    push(&mut t, "XOR", vec![PatternTok::Imm8], vec![0xEE]);
    push(&mut t, "CP", vec![PatternTok::Imm8], vec![0xFE]);
    push(&mut t, "SBC", vec![PatternTok::Literal("A"), PatternTok::Imm8], vec![0xDE]);

    // 8-bit INC/DEC
    for (ri, r) in REGS8.iter().enumerate() {
        push(&mut t, "INC", vec![PatternTok::Literal(r)], vec![0x04 + ((ri as u8) << 3)]);
        push(&mut t, "DEC", vec![PatternTok::Literal(r)], vec![0x05 + ((ri as u8) << 3)]);
    }
    // 16-bit INC/DEC/ADD HL,rr
    for (di, dd) in REGS16.iter().enumerate() {
        push(&mut t, "INC", vec![PatternTok::Literal(dd)], vec![0x03 + ((di as u8) << 4)]);
        push(&mut t, "DEC", vec![PatternTok::Literal(dd)], vec![0x0B + ((di as u8) << 4)]);
        push(
            &mut t,
            "ADD",
            vec![PatternTok::Literal("HL"), PatternTok::Literal(dd)],
            vec![0x09 + ((di as u8) << 4)],
        );
    }

    // Exchange
    push(&mut t, "EX", vec![PatternTok::Literal("AF"), PatternTok::Literal("AF'")], vec![0x08]);
    push(&mut t, "EX", vec![PatternTok::Literal("DE"), PatternTok::Literal("HL")], vec![0xEB]);
    push(&mut t, "EX", vec![PatternTok::Literal("(SP)"), PatternTok::Literal("HL")], vec![0xE3]);

    // Plain accumulator rotates.
    push(&mut t, "RLCA", vec![], vec![0x07]);
    push(&mut t, "RLA", vec![], vec![0x17]);
    push(&mut t, "RRCA", vec![], vec![0x0F]);
    push(&mut t, "RRA", vec![], vec![0x1F]);

    // CB-prefixed rotate/shift
    let cb_rotate: [(&str, u8); 7] = [
        ("RLC", 0x00),
        ("RRC", 0x08),
        ("RL", 0x10),
        ("RR", 0x18),
        ("SLA", 0x20),
        ("SRA", 0x28),
        ("SRL", 0x38),
    ];
    for (mnemonic, base) in cb_rotate {
        for (ri, r) in REGS8.iter().enumerate() {
            push(&mut t, mnemonic, vec![PatternTok::Literal(r)], vec![0xCB, base + ri as u8]);
        }
    }

    // BIT/SET/RES, full 0-7 coverage (§4.2 design note).
    let bit_digits: [&str; 8] = ["0", "1", "2", "3", "4", "5", "6", "7"];
    let bit_ops: [(&str, u8); 3] = [("BIT", 0x40), ("SET", 0xC0), ("RES", 0x80)];
    for (mnemonic, base) in bit_ops {
        for (b, digit) in bit_digits.iter().enumerate() {
            for (ri, r) in REGS8.iter().enumerate() {
                push(
                    &mut t,
                    mnemonic,
                    vec![PatternTok::Literal(digit), PatternTok::Literal(r)],
                    vec![0xCB, base + ((b as u8) << 3) + ri as u8],
                );
            }
        }
    }

    // Control flow
    push(&mut t, "JP", vec![PatternTok::Imm16], vec![0xC3]);
    push(&mut t, "JP", vec![PatternTok::Literal("(HL)")], vec![0xE9]);
    for (ci, cc) in CONDITIONS.iter().enumerate() {
        push(
            &mut t,
            "JP",
            vec![PatternTok::Literal(cc), PatternTok::Imm16],
            vec![0xC2 + ((ci as u8) << 3)],
        );
        push(
            &mut t,
            "CALL",
            vec![PatternTok::Literal(cc), PatternTok::Imm16],
            vec![0xC4 + ((ci as u8) << 3)],
        );
        push(
            &mut t,
            "RET",
            vec![PatternTok::Literal(cc)],
            vec![0xC0 + ((ci as u8) << 3)],
        );
        push(
            &mut t,
            "JR",
            vec![PatternTok::Literal(cc), PatternTok::Relative],
            vec![0x20 + ((ci as u8) << 3)],
        );
    }
    push(&mut t, "JR", vec![PatternTok::Relative], vec![0x18]);
    push(&mut t, "DJNZ", vec![PatternTok::Relative], vec![0x10]);
    push(&mut t, "CALL", vec![PatternTok::Imm16], vec![0xCD]);
    push(&mut t, "RET", vec![], vec![0xC9]);

    // Block move, I/O, flags, misc.
    push(&mut t, "LDIR", vec![], vec![0xED, 0xB0]);
    push(&mut t, "IN", vec![PatternTok::Literal("A"), PatternTok::Mem8], vec![0xDB]);
    push(&mut t, "OUT", vec![PatternTok::Mem8, PatternTok::Literal("A")], vec![0xD3]);
    push(&mut t, "SCF", vec![], vec![0x37]);
    push(&mut t, "CCF", vec![], vec![0x3F]);
    push(&mut t, "CPL", vec![], vec![0x2F]);
    push(&mut t, "NEG", vec![], vec![0xED, 0x44]);
    push(&mut t, "NOP", vec![], vec![0x00]);
    push(&mut t, "HALT", vec![], vec![0x76]);

    t
}

/// Build-time diagnostics: duplicate rows, duplicate opcode sequences, and
/// opcode-space coverage. Never fails the build — these are purely
/// informational (§4.2).
fn report_diagnostics(table: &[InstructionDefinition]) {
    let mut seen_rows: HashSet<(&str, Vec<String>)> = HashSet::new();
    let mut seen_opcodes: HashSet<Vec<u8>> = HashSet::new();
    let mut duplicate_rows = 0usize;
    let mut duplicate_opcodes = 0usize;
    for def in table {
        let row_key = (
            def.mnemonic,
            def.pattern.iter().map(|t| format!("{t:?}")).collect::<Vec<_>>(),
        );
        if !seen_rows.insert(row_key) {
            duplicate_rows += 1;
        }
        if !def.has_generic_slot() && !seen_opcodes.insert(def.prefix.clone()) {
            duplicate_opcodes += 1;
        }
    }
    let covered: HashSet<u8> = table
        .iter()
        .filter(|d| d.prefix.len() == 1)
        .map(|d| d.prefix[0])
        .collect();
    let uncovered = 256 - covered.len();
    debug!(
        rows = table.len(),
        duplicate_rows, duplicate_opcodes, uncovered_single_byte_opcodes = uncovered,
        "instruction table built"
    );
}

fn table() -> &'static Vec<InstructionDefinition> {
    static TABLE: OnceLock<Vec<InstructionDefinition>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let t = build_table();
        report_diagnostics(&t);
        t
    })
}

/// Classifies `operand` against `tok`, per the §4.2 match algorithm.
fn matches_tok(tok: &PatternTok, operand: &str) -> bool {
    match tok {
        PatternTok::Literal(lit) => lit.eq_ignore_ascii_case(operand),
        PatternTok::Imm8 | PatternTok::Imm16 | PatternTok::Relative => !is_memory_reference(operand),
        PatternTok::Mem8 | PatternTok::Mem16 => is_memory_reference(operand),
        PatternTok::StringTok => is_string_literal(operand),
    }
}

/// Finds the instruction definition matching `mnemonic` and `operands`,
/// trying rows with no generic slot first (§4.2).
pub fn lookup<'a>(mnemonic: &str, operands: &[String]) -> Option<&'a InstructionDefinition> {
    let mut candidates: Vec<&InstructionDefinition> = table()
        .iter()
        .filter(|d| d.mnemonic.eq_ignore_ascii_case(mnemonic))
        .collect();
    candidates.sort_by_key(|d| d.has_generic_slot());
    for def in candidates {
        if def.pattern.len() != operands.len() {
            continue;
        }
        if def
            .pattern
            .iter()
            .zip(operands.iter())
            .all(|(tok, op)| matches_tok(tok, op))
        {
            return Some(def);
        }
    }
    None
}

/// True if `mnemonic` names any row in the table, regardless of whether the
/// supplied operands would match one. Used to tell "unknown mnemonic" apart
/// from "known mnemonic, wrong operands" (§7).
pub fn mnemonic_known(mnemonic: &str) -> bool {
    table().iter().any(|d| d.mnemonic.eq_ignore_ascii_case(mnemonic))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nop_matches() {
        let def = lookup("NOP", &[]).unwrap();
        assert_eq!(def.prefix, vec![0x00]);
    }

    #[test]
    fn ld_a_immediate() {
        let def = lookup("LD", &["A".to_string(), "0xFF".to_string()]).unwrap();
        assert_eq!(def.prefix, vec![0x3E]);
        assert_eq!(def.encoded_len(), 2);
    }

    #[test]
    fn ld_memory_vs_immediate_disambiguation() {
        let mem = lookup("LD", &["A".to_string(), "($8000)".to_string()]).unwrap();
        assert_eq!(mem.prefix, vec![0x3A]);
        let imm = lookup("LD", &["A".to_string(), "5*2".to_string()]).unwrap();
        assert_eq!(imm.prefix, vec![0x3E]);
    }

    #[test]
    fn inc_a_real_opcode() {
        let def = lookup("INC", &["A".to_string()]).unwrap();
        assert_eq!(def.prefix, vec![0x3C]);
    }

    #[test]
    fn jp_absolute() {
        let def = lookup("JP", &["SUBROUTINE".to_string()]).unwrap();
        assert_eq!(def.prefix, vec![0xC3]);
    }

    #[test]
    fn bit_full_range_covered() {
        for b in 0..8 {
            assert!(lookup("BIT", &[b.to_string(), "A".to_string()]).is_some());
        }
    }

    #[test]
    fn adc_is_narrow() {
        assert!(lookup("ADC", &["A".to_string(), "H".to_string()]).is_some());
        assert!(lookup("ADC", &["A".to_string(), "(HL)".to_string()]).is_none());
    }

    #[test]
    fn unknown_mnemonic_returns_none() {
        assert!(lookup("FROB", &[]).is_none());
    }
}
