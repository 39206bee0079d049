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

use crate::assembler::{self, AssemblerResult};
use crate::cpu::{step_driver, Cpu, IoMap, Memory};
use crate::loader;

/// One assertion target in an expectation string (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Key {
    Reg(char),
    Sp,
    Pc,
    Zero,
    Carry,
    Halted,
    Memory(u16),
    Port(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Value {
    Int(i64),
    Bool(bool),
    Flip,
}

/// A four-seed-aware expectation: assertions that always apply, plus
/// assertions scoped to one of the (Z,C) seeds via a `Z.C.:` section label.
#[derive(Debug, Default)]
pub struct Expectation {
    common: Vec<(Key, Value)>,
    seeded: HashMap<(bool, bool), Vec<(Key, Value)>>,
}

fn parse_seed_label(label: &str) -> Option<(bool, bool)> {
    let label = label.trim();
    if label.len() != 4 {
        return None;
    }
    let bytes = label.as_bytes();
    if bytes[0] != b'Z' || bytes[2] != b'C' {
        return None;
    }
    let z = match bytes[1] {
        b'0' => false,
        b'1' => true,
        _ => return None,
    };
    let c = match bytes[3] {
        b'0' => false,
        b'1' => true,
        _ => return None,
    };
    Some((z, c))
}

fn parse_key(text: &str) -> Option<Key> {
    let text = text.trim();
    if let Some(inner) = text.strip_prefix("port[").and_then(|r| r.strip_suffix(']')) {
        return parse_int(inner).map(|n| Key::Port(n as u8));
    }
    if let Some(inner) = text.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
        return parse_int(inner).map(|n| Key::Memory(n as u16));
    }
    match text {
        "sp" => Some(Key::Sp),
        "pc" => Some(Key::Pc),
        "zero" => Some(Key::Zero),
        "carry" => Some(Key::Carry),
        "halted" => Some(Key::Halted),
        "a" | "b" | "c" | "d" | "e" | "h" | "l" => Some(Key::Reg(text.chars().next().unwrap())),
        _ => None,
    }
}

fn parse_int(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()
    } else {
        text.parse::<i64>().ok()
    }
}

fn parse_value(text: &str) -> Option<Value> {
    let text = text.trim();
    match text {
        "flip" => Some(Value::Flip),
        "t" | "true" => Some(Value::Bool(true)),
        "f" | "false" => Some(Value::Bool(false)),
        _ => parse_int(text).map(Value::Int),
    }
}

fn parse_assignments(text: &str) -> Vec<(Key, Value)> {
    text.split(',')
        .filter(|pair| !pair.trim().is_empty())
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            Some((parse_key(key)?, parse_value(value)?))
        })
        .collect()
}

/// Parses a full expectation string: `;`-separated sections, each either
/// bare `key=value,key=value` (applies to every seed) or `Z.C.:key=value,...`
/// scoped to one (Z,C) seed combination.
pub fn parse_expectation(text: &str) -> Expectation {
    let mut expectation = Expectation::default();
    for section in text.split(';') {
        let section = section.trim();
        if section.is_empty() {
            continue;
        }
        if let Some((label, rest)) = section.split_once(':')
            && let Some(seed) = parse_seed_label(label)
        {
            expectation.seeded.entry(seed).or_default().extend(parse_assignments(rest));
            continue;
        }
        expectation.common.extend(parse_assignments(section));
    }
    expectation
}

fn resolved(expectation: &Expectation, seed: (bool, bool)) -> Vec<(Key, Value)> {
    let mut all = expectation.common.clone();
    if let Some(extra) = expectation.seeded.get(&seed) {
        all.extend(extra.iter().copied());
    }
    all
}

/// Runs `source` once per (Z,C) seed combination, comparing post-run state
/// against `expectation` (§4.6). Returns a diff report on the first seed
/// that mismatches; `Ok(())` if all four seeds match.
pub fn check(source: &str, expectation: &str) -> Result<(), String> {
    let expectation = parse_expectation(expectation);
    let details = match assembler::assemble(source) {
        AssemblerResult::Success { details, .. } => details,
        AssemblerResult::Failure { errors } => {
            return Err(format!("program failed to assemble: {errors:?}"));
        }
    };
    let step_count = details.iter().filter(|d| !d.opcodes.is_empty()).count() as u32;

    for &z in &[false, true] {
        for &c in &[false, true] {
            run_one_seed(&details, step_count, (z, c), &expectation)?;
        }
    }
    Ok(())
}

fn run_one_seed(
    details: &[crate::assembler::InstructionDetail],
    step_count: u32,
    seed: (bool, bool),
    expectation: &Expectation,
) -> Result<(), String> {
    let mut memory: Box<Memory> = Box::new([0u8; 65536]);
    let mut io: Box<IoMap> = Box::new([0u8; 256]);
    loader::load(details, &mut memory);
    let initial_memory = memory.clone();

    let mut cpu = Cpu::new();
    cpu.registers.pc = 0;
    cpu.registers.sp = 0xFFFF;
    cpu.registers.zero = seed.0;
    cpu.registers.carry = seed.1;
    let initial_registers = cpu.registers;

    let result = step_driver::run(&mut cpu, &mut memory, &mut io, step_count);

    let assertions = resolved(expectation, seed);
    let mut diffs = Vec::new();

    let has = |k: Key| assertions.iter().any(|(key, _)| *key == k);
    let expected_of = |k: Key| assertions.iter().find(|(key, _)| *key == k).map(|(_, v)| *v);

    let total_bytes: u16 = details.iter().map(|d| d.opcodes.len() as u16).sum();
    let pc_expected = match expected_of(Key::Pc) {
        Some(Value::Int(n)) => n as u16,
        Some(Value::Flip) => total_bytes,
        _ => total_bytes,
    };
    if result.registers.pc != pc_expected {
        diffs.push(format!("pc: expected {:#06X} got {:#06X}", pc_expected, result.registers.pc));
    }

    for reg in ['a', 'b', 'c', 'd', 'e', 'h', 'l'] {
        let actual = match reg {
            'a' => result.registers.a,
            'b' => result.registers.b,
            'c' => result.registers.c,
            'd' => result.registers.d,
            'e' => result.registers.e,
            'h' => result.registers.h,
            'l' => result.registers.l,
            _ => unreachable!(),
        };
        let initial = match reg {
            'a' => initial_registers.a,
            'b' => initial_registers.b,
            'c' => initial_registers.c,
            'd' => initial_registers.d,
            'e' => initial_registers.e,
            'h' => initial_registers.h,
            'l' => initial_registers.l,
            _ => unreachable!(),
        };
        let expected = match expected_of(Key::Reg(reg)) {
            Some(Value::Int(n)) => n as u8,
            _ => initial,
        };
        if actual != expected {
            diffs.push(format!("{reg}: expected {:#04X} got {:#04X}", expected, actual));
        }
    }

    let sp_expected = match expected_of(Key::Sp) {
        Some(Value::Int(n)) => n as u16,
        _ => initial_registers.sp,
    };
    if result.registers.sp != sp_expected {
        diffs.push(format!("sp: expected {:#06X} got {:#06X}", sp_expected, result.registers.sp));
    }

    check_flag(seed.0, Key::Zero, "zero", result.registers.zero, &assertions, &mut diffs);
    check_flag(seed.1, Key::Carry, "carry", result.registers.carry, &assertions, &mut diffs);

    let halted_expected = match expected_of(Key::Halted) {
        Some(Value::Bool(b)) => b,
        _ => false,
    };
    if result.halted != halted_expected {
        diffs.push(format!("halted: expected {halted_expected} got {}", result.halted));
    }

    for (key, value) in &assertions {
        if let Key::Memory(addr) = *key {
            let expected = match value {
                Value::Int(n) => *n as u8,
                _ => continue,
            };
            let actual = memory[addr as usize];
            if actual != expected {
                diffs.push(format!("[{addr:#06X}]: expected {expected:#04X} got {actual:#04X}"));
            }
        }
        if let Key::Port(port) = *key {
            let expected = match value {
                Value::Int(n) => *n as u8,
                _ => continue,
            };
            let actual = io[port as usize];
            if actual != expected {
                diffs.push(format!("port[{port}]: expected {expected:#04X} got {actual:#04X}"));
            }
        }
    }

    for port in 0..256usize {
        if has(Key::Port(port as u8)) {
            continue;
        }
        if io[port] != 0 {
            diffs.push(format!("port[{port}]: expected 0x00 got {:#04X}", io[port]));
        }
    }

    for addr in 0..65536usize {
        if has(Key::Memory(addr as u16)) {
            continue;
        }
        if memory[addr] != initial_memory[addr] {
            diffs.push(format!(
                "[{addr:#06X}]: unexpected change, was {:#04X} now {:#04X}",
                initial_memory[addr], memory[addr]
            ));
        }
    }

    if let Some(err) = &result.error {
        diffs.push(format!("unexpected CPU error: {err}"));
    }

    if diffs.is_empty() {
        Ok(())
    } else {
        Err(format!("seed Z{}C{}:\n{}", seed.0 as u8, seed.1 as u8, diffs.join("\n")))
    }
}

fn check_flag(seed_value: bool, key: Key, name: &str, actual: bool, assertions: &[(Key, Value)], diffs: &mut Vec<String>) {
    let expected = match assertions.iter().find(|(k, _)| *k == key).map(|(_, v)| *v) {
        Some(Value::Bool(b)) => b,
        Some(Value::Flip) => !seed_value,
        _ => seed_value,
    };
    if actual != expected {
        diffs.push(format!("{name}: expected {expected} got {actual}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nop_leaves_everything_unchanged_but_pc() {
        check("NOP", "pc=1").unwrap();
    }

    #[test]
    fn ld_a_then_store_absolute() {
        check("LD A,0xFF\nLD (0x1234),A", "a=0xFF,[0x1234]=0xFF,pc=5").unwrap();
    }

    #[test]
    fn inc_a_sets_zero_flip() {
        check("LD A,0xFF\nINC A", "a=0x00,zero=t,pc=3").unwrap();
    }

    #[test]
    fn ccf_flips_carry_from_any_seed() {
        check("CCF", "carry=flip,pc=1").unwrap();
    }

    #[test]
    fn mismatch_reports_a_diff() {
        let err = check("NOP", "pc=99").unwrap_err();
        assert!(err.contains("pc: expected"));
    }

    #[test]
    fn seed_scoped_section_applies_only_to_its_seed() {
        check("NOP", "pc=1;Z1C0:zero=t;Z0C0:zero=f").unwrap();
    }
}
