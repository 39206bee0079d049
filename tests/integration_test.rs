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

use z80asm::assembler::{self, AssemblerResult};
use z80asm::cpu::oracle;
use z80asm::cpu::{step_driver, Cpu};
use z80asm::loader;
use z80asm::mock_source::MockSource;

fn assemble_ok(source: &str) -> Vec<z80asm::assembler::InstructionDetail> {
    match assembler::assemble(source) {
        AssemblerResult::Success { details, .. } => details,
        AssemblerResult::Failure { errors } => panic!("expected success, got {errors:?}"),
    }
}

fn run_program(source: &str, steps: u32) -> (Cpu, Box<[u8; 65536]>) {
    let details = assemble_ok(source);
    let mut memory: Box<[u8; 65536]> = Box::new([0u8; 65536]);
    let mut io = Box::new([0u8; 256]);
    loader::load(&details, &mut memory);
    let mut cpu = Cpu::new();
    step_driver::run(&mut cpu, &mut memory, &mut io, steps);
    (cpu, memory)
}

#[test]
fn scenario_nop_alone() {
    let details = assemble_ok("NOP");
    assert_eq!(details[0].opcodes, vec![0x00]);
    let (cpu, _) = run_program("NOP", 1);
    assert_eq!(cpu.registers.pc, 1);
}

#[test]
fn scenario_ld_a_then_store_absolute() {
    let details = assemble_ok("LD A,0xFF\nLD (0x1234),A");
    assert_eq!(details[0].opcodes, vec![0x3E, 0xFF]);
    assert_eq!(details[1].opcodes, vec![0x32, 0x34, 0x12]);
    let (cpu, memory) = run_program("LD A,0xFF\nLD (0x1234),A", 2);
    assert_eq!(cpu.registers.a, 0xFF);
    assert_eq!(memory[0x1234], 0xFF);
    assert_eq!(cpu.registers.pc, 5);
}

#[test]
fn scenario_inc_a_overflow_sets_zero() {
    let (cpu, _) = run_program("LD A,0xFF\nINC A", 2);
    assert_eq!(cpu.registers.a, 0x00);
    assert!(cpu.registers.zero);
    assert_eq!(cpu.registers.pc, 3);
}

#[test]
fn scenario_forward_branch_126_ok_127_fails() {
    let mut ok_src = String::from("JR TARGET\n");
    for _ in 0..126 {
        ok_src.push_str("NOP\n");
    }
    ok_src.push_str("TARGET: HALT\n");
    assemble_ok(&ok_src);

    let mut bad_src = String::from("JR TARGET\n");
    for _ in 0..127 {
        bad_src.push_str("NOP\n");
    }
    bad_src.push_str("TARGET: HALT\n");
    match assembler::assemble(&bad_src) {
        AssemblerResult::Failure { errors } => assert!(errors[0].message.contains("out of range")),
        AssemblerResult::Success { .. } => panic!("expected relative-range failure"),
    }
}

#[test]
fn scenario_org_relocation_jp_overwrites_nop() {
    let source = "ORG 0x1000\nLD A,0x42\nNOP\nORG 0x2000\nLD B,0x55\nRET\nORG 0x1002\nJP SUBROUTINE\nSUBROUTINE EQU 0x2000";
    let (load_address, details) = match assembler::assemble(source) {
        AssemblerResult::Success { load_address, details } => (load_address, details),
        AssemblerResult::Failure { errors } => panic!("expected success, got {errors:?}"),
    };
    assert_eq!(load_address, 0x1000);
    assert_eq!(details[1].opcodes, vec![0x3E, 0x42]);
    assert_eq!(details[2].opcodes, vec![0x00]);
    assert_eq!(details[4].opcodes, vec![0x06, 0x55]);
    assert_eq!(details[5].opcodes, vec![0xC9]);
    assert_eq!(details[7].opcodes, vec![0xC3, 0x00, 0x20]);

    let mut memory: Box<[u8; 65536]> = Box::new([0u8; 65536]);
    loader::load(&details, &mut memory);
    assert_eq!(&memory[0x1000..0x1003], &[0x3E, 0x42, 0xC3]);
    assert_eq!(&memory[0x1003..0x1005], &[0x00, 0x20]);
    assert_eq!(&memory[0x2000..0x2003], &[0x06, 0x55, 0xC9]);
}

#[test]
fn scenario_ldir_forward_overlap_propagates_first_byte() {
    let source = "LD HL,0x1242\n\
                  LD (HL),0xFF\n\
                  INC HL\n\
                  LD (HL),0x80\n\
                  INC HL\n\
                  LD (HL),0x7F\n\
                  LD DE,0x1243\n\
                  LD HL,0x1242\n\
                  LD BC,2\n\
                  LDIR";
    let details = assemble_ok(source);
    let step_count = details.iter().filter(|d| !d.opcodes.is_empty()).count() as u32;
    let (_, memory) = run_program(source, step_count);
    assert_eq!(&memory[0x1242..0x1245], &[0xFF, 0xFF, 0xFF]);
}

#[test]
fn mock_source_feeds_a_named_program_without_touching_disk() {
    let mut sources = MockSource::new();
    sources.add("boot", "NOP\nHALT");
    let source = sources.get("boot").unwrap();
    let details = assemble_ok(source);
    assert_eq!(details[0].opcodes, vec![0x00]);
    assert_eq!(details[1].opcodes, vec![0x76]);
}

#[test]
fn oracle_sweep_across_all_four_flag_seeds() {
    oracle::check("NOP", "pc=1").unwrap();
    oracle::check("LD A,0x10\nLD B,0x20\nADD A,B", "a=0x30,b=0x20,zero=f,carry=f,pc=5").unwrap();
    oracle::check("LD A,0x01\nSUB A", "a=0x00,zero=t,carry=f,pc=3").unwrap();
    oracle::check("LD A,0xFF\nINC A", "a=0x00,zero=t,pc=3").unwrap();
    oracle::check("CCF", "carry=flip,pc=1").unwrap();
    oracle::check("SCF", "carry=t,pc=1").unwrap();
    oracle::check("LD A,0x05\nCP 0x05", "a=0x05,zero=t,carry=f,pc=4").unwrap();
    oracle::check("LD A,0x10\nLD (0x2000),A", "a=0x10,[0x2000]=0x10,pc=5").unwrap();
}
