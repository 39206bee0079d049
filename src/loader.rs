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

use crate::assembler::InstructionDetail;

/// The only bridge between assembler and CPU (§6): for each detail with
/// non-empty opcodes, copies its bytes into `memory` starting at its
/// `start_address`.
pub fn load(details: &[InstructionDetail], memory: &mut [u8; 65536]) {
    for detail in details {
        let Some(start) = detail.start_address else {
            continue;
        };
        for (i, &byte) in detail.opcodes.iter().enumerate() {
            memory[(start as usize + i) & 0xFFFF] = byte;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::{self, AssemblerResult};

    #[test]
    fn loads_opcodes_at_start_address() {
        let AssemblerResult::Success { details, .. } = assembler::assemble("ORG 0x10\nNOP\nHALT") else {
            panic!("expected success");
        };
        let mut memory = [0u8; 65536];
        load(&details, &mut memory);
        assert_eq!(memory[0x10], 0x00);
        assert_eq!(memory[0x11], 0x76);
    }
}
