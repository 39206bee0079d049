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

use crate::cpu::{Cpu, CpuError, IoMap, Memory, Registers, ShadowAf};

/// A deep-copied snapshot of CPU state plus the outcome of a run (§4.5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub instructions_executed: u32,
    pub halted: bool,
    pub registers: Registers,
    pub shadow: ShadowAf,
    pub error: Option<String>,
}

/// Runs up to `steps` instructions, stopping early on halt or error.
/// A host panic during a step (e.g. an out-of-bounds buffer index from a
/// caller-supplied memory smaller than 64 KiB) is caught and reported as a
/// `CpuError::HostException` rather than unwinding through the driver.
pub fn run(cpu: &mut Cpu, memory: &mut Memory, io: &mut IoMap, steps: u32) -> ExecutionResult {
    let mut executed = 0;
    let mut error = None;
    cpu.halted = false;

    for _ in 0..steps {
        if cpu.halted {
            break;
        }
        tracing::debug!(pc = cpu.registers.pc, "executing step");
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| cpu.step(memory, io)));
        match outcome {
            Ok(Ok(())) => executed += 1,
            Ok(Err(err)) => {
                tracing::warn!(%err, "step failed");
                error = Some(err.to_string());
                break;
            }
            Err(panic) => {
                let message = panic_message(&panic);
                let err = CpuError::HostException(message);
                tracing::warn!(%err, "step panicked");
                error = Some(err.to_string());
                break;
            }
        }
    }

    ExecutionResult {
        instructions_executed: executed,
        halted: cpu.halted,
        registers: cpu.registers,
        shadow: cpu.registers.shadow,
        error,
    }
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_until_halt() {
        let mut cpu = Cpu::new();
        let mut memory: Box<Memory> = Box::new([0u8; 65536]);
        memory[0] = 0x00;
        memory[1] = 0x76;
        let mut io: Box<IoMap> = Box::new([0u8; 256]);
        let result = run(&mut cpu, &mut memory, &mut io, 10);
        assert_eq!(result.instructions_executed, 2);
        assert!(result.halted);
        assert!(result.error.is_none());
    }

    #[test]
    fn stops_and_reports_on_unknown_opcode() {
        let mut cpu = Cpu::new();
        let mut memory: Box<Memory> = Box::new([0u8; 65536]);
        memory[0] = 0xED;
        memory[1] = 0xFF;
        let mut io: Box<IoMap> = Box::new([0u8; 256]);
        let result = run(&mut cpu, &mut memory, &mut io, 10);
        assert_eq!(result.instructions_executed, 0);
        assert!(!result.halted);
        assert!(result.error.unwrap().contains("Unknown ED opcode"));
    }

    #[test]
    fn resumes_past_a_prior_halt() {
        let mut cpu = Cpu::new();
        let mut memory: Box<Memory> = Box::new([0u8; 65536]);
        memory[0] = 0x76; // HALT
        memory[1] = 0x3C; // INC A
        let mut io: Box<IoMap> = Box::new([0u8; 256]);
        let first = run(&mut cpu, &mut memory, &mut io, 5);
        assert!(first.halted);
        assert_eq!(first.instructions_executed, 1);

        cpu.registers.pc = 1;
        let second = run(&mut cpu, &mut memory, &mut io, 1);
        assert!(!second.halted);
        assert_eq!(second.instructions_executed, 1);
        assert_eq!(second.registers.a, 1);
    }

    #[test]
    fn stops_after_requested_step_count() {
        let mut cpu = Cpu::new();
        let mut memory: Box<Memory> = Box::new([0u8; 65536]);
        for i in 0..5 {
            memory[i] = 0x00;
        }
        let mut io: Box<IoMap> = Box::new([0u8; 256]);
        let result = run(&mut cpu, &mut memory, &mut io, 3);
        assert_eq!(result.instructions_executed, 3);
        assert_eq!(result.registers.pc, 3);
    }
}
