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

use thiserror::Error;

/// Errors surfaced from a single CPU step (§4.4, §7). `Display` renders
/// exactly the human-readable text the spec calls for.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CpuError {
    #[error("Unknown opcode: 0x{opcode:02X} at PC={pc}")]
    UnknownOpcode { pc: u16, opcode: u8 },

    #[error("Unknown CB opcode: 0x{opcode:02X} at PC={pc}")]
    UnknownCbOpcode { pc: u16, opcode: u8 },

    #[error("Unknown ED opcode: 0x{opcode:02X} at PC={pc}")]
    UnknownEdOpcode { pc: u16, opcode: u8 },

    #[error("CPU Exception: {0}")]
    HostException(String),
}
