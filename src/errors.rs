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

/// Errors raised while assembling a line of source. Every variant carries the
/// 1-based source line it was raised for so the caller can build a diagnostic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    #[error("line {line}: bad number literal '{text}'")]
    BadNumber { line: usize, text: String },

    #[error("line {line}: unterminated string or character literal")]
    UnterminatedLiteral { line: usize },

    #[error("line {line}: empty character literal")]
    EmptyCharLiteral { line: usize },

    #[error("line {line}: character literal holds more than one character")]
    OverlongCharLiteral { line: usize },

    #[error("line {line}: unknown symbol '{name}'")]
    UnknownSymbol { line: usize, name: String },

    #[error("line {line}: division by zero")]
    DivisionByZero { line: usize },

    #[error("line {line}: unknown function '{name}'")]
    UnknownFunction { line: usize, name: String },

    #[error("line {line}: bad argument to '{func}': {reason}")]
    BadFunctionArgument {
        line: usize,
        func: String,
        reason: String,
    },

    #[error("line {line}: duplicate label '{name}'")]
    DuplicateLabel { line: usize, name: String },

    #[error("line {line}: EQU requires a label")]
    EquWithoutLabel { line: usize },

    #[error("line {line}: unknown mnemonic '{mnemonic}'")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("line {line}: invalid operand combination for '{mnemonic}'")]
    InvalidOperands { line: usize, mnemonic: String },

    #[error("line {line}: could not parse line")]
    Syntax { line: usize },

    #[error("line {line}: value {value} out of range for {context}")]
    ValueOutOfRange {
        line: usize,
        value: i64,
        context: String,
    },

    #[error("line {line}: relative jump offset {offset} out of range")]
    RelativeOutOfRange { line: usize, offset: i64 },
}

impl AssemblyError {
    pub fn line(&self) -> usize {
        match self {
            AssemblyError::BadNumber { line, .. }
            | AssemblyError::UnterminatedLiteral { line }
            | AssemblyError::EmptyCharLiteral { line }
            | AssemblyError::OverlongCharLiteral { line }
            | AssemblyError::UnknownSymbol { line, .. }
            | AssemblyError::DivisionByZero { line }
            | AssemblyError::UnknownFunction { line, .. }
            | AssemblyError::BadFunctionArgument { line, .. }
            | AssemblyError::DuplicateLabel { line, .. }
            | AssemblyError::EquWithoutLabel { line }
            | AssemblyError::UnknownMnemonic { line, .. }
            | AssemblyError::InvalidOperands { line, .. }
            | AssemblyError::Syntax { line }
            | AssemblyError::ValueOutOfRange { line, .. }
            | AssemblyError::RelativeOutOfRange { line, .. } => *line,
        }
    }
}
