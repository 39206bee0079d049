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

pub mod ast;
pub mod assembler;
pub mod cpu;
pub mod errors;
pub mod expr;
pub mod instruction_table;
pub mod loader;
pub mod mock_source;
pub mod parser;

use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "grammar.pest"]
pub struct Z80Parser;
