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

/// Flat, uppercase-keyed map from identifier to signed integer value. Holds
/// both label addresses and EQU constants in the one table (§3).
pub type SymbolTable = HashMap<String, i64>;

/// Uppercase-keyed map from a DB-string label to the raw character count of
/// its string operand, consumed by `len()` (§3, §4.1).
pub type DbLengths = HashMap<String, usize>;
