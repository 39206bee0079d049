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

/// An in-memory, name-keyed stand-in for a filesystem of `.asm` sources, for
/// tests that want canned programs without touching disk. Adapted from the
/// mock-file-reader pattern, but keyed by a logical name instead of a path
/// since the core assembler has no filesystem concept.
#[derive(Default)]
pub struct MockSource {
    programs: HashMap<String, String>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: &str, source: &str) -> &mut Self {
        self.programs.insert(name.to_string(), source.to_string());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.programs.get(name).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_and_retrieves_named_programs() {
        let mut src = MockSource::new();
        src.add("boot", "NOP\nHALT");
        assert_eq!(src.get("boot"), Some("NOP\nHALT"));
        assert_eq!(src.get("missing"), None);
    }
}
