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

/// CRC-16-CCITT: polynomial 0x1021, seed 0xFFFF, left-shift, no reflection,
/// no final XOR.
pub fn crc16_ccitt(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// Renders the machine-code listing (§4.3): consecutive (address, byte)
/// pairs are grouped into rows of up to eight bytes, a row per line
/// `<decimal-start-address> Data <b0,b1,...,bN,crc16>`.
pub fn render_listing(details: &[InstructionDetail]) -> String {
    let mut pairs: Vec<(u16, u8)> = Vec::new();
    for detail in details {
        let Some(start) = detail.start_address else {
            continue;
        };
        for (i, &byte) in detail.opcodes.iter().enumerate() {
            pairs.push((start.wrapping_add(i as u16), byte));
        }
    }
    pairs.sort_by_key(|(addr, _)| *addr);

    let mut out = String::new();
    let mut row: Vec<(u16, u8)> = Vec::new();
    let flush = |row: &mut Vec<(u16, u8)>, out: &mut String| {
        if row.is_empty() {
            return;
        }
        let start = row[0].0;
        let mut crc_input = vec![(start & 0xFF) as u8, (start >> 8) as u8];
        crc_input.extend(row.iter().map(|(_, b)| *b));
        let crc = crc16_ccitt(&crc_input);
        let bytes: Vec<String> = row.iter().map(|(_, b)| b.to_string()).collect();
        out.push_str(&format!("{start} Data {},{crc}\n", bytes.join(",")));
        row.clear();
    };

    for (addr, byte) in pairs {
        if let Some(&(last_addr, _)) = row.last()
            && (addr != last_addr.wrapping_add(1) || row.len() >= 8)
        {
            flush(&mut row, &mut out);
        }
        row.push((addr, byte));
    }
    flush(&mut row, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc_seed_and_determinism() {
        let a = crc16_ccitt(&[0x00, 0x00, 0x00]);
        let b = crc16_ccitt(&[0x00, 0x00, 0x00]);
        assert_eq!(a, b);
        assert_ne!(crc16_ccitt(&[1]), crc16_ccitt(&[2]));
    }

    #[test]
    fn listing_groups_consecutive_bytes() {
        let details = vec![InstructionDetail {
            start_address: Some(0),
            source: "NOP".into(),
            opcodes: vec![0x00],
        }];
        let listing = render_listing(&details);
        assert!(listing.starts_with("0 Data 0,"));
    }
}
