//! Processing-element configuration words: field packing for one PE's 4-word burst.

use crate::error::{HarnessError, Result};
use serde::Deserialize;
use std::path::Path;

/// Set in word 4 of every configured PE.
pub const PE_ENABLE: u32 = 1 << 16;

/// Configuration of a single processing element.
///
/// `fs_*` select the forwarding source per side, `sel_*` the side multiplexers,
/// `sel_pc_*`/`fs_pc` the compute operand sources, `it_rst` the iteration reset
/// count and `op` the ALU operation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PeConfig {
    pub fs_n: u32,
    pub fs_e: u32,
    pub fs_s: u32,
    pub fs_w: u32,
    pub sel_n: u32,
    pub sel_e: u32,
    pub sel_s: u32,
    pub sel_w: u32,
    pub sel_pc_1: u32,
    pub sel_pc_2: u32,
    pub fs_pc: u32,
    pub it_rst: u32,
    pub feedback: u32,
    pub op: u32,
    #[serde(rename = "const")]
    pub constant: u32,
    pub position: u32,
}

/// Checks that `value` fits in `bits` and returns it shifted into place.
fn field(name: &'static str, value: u32, bits: u32, shift: u32) -> Result<u32> {
    if bits < 32 && value >> bits != 0 {
        return Err(HarnessError::PeField {
            field: name,
            value,
            bits,
        });
    }
    Ok(value << shift)
}

impl PeConfig {
    /// PE at `position` that forwards its north input straight through.
    pub fn bypass(position: u32) -> Self {
        Self {
            fs_n: 2,
            sel_s: 1,
            position,
            ..Self::default()
        }
    }

    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self> {
        toml::from_str(text).map_err(|e| HarnessError::parse(origin, e))
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text, path)
    }

    /// Packs the configuration into the four words loaded for this PE.
    pub fn encode(&self) -> Result<[u32; 4]> {
        let word_1 = field("fs_n", self.fs_n, 6, 0)?
            | field("fs_e", self.fs_e, 6, 6)?
            | field("fs_s", self.fs_s, 6, 12)?
            | field("fs_w", self.fs_w, 6, 18)?
            | field("sel_n", self.sel_n, 2, 24)?
            | field("sel_e", self.sel_e, 2, 26)?
            | field("sel_s", self.sel_s, 2, 28)?
            | field("sel_w", self.sel_w, 2, 30)?;

        let word_2 = field("sel_pc_1", self.sel_pc_1, 3, 0)?
            | field("sel_pc_2", self.sel_pc_2, 3, 3)?
            | field("fs_pc", self.fs_pc, 4, 6)?
            | field("it_rst", self.it_rst, 16, 10)?
            | field("feedback", self.feedback, 1, 26)?
            | field("op", self.op, 5, 27)?;

        let word_4 = field("position", self.position, 16, 0)? | PE_ENABLE;

        Ok([word_1, word_2, self.constant, word_4])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bypass_pe_words() {
        let words = PeConfig::bypass(10).encode().unwrap();
        assert_eq!(words, [0x1000_0002, 0, 0, 0x0001_000A]);
    }

    #[test]
    fn packs_every_slot() {
        let pe = PeConfig {
            fs_n: 0x3F,
            fs_w: 1,
            sel_w: 3,
            sel_pc_2: 5,
            fs_pc: 0xF,
            it_rst: 0xFFFF,
            feedback: 1,
            op: 0x1F,
            constant: 0xDEAD_BEEF,
            position: 3,
            ..PeConfig::default()
        };
        let [w1, w2, w3, w4] = pe.encode().unwrap();
        assert_eq!(w1, 0x3F | 1 << 18 | 3 << 30);
        assert_eq!(w2, 5 << 3 | 0xF << 6 | 0xFFFF << 10 | 1 << 26 | 0x1F << 27);
        assert_eq!(w3, 0xDEAD_BEEF);
        assert_eq!(w4, 3 | PE_ENABLE);
    }

    #[test]
    fn rejects_oversized_field() {
        let pe = PeConfig {
            sel_e: 4,
            ..PeConfig::default()
        };
        match pe.encode() {
            Err(HarnessError::PeField { field, value, bits }) => {
                assert_eq!(field, "sel_e");
                assert_eq!(value, 4);
                assert_eq!(bits, 2);
            }
            other => panic!("expected PeField error, got {other:?}"),
        }
    }

    #[test]
    fn parses_toml_with_const_key() {
        let text = "fs_n = 2\nsel_s = 1\nconst = 7\nposition = 4\n";
        let pe = PeConfig::from_toml_str(text, Path::new("pe.toml")).unwrap();
        assert_eq!(pe.constant, 7);
        assert_eq!(pe.encode().unwrap(), [0x1000_0002, 0, 7, 0x0001_0004]);
    }

    #[test]
    fn shipped_pe_description_encodes() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("configs/pe_bypass.toml");
        let pe = PeConfig::from_toml_file(path).unwrap();
        assert_eq!(pe, PeConfig::bypass(5));
    }
}
