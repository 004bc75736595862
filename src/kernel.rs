//! Kernel descriptor: array size, active channels, and the configuration word payload.

use crate::bitstream::{PeConfig, PE_ENABLE};
use crate::core::CONFIG_BURST_WORDS;
use crate::error::{HarnessError, Result};
use serde::Deserialize;
use std::path::Path;

/// Static description of one CGRA configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Kernel {
    pub name: String,
    /// Number of processing elements (one configuration burst each).
    pub pe_count: usize,
    /// Words needed to configure the whole array.
    pub word_count: usize,
    pub input_count: usize,
    pub output_count: usize,
    /// Per input channel: whether it is driven during this run.
    pub inputs: Vec<bool>,
    /// Per output channel: whether it is observed during this run.
    pub outputs: Vec<bool>,
    /// Configuration payload, consumed `CONFIG_BURST_WORDS` per active config clock tick.
    pub words: Vec<u32>,
}

/// On-disk form; `word_count` defaults to the payload length.
#[derive(Deserialize)]
struct KernelFile {
    name: String,
    pe_count: usize,
    word_count: Option<usize>,
    input_count: usize,
    output_count: usize,
    inputs: Vec<bool>,
    outputs: Vec<bool>,
    words: Vec<u32>,
}

impl From<KernelFile> for Kernel {
    fn from(f: KernelFile) -> Self {
        Self {
            word_count: f.word_count.unwrap_or(f.words.len()),
            name: f.name,
            pe_count: f.pe_count,
            input_count: f.input_count,
            output_count: f.output_count,
            inputs: f.inputs,
            outputs: f.outputs,
            words: f.words,
        }
    }
}

impl Kernel {
    /// Builds a kernel from one PE configuration per processing element, all channels active.
    pub fn from_pes(
        name: impl Into<String>,
        pes: &[PeConfig],
        input_count: usize,
        output_count: usize,
    ) -> Result<Self> {
        let mut words = Vec::with_capacity(pes.len() * CONFIG_BURST_WORDS);
        for pe in pes {
            words.extend_from_slice(&pe.encode()?);
        }
        Ok(Self {
            name: name.into(),
            pe_count: pes.len(),
            word_count: words.len(),
            input_count,
            output_count,
            inputs: vec![true; input_count],
            outputs: vec![true; output_count],
            words,
        })
    }

    /// 4x4 array where every PE forwards its input unchanged; 4 inputs, 4 outputs.
    pub fn bypass_4x4() -> Self {
        // Same words as `PeConfig::bypass(position).encode()` for positions 0..16
        let words: Vec<u32> = (0..16u32)
            .flat_map(|position| [0x1000_0002, 0, 0, PE_ENABLE | position])
            .collect();
        Self {
            name: "bypass_4x4".to_string(),
            pe_count: 16,
            word_count: words.len(),
            input_count: 4,
            output_count: 4,
            inputs: vec![true; 4],
            outputs: vec![true; 4],
            words,
        }
    }

    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self> {
        let file: KernelFile = toml::from_str(text).map_err(|e| HarnessError::parse(origin, e))?;
        let kernel = Kernel::from(file);
        kernel.validate()?;
        Ok(kernel)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text, path)
    }

    /// Marks output channel `channel` active or inactive.
    pub fn with_output(mut self, channel: usize, active: bool) -> Self {
        if let Some(flag) = self.outputs.get_mut(channel) {
            *flag = active;
        }
        self
    }

    /// Marks input channel `channel` active or inactive.
    pub fn with_input(mut self, channel: usize, active: bool) -> Self {
        if let Some(flag) = self.inputs.get_mut(channel) {
            *flag = active;
        }
        self
    }

    /// Payload size in bytes.
    pub fn bytes(&self) -> usize {
        self.word_count * std::mem::size_of::<u32>()
    }

    pub fn input_active(&self, channel: usize) -> bool {
        self.inputs.get(channel).copied().unwrap_or(false)
    }

    pub fn output_active(&self, channel: usize) -> bool {
        self.outputs.get(channel).copied().unwrap_or(false)
    }

    /// Configuration burst `index` (the words applied on the index-th active config tick).
    pub fn burst(&self, index: usize) -> Option<[u32; CONFIG_BURST_WORDS]> {
        let start = index * CONFIG_BURST_WORDS;
        let slice = self.words.get(start..start + CONFIG_BURST_WORDS)?;
        let mut burst = [0u32; CONFIG_BURST_WORDS];
        burst.copy_from_slice(slice);
        Some(burst)
    }

    /// Checks every precondition the protocol driver relies on.
    pub fn validate(&self) -> Result<()> {
        if self.pe_count == 0 {
            return Err(HarnessError::configuration(format!(
                "kernel `{}` has no processing elements",
                self.name
            )));
        }
        if self.input_count == 0 || self.output_count == 0 {
            return Err(HarnessError::configuration(format!(
                "kernel `{}` needs at least one input and one output channel (have {} in, {} out)",
                self.name, self.input_count, self.output_count
            )));
        }
        if self.inputs.len() != self.input_count {
            return Err(HarnessError::configuration(format!(
                "kernel `{}` declares {} inputs but has {} input activity flags",
                self.name,
                self.input_count,
                self.inputs.len()
            )));
        }
        if self.outputs.len() != self.output_count {
            return Err(HarnessError::configuration(format!(
                "kernel `{}` declares {} outputs but has {} output activity flags",
                self.name,
                self.output_count,
                self.outputs.len()
            )));
        }
        if self.word_count % CONFIG_BURST_WORDS != 0 {
            return Err(HarnessError::configuration(format!(
                "kernel `{}` word count {} is not a multiple of {}",
                self.name, self.word_count, CONFIG_BURST_WORDS
            )));
        }
        if self.words.len() < self.word_count {
            return Err(HarnessError::configuration(format!(
                "kernel `{}` declares {} configuration words but only {} are present",
                self.name,
                self.word_count,
                self.words.len()
            )));
        }
        let needed = self.pe_count * CONFIG_BURST_WORDS;
        if self.word_count < needed {
            return Err(HarnessError::configuration(format!(
                "kernel `{}` has {} PEs and needs {} configuration words, found {}",
                self.name, self.pe_count, needed, self.word_count
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bypass_matches_pe_encoder() {
        let k = Kernel::bypass_4x4();
        let pes: Vec<PeConfig> = (0..16).map(PeConfig::bypass).collect();
        let encoded = Kernel::from_pes("bypass_4x4", &pes, 4, 4).unwrap();
        assert_eq!(k, encoded);
        assert_eq!(k.word_count, 64);
        assert_eq!(k.bytes(), 256);
        assert_eq!(k.burst(15), Some([0x1000_0002, 0, 0, 0x0001_000F]));
        assert_eq!(k.burst(16), None);
        k.validate().unwrap();
    }

    #[test]
    fn short_payload_is_rejected() {
        let mut k = Kernel::bypass_4x4();
        k.words.truncate(60);
        let err = k.validate().unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn word_count_must_be_burst_aligned() {
        let mut k = Kernel::bypass_4x4();
        k.word_count = 62;
        assert!(k.validate().unwrap_err().is_configuration());
    }

    #[test]
    fn activity_flags_must_match_channel_count() {
        let mut k = Kernel::bypass_4x4();
        k.outputs.pop();
        assert!(k.validate().unwrap_err().is_configuration());
    }

    #[test]
    fn payload_must_cover_every_pe() {
        let mut k = Kernel::bypass_4x4();
        k.pe_count = 17;
        assert!(k.validate().unwrap_err().is_configuration());
    }

    #[test]
    fn inactive_output_flag() {
        let k = Kernel::bypass_4x4().with_output(2, false);
        assert!(k.output_active(1));
        assert!(!k.output_active(2));
        assert!(!k.output_active(9));
    }

    #[test]
    fn loads_from_toml() {
        let text = r#"
            name = "pair"
            pe_count = 1
            input_count = 2
            output_count = 1
            inputs = [true, false]
            outputs = [true]
            words = [268435458, 0, 0, 65536]
        "#;
        let k = Kernel::from_toml_str(text, Path::new("pair.toml")).unwrap();
        assert_eq!(k.word_count, 4);
        assert!(k.input_active(0));
        assert!(!k.input_active(1));
    }

    #[test]
    fn shipped_descriptor_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("configs/bypass_2x2.toml");
        let k = Kernel::from_toml_file(path).unwrap();
        assert_eq!(k.pe_count, 4);
        assert_eq!(k.burst(3), Some([0x1000_0002, 0, 0, 0x0001_0003]));
        assert!(!k.output_active(1));
    }
}
