use crate::error::AsmError;

/// One span of assembled bytes. A zero-size fragment at address zero is the
/// gap sentinel left by RESB/RESW; it emits nothing but forces a text
/// record break.
#[derive(Debug, Clone)]
struct TextFragment {
    address: u32,
    hex: String,
    size: u32,
}

impl TextFragment {
    fn is_gap(&self) -> bool {
        self.size == 0 && self.address == 0
    }
}

#[derive(Debug, Clone)]
struct Modification {
    address: u32,
    half_bytes: u32,
    /// Sign-prefixed symbol name, e.g. `+RDREC`.
    name: String,
}

/// One control section's object module, accumulated during pass 2 and
/// serialized to the H/D/R/T/M/E record format at the end.
pub struct ObjectCode {
    section_name: Option<String>,
    start_address: Option<u32>,
    program_length: Option<u32>,
    entry_point: Option<u32>,
    defines: Vec<(String, u32)>,
    refers: Vec<String>,
    texts: Vec<TextFragment>,
    mods: Vec<Modification>,
}

/// Longest text record payload, in bytes.
const MAX_TEXT_BYTES: u32 = 30;

impl ObjectCode {
    pub fn new() -> Self {
        ObjectCode {
            section_name: None,
            start_address: None,
            program_length: None,
            entry_point: None,
            defines: Vec::new(),
            refers: Vec::new(),
            texts: Vec::new(),
            mods: Vec::new(),
        }
    }

    pub fn set_section_name(&mut self, name: &str) {
        self.section_name = Some(name.to_string());
    }

    pub fn set_start_address(&mut self, address: u32) {
        self.start_address = Some(address);
    }

    pub fn set_program_length(&mut self, length: u32) {
        self.program_length = Some(length);
    }

    pub fn set_entry_point(&mut self, address: Option<u32>) {
        self.entry_point = address;
    }

    pub fn add_define(&mut self, name: &str, address: u32) {
        self.defines.push((name.to_string(), address));
    }

    pub fn add_refer(&mut self, name: &str) {
        self.refers.push(name.to_string());
    }

    pub fn add_text(&mut self, address: u32, hex: String, size: u32) {
        self.texts.push(TextFragment { address, hex, size });
    }

    /// Record a RESB/RESW gap: breaks the current text record.
    pub fn add_gap(&mut self) {
        self.texts.push(TextFragment {
            address: 0,
            hex: String::new(),
            size: 0,
        });
    }

    pub fn add_modification(&mut self, sign: char, name: &str, address: u32, half_bytes: u32) {
        self.mods.push(Modification {
            address,
            half_bytes,
            name: format!("{}{}", sign, name),
        });
    }

    /// Serialize the finished module. Fails if the section never declared a
    /// name, start address and length (no START/CSECT/END processed).
    pub fn serialize(&self) -> Result<String, AsmError> {
        let (Some(name), Some(start), Some(length)) = (
            self.section_name.as_deref(),
            self.start_address,
            self.program_length,
        ) else {
            return Err(AsmError::MissingSection);
        };

        let mut out = String::new();
        out.push_str(&format!("H{:<6}{:06X}{:06X}\n", name, start, length));

        if !self.defines.is_empty() {
            out.push('D');
            for (name, address) in &self.defines {
                out.push_str(&format!("{:<6}{:06X}", name, address));
            }
            out.push('\n');
        }
        if !self.refers.is_empty() {
            out.push('R');
            for name in &self.refers {
                out.push_str(&format!("{:<6}", name));
            }
            out.push('\n');
        }

        self.write_text_records(&mut out);

        for m in &self.mods {
            out.push_str(&format!("M{:06X}{:02X}{}\n", m.address, m.half_bytes, m.name));
        }

        out.push('E');
        if let Some(entry) = self.entry_point {
            out.push_str(&format!("{:06X}", entry));
        }
        Ok(out)
    }

    /// Pack fragments into `T` records of at most 30 bytes, starting a new
    /// record whenever the limit would be exceeded or a gap intervenes.
    fn write_text_records(&self, out: &mut String) {
        let mut record_start: u32 = 0;
        let mut record_len: u32 = 0;
        let mut payload = String::new();

        let flush = |start: u32, len: &mut u32, payload: &mut String, out: &mut String| {
            if *len > 0 {
                out.push_str(&format!("T{:06X}{:02X}{}\n", start, len, payload));
            }
            *len = 0;
            payload.clear();
        };

        for fragment in &self.texts {
            if fragment.is_gap() {
                flush(record_start, &mut record_len, &mut payload, out);
                continue;
            }
            if record_len + fragment.size > MAX_TEXT_BYTES {
                flush(record_start, &mut record_len, &mut payload, out);
            }
            if record_len == 0 {
                record_start = fragment.address;
            }
            record_len += fragment.size;
            payload.push_str(&fragment.hex);
        }
        flush(record_start, &mut record_len, &mut payload, out);
    }
}

impl Default for ObjectCode {
    fn default() -> Self {
        Self::new()
    }
}
