pub mod instruction;
pub mod primitive;
pub mod statement;

/// Size of one serialized instruction, identical to `sizeof(struct sock_filter)`
pub const INSTRUCTION_SIZE: usize = std::mem::size_of::<libc::sock_filter>();

// yes, it uses u8/16/32, not c_uchar/short/int
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BpfInstruction {
    pub code: u16,
    pub jt: u8,
    pub jf: u8,
    pub k: u32,
}

/// Errors returned while reading raw `sock_filter` records back
#[derive(Debug, thiserror::Error, displaydoc::Display, PartialEq, Eq)]
pub enum DecodeError {
    /// program is {0} bytes long, which is not a multiple of the 8 byte record size
    TruncatedRecord(usize),
    /// instruction {index} has an opcode {code:#06x} that is not emitted by this crate
    UnknownOpcode { index: usize, code: u16 },
    /// instruction {index} is not a jump, but has non-zero jump offsets ({jt}, {jf})
    UnexpectedJumpOffsets { index: usize, jt: u8, jf: u8 },
}

impl BpfInstruction {
    /// Serializes the record in the layout the kernel reads: code, jt, jf, k
    ///
    /// The byte order is little-endian; the crate refuses to build for big-endian targets
    pub fn to_bytes(self) -> [u8; INSTRUCTION_SIZE] {
        let mut bytes = [0; INSTRUCTION_SIZE];
        bytes[0..2].copy_from_slice(&self.code.to_le_bytes());
        bytes[2] = self.jt;
        bytes[3] = self.jf;
        bytes[4..8].copy_from_slice(&self.k.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: [u8; INSTRUCTION_SIZE]) -> Self {
        Self {
            code: u16::from_le_bytes([bytes[0], bytes[1]]),
            jt: bytes[2],
            jf: bytes[3],
            k: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        }
    }
}

/// Concatenates the records back to back, without any header or padding
pub fn serialize(instructions: &[BpfInstruction]) -> Vec<u8> {
    instructions
        .iter()
        .flat_map(|instruction| instruction.to_bytes())
        .collect()
}

/// Splits a raw program into records; the instruction count is the byte length divided by the record size
pub fn deserialize(bytes: &[u8]) -> Result<Vec<BpfInstruction>, DecodeError> {
    if bytes.len() % INSTRUCTION_SIZE != 0 {
        return Err(DecodeError::TruncatedRecord(bytes.len()));
    }

    Ok(bytes
        .chunks_exact(INSTRUCTION_SIZE)
        .map(|chunk| {
            let mut record = [0; INSTRUCTION_SIZE];
            record.copy_from_slice(chunk);
            BpfInstruction::from_bytes(record)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_matches_sock_filter_layout() {
        assert_eq!(INSTRUCTION_SIZE, 8);
        assert_eq!(
            std::mem::size_of::<BpfInstruction>(),
            std::mem::size_of::<libc::sock_filter>()
        );
    }

    #[test]
    fn record_field_order() {
        let instruction = BpfInstruction {
            code: 0x0015,
            jt: 2,
            jf: 0,
            k: 0x5412,
        };
        assert_eq!(
            instruction.to_bytes(),
            [0x15, 0x00, 0x02, 0x00, 0x12, 0x54, 0x00, 0x00]
        );
    }

    #[test]
    fn deserialize_rejects_partial_records() {
        assert_eq!(
            deserialize(&[0; 12]),
            Err(DecodeError::TruncatedRecord(12))
        );
        assert_eq!(deserialize(&[]), Ok(vec![]));
    }
}
