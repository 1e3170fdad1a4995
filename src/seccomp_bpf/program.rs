use libc::{BPF_MAXINSNS, seccomp_data};

use crate::{
    bpf::{self, BpfInstruction, DecodeError, instruction::Instruction},
    seccomp_bpf::{
        action::FilterAction,
        emulator::{self, EmulationError},
    },
};

#[derive(Debug, thiserror::Error, displaydoc::Display, PartialEq, Eq)]
pub enum VerificationError {
    /// filter contains no instructions
    Empty,
    /// filter contains {has} instructions, which is more than the maximum of {max}
    TooManyInstructions { has: usize, max: usize },
    /// instruction {index} jumps to {target}, past the end of the {len} instruction filter
    JumpOutOfBounds {
        index: usize,
        target: usize,
        len: usize,
    },
    /// instruction {index} loads {size} bytes at offset {offset}, outside of or misaligned within seccomp_data
    InvalidLoad { index: usize, offset: u32, size: u32 },
    /// the last instruction is not a return, the program can run off its end
    MissingReturn,
}

/// Errors returned when reading a serialized filter back
#[derive(Debug, thiserror::Error, displaydoc::Display, PartialEq, Eq)]
pub enum ReadError {
    /// cannot decode the filter: {0}
    Decode(#[from] DecodeError),
    /// decoded filter is not valid: {0}
    Verify(#[from] VerificationError),
}

/// A verified seccomp BPF program
///
/// Construction checks that every execution path ends in a return: jumps only go forward and stay in bounds,
/// and the last instruction is a return. Loads are checked against the `seccomp_data` layout the same way the
/// kernel does when the filter is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    instructions: Vec<Instruction>,
}

impl Program {
    pub fn new(instructions: Vec<Instruction>) -> Result<Self, VerificationError> {
        verify(&instructions)?;
        Ok(Self { instructions })
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    // always false for a verified program
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn to_bpf(&self) -> Vec<BpfInstruction> {
        self.instructions.iter().map(BpfInstruction::from).collect()
    }

    /// The artifact loaded by the sandbox supervisor: `sock_filter` records back to back
    pub fn to_bytes(&self) -> Vec<u8> {
        bpf::serialize(&self.to_bpf())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ReadError> {
        let instructions = bpf::deserialize(bytes)?
            .into_iter()
            .enumerate()
            .map(|(index, raw)| Instruction::decode(index, raw))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(instructions)?)
    }

    /// Runs the filter against a syscall the way the kernel would
    pub fn evaluate(&self, data: &seccomp_data) -> Result<FilterAction, EmulationError> {
        emulator::run(&self.instructions, data)
    }
}

fn verify(instructions: &[Instruction]) -> Result<(), VerificationError> {
    let len = instructions.len();
    if len == 0 {
        return Err(VerificationError::Empty);
    }
    if len > BPF_MAXINSNS as usize {
        return Err(VerificationError::TooManyInstructions {
            has: len,
            max: BPF_MAXINSNS as usize,
        });
    }

    for (index, instruction) in instructions.iter().enumerate() {
        match instruction {
            Instruction::LoadAccumulator { size, data, .. } => {
                let size = size.bytes();
                if data % size != 0 || !emulator::in_bounds(*data, size) {
                    return Err(VerificationError::InvalidLoad {
                        index,
                        offset: *data,
                        size,
                    });
                }
            }
            Instruction::Jump {
                jump_offset_if_true,
                jump_offset_if_false,
                ..
            } => {
                let furthest = *jump_offset_if_true.max(jump_offset_if_false);
                let target = index + 1 + usize::from(furthest);
                if target >= len {
                    return Err(VerificationError::JumpOutOfBounds { index, target, len });
                }
            }
            Instruction::Return { .. } => {}
        }
    }

    // Every non-return instruction has a successor, so with in-bounds forward jumps this is enough to terminate
    if !matches!(instructions.last(), Some(Instruction::Return { .. })) {
        return Err(VerificationError::MissingReturn);
    }

    Ok(())
}
