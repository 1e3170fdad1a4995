//! Classic BPF interpreter limited to the instructions this crate emits
//!
//! Lets a filter be checked against synthetic `seccomp_data` records without attaching it to a process.

use std::mem;

use libc::seccomp_data;

use crate::{
    bpf::instruction::Instruction,
    seccomp_bpf::action::{FilterAction, UnknownActionError},
};

const INPUT_SIZE: usize = mem::size_of::<seccomp_data>();

#[derive(Debug, thiserror::Error, displaydoc::Display, PartialEq, Eq)]
pub enum EmulationError {
    /// instruction {index} reads {size} bytes at offset {offset}, outside of seccomp_data
    LoadOutOfBounds { index: usize, offset: u32, size: u32 },
    /// instruction {index} jumps to {target}, past the end of the program
    JumpOutOfBounds { index: usize, target: usize },
    /// execution ran past the last instruction
    FellOffEnd,
    /// {0}
    UnknownAction(#[from] UnknownActionError),
}

/// Whether `size` bytes at `offset` lie inside `seccomp_data`
pub fn in_bounds(offset: u32, size: u32) -> bool {
    u64::from(offset) + u64::from(size) <= INPUT_SIZE as u64
}

/// Lays out `seccomp_data` the way the kernel hands it to the filter, in native byte order
pub fn input_bytes(data: &seccomp_data) -> [u8; INPUT_SIZE] {
    let mut bytes = [0; INPUT_SIZE];
    let nr = mem::offset_of!(seccomp_data, nr);
    let arch = mem::offset_of!(seccomp_data, arch);
    let ip = mem::offset_of!(seccomp_data, instruction_pointer);
    let args = mem::offset_of!(seccomp_data, args);

    bytes[nr..nr + 4].copy_from_slice(&data.nr.to_ne_bytes());
    bytes[arch..arch + 4].copy_from_slice(&data.arch.to_ne_bytes());
    bytes[ip..ip + 8].copy_from_slice(&data.instruction_pointer.to_ne_bytes());
    for (i, arg) in data.args.iter().enumerate() {
        let start = args + i * 8;
        bytes[start..start + 8].copy_from_slice(&arg.to_ne_bytes());
    }
    bytes
}

pub fn run(
    instructions: &[Instruction],
    data: &seccomp_data,
) -> Result<FilterAction, EmulationError> {
    let input = input_bytes(data);
    let mut accumulator: u32 = 0;
    let mut pc = 0;

    while let Some(instruction) = instructions.get(pc) {
        match instruction {
            Instruction::LoadAccumulator { size, data, .. } => {
                let size = size.bytes();
                if !in_bounds(*data, size) {
                    return Err(EmulationError::LoadOutOfBounds {
                        index: pc,
                        offset: *data,
                        size,
                    });
                }
                let start = *data as usize;
                let mut word = [0; 4];
                word.copy_from_slice(&input[start..start + 4]);
                accumulator = u32::from_ne_bytes(word);
                pc += 1;
            }
            Instruction::Jump {
                condition,
                data,
                jump_offset_if_true,
                jump_offset_if_false,
                ..
            } => {
                let offset = if condition.holds(accumulator, *data) {
                    jump_offset_if_true
                } else {
                    jump_offset_if_false
                };
                let target = pc + 1 + usize::from(*offset);
                if target >= instructions.len() {
                    return Err(EmulationError::JumpOutOfBounds { index: pc, target });
                }
                pc = target;
            }
            Instruction::Return { data, .. } => return Ok(FilterAction::try_from(*data)?),
        }
    }

    Err(EmulationError::FellOffEnd)
}
