#[cfg(not(target_os = "android"))]
use libc::{BPF_ABS, BPF_JEQ, BPF_JMP, BPF_JSET, BPF_K, BPF_LD, BPF_RET, BPF_W};

#[cfg(target_os = "android")]
mod bpf_flags {
    use libc::__u32;

    // linux/bpf_common.h
    pub const BPF_LD: __u32 = 0x00;
    pub const BPF_JMP: __u32 = 0x05;
    pub const BPF_RET: __u32 = 0x06;

    pub const BPF_W: __u32 = 0x00;
    pub const BPF_ABS: __u32 = 0x20;

    pub const BPF_JEQ: __u32 = 0x10;
    pub const BPF_JSET: __u32 = 0x40;
    pub const BPF_K: __u32 = 0x00;
}

#[cfg(target_os = "android")]
use bpf_flags::*;

/// Instruction classes, the low 3 bits of the opcode
///
/// Only the classes the filter needs are listed; seccomp accepts a few more (ALU, scratch memory, index register)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum InstructionType {
    LoadAccumulator = BPF_LD as u16,
    Jump = BPF_JMP as u16,
    Return = BPF_RET as u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum AddressingMode {
    /// Offset into the `seccomp_data` passed to the program
    ProgramInput = BPF_ABS as u16,
}

/// The `BPF_H` and `BPF_B` size modifiers are not supported by the seccomp: all operations must load and store (4-byte) words (`BPF_W`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Size {
    Word = BPF_W as u16,
}

impl Size {
    pub const fn bytes(self) -> u32 {
        match self {
            Size::Word => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Condition {
    /// `==`
    Equal = BPF_JEQ as u16,
    /// Jump if `dst & src`
    BitSet = BPF_JSET as u16,
}

impl Condition {
    pub const fn holds(self, accumulator: u32, data: u32) -> bool {
        match self {
            Condition::Equal => accumulator == data,
            Condition::BitSet => accumulator & data != 0,
        }
    }
}

// Used by the jump instructions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Operand {
    Immediate = BPF_K as u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ReturnValue {
    Immediate = BPF_K as u16,
}
