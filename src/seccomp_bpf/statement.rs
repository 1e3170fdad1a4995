use std::mem;

use libc::seccomp_data;

use crate::{
    bpf::{self, instruction::Instruction, primitive::Size},
    seccomp_bpf::action::FilterAction,
};

/// Offsets into `seccomp_data` read by the filter
///
/// ```text
/// struct seccomp_data {
///     int   nr;                   // 0
///     __u32 arch;                 // 4
///     __u64 instruction_pointer;  // 8
///     __u64 args[6];              // 16
/// };
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Offset {
    SyscallNumber = mem::offset_of!(seccomp_data, nr) as u32,
    Architecture = mem::offset_of!(seccomp_data, arch) as u32,
    /// Low 32 bits of `args[1]`; only valid on little-endian targets, big-endian builds are rejected in `profile`
    ///
    /// The filter compares 32-bit words, and the caller controls the upper half of the 64-bit register,
    /// so the command must be read from here and nowhere else (CVE-2019-10063)
    SecondArgumentLow = (mem::offset_of!(seccomp_data, args) + mem::size_of::<u64>()) as u32,
}

/// Loads the `seccomp_data[offset..offset+4]` into the accumulator register
pub fn load_offset(offset: Offset) -> Instruction {
    bpf::statement::load_input(Size::Word, offset as u32)
}

/// Loads the syscall number into the accumulator register
pub fn load_syscall() -> Instruction {
    load_offset(Offset::SyscallNumber)
}

/// Loads the architecture into the accumulator register
pub fn load_architecture() -> Instruction {
    load_offset(Offset::Architecture)
}

/// Loads the `ioctl` request (the second argument), truncated to 32 bits, into the accumulator register
pub fn load_ioctl_command() -> Instruction {
    load_offset(Offset::SecondArgumentLow)
}

pub fn return_action(action: FilterAction) -> Instruction {
    bpf::statement::return_immediate(u32::from(action))
}
