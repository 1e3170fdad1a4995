//! Per-architecture constants the filter is built from, resolved when the crate is compiled
//!
//! The first instruction of the filter trusts the audit architecture unconditionally, so generating a filter
//! for the wrong architecture must be impossible: unsupported targets fail to compile.

use std::fmt::Display;

use libc::{EM_386, EM_AARCH64, EM_ARM, EM_X86_64};

#[cfg(not(any(
    target_arch = "x86_64",
    target_arch = "aarch64",
    target_arch = "x86",
    target_arch = "arm"
)))]
compile_error!("unsupported architecture; supported: x86_64, aarch64, x86, arm");

// The ioctl command is read as the first 4 bytes of a 64-bit argument
#[cfg(not(target_endian = "little"))]
compile_error!("only little-endian targets are supported");

/// Architecture whose syscall convention was used for the syscall invocation
///
/// Because numbering of system calls varies between architectures and some architectures (e.g., x86-64)
/// allow user-space code to use the calling conventions of multiple architectures,
/// the filter has to verify the value of the arch field before looking at anything else.
///
/// The arch field is not unique for all calling conventions.
/// The x86-64 ABI and the x32 ABI both use AUDIT_ARCH_X86_64 as arch, and they run on the same processors.
/// Instead, the mask __X32_SYSCALL_BIT is used on the system call number to tell the two ABIs apart,
/// which is why [TargetProfile::has_x32_abi] exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Architecture {
    // AUDIT_ARCH_* = EM_* | __AUDIT_ARCH_64BIT (64-bit only) | __AUDIT_ARCH_LE
    X86_64 = EM_X86_64 as u32 | AUDIT_ARCH_64BIT | AUDIT_ARCH_LE,
    Aarch64 = EM_AARCH64 as u32 | AUDIT_ARCH_64BIT | AUDIT_ARCH_LE,
    X86 = EM_386 as u32 | AUDIT_ARCH_LE,
    Arm = EM_ARM as u32 | AUDIT_ARCH_LE,
}

// linux/audit.h
const AUDIT_ARCH_64BIT: u32 = 0x80000000;
const AUDIT_ARCH_LE: u32 = 0x40000000;

impl Architecture {
    pub const ALL: [Architecture; 4] = [
        Architecture::X86_64,
        Architecture::Aarch64,
        Architecture::X86,
        Architecture::Arm,
    ];

    /// Get the architecture during the compile time
    pub const fn compile_time_arch() -> Self {
        #[cfg(target_arch = "x86_64")]
        let arch = Architecture::X86_64;
        #[cfg(target_arch = "aarch64")]
        let arch = Architecture::Aarch64;
        #[cfg(target_arch = "x86")]
        let arch = Architecture::X86;
        #[cfg(target_arch = "arm")]
        let arch = Architecture::Arm;
        arch
    }

    /// `AUDIT_ARCH_*` value found in `seccomp_data.arch`
    pub const fn audit_arch(self) -> u32 {
        self as u32
    }

    pub const fn name(self) -> &'static str {
        match self {
            Architecture::X86_64 => "x86_64",
            Architecture::Aarch64 => "aarch64",
            Architecture::X86 => "x86",
            Architecture::Arm => "arm",
        }
    }
}

impl Display for Architecture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Bit 30 of the syscall number marks a call made through the x32 ABI
pub const X32_SYSCALL_BIT: u32 = 0x4000_0000;

/// Everything the filter needs to know about its target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetProfile {
    pub arch: Architecture,
    pub ioctl_nr: u32,
    /// The x32 ABI shares the audit arch with x86_64 and has to be rejected by the syscall number
    pub has_x32_abi: bool,
}

impl TargetProfile {
    /// Syscall numbers are part of each architecture's stable ABI and don't depend on the libc the crate is linked against
    pub const fn for_arch(arch: Architecture) -> Self {
        match arch {
            Architecture::X86_64 => Self {
                arch,
                ioctl_nr: 16,
                has_x32_abi: true,
            },
            Architecture::Aarch64 => Self {
                arch,
                ioctl_nr: 29,
                has_x32_abi: false,
            },
            Architecture::X86 | Architecture::Arm => Self {
                arch,
                ioctl_nr: 54,
                has_x32_abi: false,
            },
        }
    }

    /// Profile of the architecture the crate was compiled for
    pub const fn native() -> Self {
        Self::for_arch(Architecture::compile_time_arch())
    }

    pub const fn audit_arch(&self) -> u32 {
        self.arch.audit_arch()
    }
}
