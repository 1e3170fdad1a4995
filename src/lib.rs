#![doc = include_str!("./../README.md")]

pub mod bpf;

pub mod output;

pub mod profile;

pub use profile::{Architecture, TargetProfile};

pub mod seccomp_bpf;

pub use seccomp_bpf::action::FilterAction;
pub use seccomp_bpf::filter::{
    BLOCKED_IOCTLS, FilterError, TIOCLINUX, TIOCSTI, tty_injection_filter,
};
pub use seccomp_bpf::program::{Program, ReadError, VerificationError};
