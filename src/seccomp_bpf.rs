//! seccomp specific layer on top of [crate::bpf]: the `seccomp_data` offsets, the return actions,
//! the verified [program::Program] and the tty injection [filter]

pub mod action;
pub mod emulator;
pub mod filter;
pub mod program;
pub mod statement;
