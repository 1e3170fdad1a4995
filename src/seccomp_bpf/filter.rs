use log::debug;

use crate::{
    bpf::{
        instruction::Instruction,
        statement::{
            IfCondition, StatementError, if_any_else_statement, if_not_statement, if_statement,
        },
    },
    profile::{TargetProfile, X32_SYSCALL_BIT},
    seccomp_bpf::{
        action::FilterAction,
        program::{Program, VerificationError},
        statement::{load_architecture, load_ioctl_command, load_syscall, return_action},
    },
};

/// Inject a byte into the terminal input queue
pub const TIOCSTI: u32 = 0x5412;
/// Console subfunctions, including selection paste into the input queue (CVE-2023-1523)
pub const TIOCLINUX: u32 = 0x541c;

/// `ioctl` requests the filter denies
pub const BLOCKED_IOCTLS: [u32; 2] = [TIOCSTI, TIOCLINUX];

#[derive(Debug, thiserror::Error, displaydoc::Display, PartialEq, Eq)]
pub enum FilterError {
    /// cannot assemble the filter: {0}
    Statement(#[from] StatementError),
    /// assembled filter is not valid: {0}
    Verification(#[from] VerificationError),
}

/// Builds the filter that denies the terminal injection ioctls and allows everything else
///
/// ```text
///     ld  [arch]
///     jeq #AUDIT_ARCH, 1, 0
///     ret #KILL_PROCESS
///     ld  [nr]
///     jset #X32_SYSCALL_BIT, 0, 1     ; x86_64 only
///     ret #ERRNO(EPERM)               ; x86_64 only
///     jeq #__NR_ioctl, 1, 0
///     ret #ALLOW
///     ld  [args[1] low]
///     jeq #TIOCSTI, 2, 0
///     jeq #TIOCLINUX, 1, 0
///     ret #ALLOW
///     ret #ERRNO(EPERM)
/// ```
///
/// Each check relies on the previous ones: offsets and syscall numbers mean nothing until the architecture is known,
/// and an x32 call must not reach the syscall number comparison.
pub fn tty_injection_filter(profile: &TargetProfile) -> Result<Program, FilterError> {
    let mut ixs = verify_architecture(profile)?;

    ixs.push(load_syscall());
    if profile.has_x32_abi {
        // the x32 numbering is not covered by the checks below, deny it as a whole
        ixs.extend(if_statement(
            IfCondition::bit_set(X32_SYSCALL_BIT),
            vec![return_action(FilterAction::DENY)],
        )?);
    }
    ixs.extend(if_not_statement(
        IfCondition::eq(profile.ioctl_nr),
        vec![return_action(FilterAction::Allow)],
    )?);

    ixs.push(load_ioctl_command());
    ixs.extend(if_any_else_statement(
        BLOCKED_IOCTLS.into_iter().map(IfCondition::eq).collect(),
        vec![return_action(FilterAction::DENY)],
        vec![return_action(FilterAction::Allow)],
    )?);

    let program = Program::new(ixs)?;
    debug!(
        "built {} instruction filter for {} (x32 rejected: {})",
        program.len(),
        profile.arch,
        profile.has_x32_abi
    );
    Ok(program)
}

fn verify_architecture(profile: &TargetProfile) -> Result<Vec<Instruction>, StatementError> {
    // A register: arch value
    let mut ixs = vec![load_architecture()];
    // (A = runtime arch value) != (Immediate = filter arch value) => kill, a foreign arch can't be reasoned about
    ixs.extend(if_not_statement(
        IfCondition::eq(profile.audit_arch()),
        vec![return_action(FilterAction::KillProcess)],
    )?);
    Ok(ixs)
}
