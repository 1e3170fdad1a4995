use libc::{
    SECCOMP_RET_ACTION_FULL, SECCOMP_RET_ALLOW, SECCOMP_RET_DATA, SECCOMP_RET_ERRNO,
    SECCOMP_RET_KILL_PROCESS,
};

/// A value that describes what to do with a system call
///
/// The upper 16 bits of a filter's return value select the action, the lower 16 bits (`SECCOMP_RET_DATA`)
/// carry the action's argument. Only the three actions the tty injection filter returns are modelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterAction {
    /// This value results in immediate termination of the process, with a core dump. The system call is not executed.
    /// All threads in the thread group are terminated.
    ///
    /// The process terminates as though killed by a SIGSYS signal.
    /// Even if a signal handler has been registered for SIGSYS, the handler will be ignored in this case and the process always terminates.
    ///
    /// Available since Linux 4.14
    KillProcess,

    /// This value results in the SECCOMP_RET_DATA portion of the filter's return value being passed to user space as the errno value
    /// without executing the system call.
    Errno { errno: u16 },

    /// This value results in the system call being executed.
    Allow,
}

/// The return value carried a `SECCOMP_RET_*` action this crate never emits: {0:#010x}
#[derive(Debug, thiserror::Error, displaydoc::Display, PartialEq, Eq)]
pub struct UnknownActionError(pub u32);

impl FilterAction {
    /// `EPERM`, the errno returned for every denied call
    pub const DENY: FilterAction = FilterAction::Errno {
        errno: libc::EPERM as u16,
    };

    pub fn action(&self) -> u32 {
        match self {
            FilterAction::KillProcess => SECCOMP_RET_KILL_PROCESS,
            FilterAction::Errno { .. } => SECCOMP_RET_ERRNO,
            FilterAction::Allow => SECCOMP_RET_ALLOW,
        }
    }
}

impl From<FilterAction> for u32 {
    fn from(value: FilterAction) -> Self {
        match value {
            FilterAction::Errno { errno } => value.action() | (u32::from(errno) & SECCOMP_RET_DATA),
            _ => value.action(),
        }
    }
}

impl TryFrom<u32> for FilterAction {
    type Error = UnknownActionError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        // the data bits of KILL_PROCESS and ALLOW are ignored by the kernel
        match value & SECCOMP_RET_ACTION_FULL {
            SECCOMP_RET_KILL_PROCESS => Ok(FilterAction::KillProcess),
            SECCOMP_RET_ALLOW => Ok(FilterAction::Allow),
            SECCOMP_RET_ERRNO => Ok(FilterAction::Errno {
                errno: (value & SECCOMP_RET_DATA) as u16,
            }),
            _ => Err(UnknownActionError(value)),
        }
    }
}
