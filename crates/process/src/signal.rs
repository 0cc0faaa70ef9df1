//! Process-group signalling.
//!
//! Every supervised command is the leader of its own process group, so
//! signalling the group also reaches the children the shell forked.

#[cfg(unix)]
fn signal_group(pid: u32, signal: libc::c_int) -> bool {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // SAFETY: killpg takes plain integers and has no memory-safety
    // preconditions; a stale pgid only yields ESRCH.
    let ret = unsafe { libc::killpg(pgid, signal) };
    if ret != 0 {
        let error = std::io::Error::last_os_error();
        // ESRCH: the group is already gone.
        if error.raw_os_error() != Some(libc::ESRCH) {
            tracing::debug!(pid, signal, error = %error, "killpg failed");
        }
    }
    ret == 0
}

/// Send SIGTERM to the group led by `pid`.
#[cfg(unix)]
pub(crate) fn terminate_group(pid: u32) -> bool {
    signal_group(pid, libc::SIGTERM)
}

/// Send SIGKILL to the group led by `pid`.
#[cfg(unix)]
pub(crate) fn kill_group(pid: u32) -> bool {
    signal_group(pid, libc::SIGKILL)
}

#[cfg(not(unix))]
pub(crate) fn terminate_group(_pid: u32) -> bool {
    false
}

#[cfg(not(unix))]
pub(crate) fn kill_group(_pid: u32) -> bool {
    false
}
