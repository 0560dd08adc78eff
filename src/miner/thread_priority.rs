use crate::prelude::*;

/// Lower the scheduling priority of the calling thread so mining yields to
/// interactive work.
#[cfg(windows)]
pub fn set_low_priority() {
    use winapi::um::processthreadsapi::*;

    // THREAD_PRIORITY_BELOW_NORMAL
    let ok = unsafe { SetThreadPriority(GetCurrentThread(), -1) };

    if ok == 0 {
        warn!("Couldn't lower worker thread priority");
    } else {
        debug!("Lowered worker thread priority");
    }
}

/// Lower the scheduling priority of the calling thread so mining yields to
/// interactive work.
#[cfg(unix)]
pub fn set_low_priority() {
    use libc::*;

    // on linux, `who = 0` is the calling thread rather than the whole process
    let result = unsafe { setpriority(PRIO_PROCESS as _, 0, 5) };

    if result == 0 {
        debug!("Lowered worker thread priority");
    } else {
        warn!(
            "Couldn't lower worker thread priority: {}",
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(not(any(windows, unix)))]
pub fn set_low_priority() {}
