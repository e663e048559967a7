//! Ctrl-C handling.
//!
//! SIGINT reaches FFmpeg through the shared process group, so we only need
//! to remember that it happened and let the run unwind to cleanup.

use std::sync::atomic::{AtomicBool, Ordering};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_sigint(_signum: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Install the SIGINT handler. Call once at startup.
pub fn install() {
    let handler = on_sigint as extern "C" fn(libc::c_int);
    unsafe {
        libc::signal(libc::SIGINT, handler as libc::sighandler_t);
    }
}

/// Whether SIGINT was received since startup
pub fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}
