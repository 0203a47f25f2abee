//! The process-wide quit flag.
//!
//! Set by signal handlers or any component that wants the program loop to
//! stop; every blocking loop polls it at bounded intervals. A second signal
//! during shutdown force-exits.

use std::sync::atomic::{AtomicBool, Ordering};

use log::info;

static QUIT: AtomicBool = AtomicBool::new(false);

/// Whether a quit was requested.
#[inline]
pub fn poll_quit() -> bool {
    QUIT.load(Ordering::Relaxed)
}

/// Request the program loop to stop after the current cycle.
pub fn set_quit() {
    if !QUIT.swap(true, Ordering::Relaxed) {
        info!("quitting application on next cycle...");
    }
}

/// Clear the flag, for restarting the loop in tests and tools.
pub fn reset_quit() {
    QUIT.store(false, Ordering::Relaxed);
}

/// Route termination signals to the quit flag. A second signal while already
/// quitting exits immediately with status -2.
pub fn install_signal_handlers() -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(|| {
        if poll_quit() {
            eprintln!("received a second signal while quitting; forcing exit");
            std::process::exit(-2);
        }
        set_quit();
    })
}
