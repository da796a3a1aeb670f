//! Process-wide Ctrl+C flag.
//!
//! Long-running stages (clip polling, narration, the ffmpeg render) check
//! [`ctrlc_received`] and stop early once it is set.

use std::sync::atomic::{AtomicBool, Ordering};

/// Global flag for handling Ctrl+C across the application
static CTRLC_RECEIVED: AtomicBool = AtomicBool::new(false);

/// Check if Ctrl+C has been received.
pub fn ctrlc_received() -> bool {
    CTRLC_RECEIVED.load(Ordering::SeqCst)
}

/// Raise the flag, as the Ctrl+C handler does.
pub fn request_interrupt() {
    CTRLC_RECEIVED.store(true, Ordering::SeqCst);
}

/// Set up the Ctrl+C handler.
///
/// This should be called once at program startup.
pub fn setup_ctrlc_handler() -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || {
        request_interrupt();
        eprintln!("\nReceived Ctrl+C, stopping...");
    })
}
