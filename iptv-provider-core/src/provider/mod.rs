pub mod base;
pub mod binding;
pub(crate) mod identity;

use std::sync::atomic::{AtomicBool, Ordering};

static CHAN_DEPRECATION_WARNED: AtomicBool = AtomicBool::new(false);

/// Log the `chan()` deprecation once per process.
pub(crate) fn warn_chan_deprecated() {
    if !CHAN_DEPRECATION_WARNED.swap(true, Ordering::Relaxed) {
        log::warn!(".chan() is deprecated, please use .bind_to_channel()");
    }
}
