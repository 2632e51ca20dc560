//! Utility functions for socket operations

/// Check if running as root
pub fn is_root() -> bool {
    #[cfg(unix)]
    {
        // SAFETY: geteuid has no preconditions and cannot fail.
        unsafe { libc::geteuid() == 0 }
    }
    #[cfg(not(unix))]
    {
        false
    }
}

/// Command line to suggest when a raw socket could not be opened
pub fn sudo_hint() -> String {
    format!(
        "sudo {}",
        std::env::args().collect::<Vec<_>>().join(" ")
    )
}
