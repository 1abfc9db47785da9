//! Best-effort pinning of worker threads to logical processors.

/// Whether this platform can pin threads at all.
pub const SUPPORTED: bool = cfg!(target_os = "linux");

/// Pins the calling thread to logical processor `cpu`.
/// Returns false, and leaves the thread alone, when pinning is unsupported or refused.
#[cfg(target_os = "linux")]
pub fn pin_current_thread(cpu: usize) -> bool {
    // SAFETY: `set` is a plain bitset owned by this frame, and `CPU_SETSIZE` bounds the index.
    unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(cpu % libc::CPU_SETSIZE as usize, &mut set);
        libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set) == 0
    }
}

#[cfg(not(target_os = "linux"))]
pub fn pin_current_thread(_cpu: usize) -> bool {
    false
}
