//! Proactor and file configuration options

/// Permission bits used when a write open creates the file
pub const DEFAULT_FILE_MODE: u32 = 0o644;

/// Proactor configuration options
///
/// Use the builder pattern to customize the ring:
///
/// ```no_run
/// use aura_fs::Options;
///
/// let opts = Options::new()
///     .queue_depth(512)
///     .enable_sqpoll(true);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub(crate) queue_depth: u32,
    pub(crate) sqpoll: bool,
    pub(crate) sqpoll_idle_ms: u32,
}

impl Default for Options {
    fn default() -> Self {
        Self::new()
    }
}

impl Options {
    /// Create new options with default values
    pub fn new() -> Self {
        Self {
            queue_depth: 256,
            sqpoll: false,
            sqpoll_idle_ms: 1000,
        }
    }

    /// Set the submission queue depth (default: 256)
    ///
    /// The kernel rounds this up to a power of two.
    pub fn queue_depth(mut self, depth: u32) -> Self {
        self.queue_depth = depth;
        self
    }

    /// Enable SQPOLL mode (requires root or CAP_SYS_NICE)
    pub fn enable_sqpoll(mut self, enable: bool) -> Self {
        self.sqpoll = enable;
        self
    }

    /// Set SQPOLL idle timeout in milliseconds (default: 1000)
    pub fn sqpoll_idle_ms(mut self, timeout: u32) -> Self {
        self.sqpoll_idle_ms = timeout;
        self
    }

    /// Configured queue depth
    pub fn get_queue_depth(&self) -> u32 {
        self.queue_depth
    }
}

/// Options for [`open_write`](crate::open_write)
///
/// The default truncates an existing file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Append to an existing file instead of truncating it
    pub append: bool,
}

impl WriteOptions {
    /// Truncating write options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set append mode
    pub fn append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    /// Open flags for these options
    pub(crate) fn open_flags(&self) -> i32 {
        let flags = libc::O_CREAT | libc::O_WRONLY | libc::O_CLOEXEC;
        if self.append {
            flags | libc::O_APPEND
        } else {
            flags | libc::O_TRUNC
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_default() {
        let opts = Options::default();
        assert_eq!(opts, Options::new());
        assert_eq!(opts.get_queue_depth(), 256);
        assert!(!opts.sqpoll);
    }

    #[test]
    fn test_options_builder_chain() {
        let opts = Options::new()
            .queue_depth(64)
            .enable_sqpoll(true)
            .sqpoll_idle_ms(50);
        assert_eq!(opts.queue_depth, 64);
        assert!(opts.sqpoll);
        assert_eq!(opts.sqpoll_idle_ms, 50);
    }

    #[test]
    fn test_write_options_truncate_by_default() {
        let flags = WriteOptions::default().open_flags();
        assert_ne!(flags & libc::O_TRUNC, 0);
        assert_eq!(flags & libc::O_APPEND, 0);
        assert_ne!(flags & libc::O_CREAT, 0);
        assert_ne!(flags & libc::O_WRONLY, 0);
        assert_ne!(flags & libc::O_CLOEXEC, 0);
    }

    #[test]
    fn test_write_options_append_suppresses_truncate() {
        let flags = WriteOptions::new().append(true).open_flags();
        assert_ne!(flags & libc::O_APPEND, 0);
        assert_eq!(flags & libc::O_TRUNC, 0);
    }
}
