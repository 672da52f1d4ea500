/// How "no data available" is interpreted for a byte source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceKind {
    /// Regular file: no data means end of input.
    #[default]
    File,
    /// Pipe or FIFO: no data means idle; input ends at the EOT marker.
    Pipe,
}

/// Restores a descriptor's original status flags when dropped.
///
/// The descriptor must outlive the guard.
#[cfg(unix)]
#[derive(Debug)]
#[must_use = "the descriptor goes back to its original mode when the guard is dropped"]
pub struct NonBlockingGuard {
    fd: std::os::fd::RawFd,
    flags: libc::c_int,
}

#[cfg(unix)]
impl Drop for NonBlockingGuard {
    fn drop(&mut self) {
        // SAFETY: F_SETFL only updates the status flags of `fd` and does not
        // touch memory; a descriptor closed in the meantime yields EBADF.
        let rc = unsafe { libc::fcntl(self.fd, libc::F_SETFL, self.flags) };
        if rc < 0 {
            tracing::warn!(
                fd = self.fd,
                error = %std::io::Error::last_os_error(),
                "could not restore descriptor flags"
            );
        }
    }
}

/// Put a descriptor into non-blocking mode so idle pipes yield `WouldBlock`.
///
/// The previous mode comes back when the returned guard is dropped, so a
/// descriptor shared with the parent process (such as stdin) is left as it
/// was found.
#[cfg(unix)]
pub fn set_nonblocking(fd: &impl std::os::fd::AsRawFd) -> std::io::Result<NonBlockingGuard> {
    let raw = fd.as_raw_fd();
    let flags = status_flags(raw)?;
    // SAFETY: `raw` is a valid open descriptor borrowed from `fd`; F_SETFL
    // does not touch memory.
    let rc = unsafe { libc::fcntl(raw, libc::F_SETFL, flags | libc::O_NONBLOCK) };
    if rc < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(NonBlockingGuard { fd: raw, flags })
}

#[cfg(unix)]
fn status_flags(fd: std::os::fd::RawFd) -> std::io::Result<libc::c_int> {
    // SAFETY: F_GETFL reads the status flags of `fd` and does not touch memory.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(flags)
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::{ErrorKind, Read};
    use std::os::fd::{AsRawFd, FromRawFd};

    use super::*;

    fn pipe() -> (std::fs::File, std::fs::File) {
        let mut fds = [0; 2];
        // SAFETY: `fds` has room for the two descriptors pipe(2) writes.
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        // SAFETY: both descriptors were just created and are owned here.
        unsafe {
            (
                std::fs::File::from_raw_fd(fds[0]),
                std::fs::File::from_raw_fd(fds[1]),
            )
        }
    }

    fn is_nonblocking(file: &std::fs::File) -> bool {
        status_flags(file.as_raw_fd()).unwrap() & libc::O_NONBLOCK != 0
    }

    #[test]
    fn nonblocking_empty_pipe_would_block() {
        let (mut read_end, _write_end) = pipe();

        let _guard = set_nonblocking(&read_end).unwrap();
        let mut buf = [0u8; 8];
        let err = read_end.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WouldBlock);
    }

    #[test]
    fn dropping_the_guard_restores_blocking_mode() {
        let (read_end, _write_end) = pipe();
        assert!(!is_nonblocking(&read_end));

        let guard = set_nonblocking(&read_end).unwrap();
        assert!(is_nonblocking(&read_end));

        drop(guard);
        assert!(!is_nonblocking(&read_end));
    }
}
