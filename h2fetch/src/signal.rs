//! Process signal setup for the duration of a run.

/// Ignores `SIGPIPE` while alive; the previous disposition is restored on drop.
///
/// Writing to a connection the peer already closed then fails with `EPIPE`
/// instead of killing the process.
#[derive(Debug)]
pub struct IgnoreSigpipe {
    #[cfg(unix)]
    previous: libc::sighandler_t,
}

impl IgnoreSigpipe {
    #[cfg(unix)]
    pub fn new() -> IgnoreSigpipe {
        let previous = unsafe { libc::signal(libc::SIGPIPE, libc::SIG_IGN) };
        debug!("SIGPIPE ignored");
        IgnoreSigpipe { previous }
    }

    #[cfg(not(unix))]
    pub fn new() -> IgnoreSigpipe {
        IgnoreSigpipe {}
    }
}

impl Drop for IgnoreSigpipe {
    fn drop(&mut self) {
        #[cfg(unix)]
        unsafe {
            if self.previous != libc::SIG_ERR {
                libc::signal(libc::SIGPIPE, self.previous);
            }
        }
    }
}

#[cfg(all(test, unix))]
mod test {
    use super::*;

    fn current() -> libc::sighandler_t {
        unsafe {
            let prev = libc::signal(libc::SIGPIPE, libc::SIG_IGN);
            libc::signal(libc::SIGPIPE, prev);
            prev
        }
    }

    #[test]
    fn restored_on_drop() {
        let before = current();
        {
            let _guard = IgnoreSigpipe::new();
            assert_eq!(libc::SIG_IGN, current());
        }
        assert_eq!(before, current());
    }
}
