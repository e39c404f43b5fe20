//! Window size related types and constants

use std::fmt;

/// A sender MUST NOT allow a flow-control window to exceed 2^31-1 octets.
pub const MAX_WINDOW_SIZE: u32 = 0x7fffffff;

/// Window size of a stream or connection before any `SETTINGS` or `WINDOW_UPDATE`.
pub const DEFAULT_WINDOW_SIZE: u32 = 65_535;

/// Size of a flow control window.
///
/// The size may legitimately become negative when the peer shrinks its initial
/// window size, so it is kept as `i32`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct WindowSize(i32);

impl WindowSize {
    pub fn new(size: i32) -> WindowSize {
        WindowSize(size)
    }

    pub fn size(&self) -> i32 {
        self.0
    }

    /// Add or subtract window size, fail if the result exceeds 2^31-1.
    pub fn try_add(&mut self, delta: i32) -> Result<(), ()> {
        self.0 = self.0.checked_add(delta).ok_or(())?;
        Ok(())
    }

    /// Increase by a `WINDOW_UPDATE` increment.
    pub fn try_increase(&mut self, delta: u32) -> Result<(), ()> {
        if delta > MAX_WINDOW_SIZE || delta == 0 {
            return Err(());
        }
        self.try_add(delta as i32)
    }

    /// Consume `delta` octets, fail if the window would go below zero.
    pub fn try_decrease_to_non_negative(&mut self, delta: u32) -> Result<(), ()> {
        if delta > MAX_WINDOW_SIZE {
            return Err(());
        }
        match self.0.checked_sub(delta as i32) {
            Some(new) if new >= 0 => {
                self.0 = new;
                Ok(())
            }
            _ => Err(()),
        }
    }
}

impl fmt::Display for WindowSize {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Receive side of a flow control window.
///
/// Received `DATA` is charged against the window and counted as consumed
/// immediately; once half of the initial window has been consumed the whole
/// consumed amount is returned to the peer with a `WINDOW_UPDATE`.
#[derive(Debug, Clone)]
pub(crate) struct InWindow {
    size: WindowSize,
    initial: u32,
    consumed: u32,
}

impl InWindow {
    pub fn new(initial: u32) -> InWindow {
        InWindow {
            size: WindowSize::new(initial as i32),
            initial,
            consumed: 0,
        }
    }

    pub fn size(&self) -> i32 {
        self.size.size()
    }

    /// Charge received payload. Error means the peer overran the window.
    pub fn recv(&mut self, len: u32) -> Result<(), ()> {
        self.size.try_decrease_to_non_negative(len)?;
        self.consumed += len;
        Ok(())
    }

    /// Increment to send in a `WINDOW_UPDATE`, if one is due.
    pub fn take_update(&mut self) -> Option<u32> {
        if self.consumed == 0 || self.consumed < self.initial / 2 {
            return None;
        }
        let increment = self.consumed;
        self.consumed = 0;
        match self.size.try_increase(increment) {
            Ok(()) => Some(increment),
            Err(()) => None,
        }
    }
}
