//! Frame flag bitmasks.

use std::fmt;
use std::marker;

/// A flag that can be set on a particular frame type.
pub trait Flag: fmt::Debug + Copy + 'static {
    /// Bitmask of this flag in the frame header flags octet.
    fn bitmask(&self) -> u8;

    /// All flags known for the frame type.
    fn flags() -> &'static [Self];

    fn to_flags(&self) -> Flags<Self> {
        Flags::new(self.bitmask())
    }
}

/// Flag type for frames which define no flags.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum NoFlag {}

impl Flag for NoFlag {
    fn bitmask(&self) -> u8 {
        match *self {}
    }

    fn flags() -> &'static [Self] {
        &[]
    }
}

/// Set of flags of a frame, packed into the header octet.
///
/// Unknown bits are preserved on parse, as required for forward compatibility.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Flags<F: Flag>(pub u8, marker::PhantomData<F>);

impl<F: Flag> Flags<F> {
    pub fn new(value: u8) -> Flags<F> {
        Flags(value, marker::PhantomData)
    }

    pub fn is_set(&self, flag: F) -> bool {
        self.0 & flag.bitmask() != 0
    }

    pub fn set(&mut self, flag: F) {
        self.0 |= flag.bitmask();
    }

    pub fn with(mut self, flag: F) -> Flags<F> {
        self.set(flag);
        self
    }
}

impl<F: Flag> Default for Flags<F> {
    fn default() -> Self {
        Flags::new(0)
    }
}

impl<F: Flag> fmt::Debug for Flags<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let set: Vec<F> = F::flags()
            .iter()
            .cloned()
            .filter(|flag| self.is_set(*flag))
            .collect();
        f.debug_tuple("Flags").field(&set).finish()
    }
}
