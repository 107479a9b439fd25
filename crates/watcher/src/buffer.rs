//! Notification buffer ownership

use dirwatch_core::WatchError;
use std::fmt;

/// DWORD-aligned heap buffer the OS fills with change records
pub struct NotifyBuffer {
    words: Vec<u32>,
    len: usize,
}

impl NotifyBuffer {
    /// Allocate a zeroed buffer of `bytes` bytes
    ///
    /// Allocation failure is reported as [`WatchError::ResourceExhausted`].
    pub fn new(bytes: usize) -> Result<Self, WatchError> {
        let word_count = bytes / 4 + usize::from(bytes % 4 != 0);

        let mut words = Vec::new();
        words
            .try_reserve_exact(word_count)
            .map_err(|_| WatchError::ResourceExhausted { requested: bytes })?;
        words.resize(word_count, 0);

        Ok(Self { words, len: bytes })
    }

    /// Replace the allocation with a new one of `bytes` bytes
    pub fn reallocate(&mut self, bytes: usize) -> Result<(), WatchError> {
        *self = Self::new(bytes)?;
        Ok(())
    }

    /// Capacity in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: `words` holds at least `len` initialized bytes and u8 has
        // no alignment requirement.
        unsafe { std::slice::from_raw_parts(self.words.as_ptr().cast::<u8>(), self.len) }
    }

    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        // SAFETY: as above, with unique access through `&mut self`.
        unsafe { std::slice::from_raw_parts_mut(self.words.as_mut_ptr().cast::<u8>(), self.len) }
    }

    /// Start of the allocation, for handing to the OS
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.words.as_mut_ptr().cast()
    }
}

impl fmt::Debug for NotifyBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotifyBuffer").field("len", &self.len).finish()
    }
}
