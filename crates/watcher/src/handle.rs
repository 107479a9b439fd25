//! Exclusive ownership of native handles
//!
//! Every handle a session acquires (directory, completion event) lives in an
//! [`OwnedHandle`], which closes it exactly once no matter how the session
//! ends.

use std::fmt;
use std::mem::ManuallyDrop;

/// Platform description of a handle type
pub trait HandleKind {
    /// Raw handle value passed to OS calls
    type Raw: Copy + PartialEq + fmt::Debug;

    /// Sentinel stored in an empty wrapper
    const INVALID: Self::Raw;

    /// Whether `raw` refers to a live resource
    fn is_valid(raw: Self::Raw) -> bool;

    /// Release the resource
    ///
    /// # Safety
    /// `raw` must be a valid handle owned by the caller, and must not be
    /// used again afterwards.
    unsafe fn close(raw: Self::Raw);
}

/// Move-only owner of one native handle
pub struct OwnedHandle<K: HandleKind> {
    raw: K::Raw,
}

impl<K: HandleKind> OwnedHandle<K> {
    /// Wrapper that owns nothing
    pub fn invalid() -> Self {
        Self { raw: K::INVALID }
    }

    /// Take ownership of a raw handle
    ///
    /// # Safety
    /// `raw` must be either invalid or a handle nobody else will close.
    pub unsafe fn from_raw(raw: K::Raw) -> Self {
        Self { raw }
    }

    pub fn is_valid(&self) -> bool {
        K::is_valid(self.raw)
    }

    /// Raw value for OS calls; ownership stays with the wrapper
    pub fn as_raw(&self) -> K::Raw {
        self.raw
    }

    /// Close the held handle (if any) and take ownership of `other`
    pub fn replace(&mut self, other: OwnedHandle<K>) {
        self.release();
        self.raw = other.into_raw();
    }

    /// Give up ownership without closing
    pub fn into_raw(self) -> K::Raw {
        let this = ManuallyDrop::new(self);
        this.raw
    }

    fn release(&mut self) {
        if K::is_valid(self.raw) {
            // SAFETY: the wrapper owns the handle and forgets it right after.
            unsafe { K::close(self.raw) };
        }
        self.raw = K::INVALID;
    }
}

impl<K: HandleKind> Default for OwnedHandle<K> {
    fn default() -> Self {
        Self::invalid()
    }
}

impl<K: HandleKind> Drop for OwnedHandle<K> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<K: HandleKind> fmt::Debug for OwnedHandle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OwnedHandle").field(&self.raw).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    thread_local! {
        static CLOSED: RefCell<Vec<i64>> = RefCell::new(Vec::new());
    }

    /// Mirrors Win32: both 0 and -1 are invalid
    enum TestHandle {}

    impl HandleKind for TestHandle {
        type Raw = i64;
        const INVALID: i64 = -1;

        fn is_valid(raw: i64) -> bool {
            raw != -1 && raw != 0
        }

        unsafe fn close(raw: i64) {
            CLOSED.with(|closed| closed.borrow_mut().push(raw));
        }
    }

    fn closed() -> Vec<i64> {
        CLOSED.with(|closed| closed.borrow().clone())
    }

    #[test]
    fn test_drop_closes_valid_handle_once() {
        {
            let handle = unsafe { OwnedHandle::<TestHandle>::from_raw(7) };
            assert!(handle.is_valid());
            assert_eq!(handle.as_raw(), 7);
        }
        assert_eq!(closed(), vec![7]);
    }

    #[test]
    fn test_sentinels_are_never_closed() {
        drop(OwnedHandle::<TestHandle>::invalid());
        drop(unsafe { OwnedHandle::<TestHandle>::from_raw(0) });
        drop(OwnedHandle::<TestHandle>::default());
        assert!(closed().is_empty());
    }

    #[test]
    fn test_replace_releases_previous_handle() {
        let mut handle = unsafe { OwnedHandle::<TestHandle>::from_raw(1) };
        handle.replace(unsafe { OwnedHandle::from_raw(2) });

        assert_eq!(closed(), vec![1]);
        assert_eq!(handle.as_raw(), 2);

        drop(handle);
        assert_eq!(closed(), vec![1, 2]);
    }

    #[test]
    fn test_move_transfers_ownership() {
        let first = unsafe { OwnedHandle::<TestHandle>::from_raw(3) };
        let moved = first;
        assert!(closed().is_empty());

        drop(moved);
        assert_eq!(closed(), vec![3]);
    }

    #[test]
    fn test_into_raw_skips_close() {
        let handle = unsafe { OwnedHandle::<TestHandle>::from_raw(9) };
        assert_eq!(handle.into_raw(), 9);
        assert!(closed().is_empty());
    }
}
