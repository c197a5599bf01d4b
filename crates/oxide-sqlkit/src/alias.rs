//! Table alias allocation.
//!
//! Every table instance, subquery and union receives an alias of the form
//! `tN` when it is created. Aliases come from an [`AliasAllocator`]; the
//! process-wide instance returned by [`AliasAllocator::global`] is used when
//! no allocator is supplied explicitly.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

/// Monotonic source of `t1`, `t2`, ... aliases.
#[derive(Debug, Default)]
pub struct AliasAllocator {
    next: AtomicUsize,
}

impl AliasAllocator {
    /// Creates an allocator starting at `t1`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: AtomicUsize::new(0),
        }
    }

    /// Returns the process-wide allocator.
    pub fn global() -> Arc<Self> {
        static GLOBAL: OnceLock<Arc<AliasAllocator>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Self::new())))
    }

    /// Allocates the next alias.
    pub fn next_alias(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        format!("t{n}")
    }

    /// Restarts numbering at `t1`.
    pub fn reset(&self) {
        self.next.store(0, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_aliases() {
        let aliases = AliasAllocator::new();
        assert_eq!(aliases.next_alias(), "t1");
        assert_eq!(aliases.next_alias(), "t2");
        aliases.reset();
        assert_eq!(aliases.next_alias(), "t1");
    }

    #[test]
    fn test_global_is_shared() {
        let a = AliasAllocator::global();
        let b = AliasAllocator::global();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
