use std::fmt::{self, Debug, Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};

/// A globally unique identifier of a data container (a source buffer, a syntax
/// tree, a compilation).
///
/// Ids are allocated from a single process-wide counter, so two containers
/// created in the same process never collide, and a weak reference carrying an
/// `Id` can always be checked against the container it is presented to without
/// the container exposing a pointer to itself.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Id(u64);

impl Debug for Id {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0, formatter)
    }
}

impl Display for Id {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, formatter)
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::nil()
    }
}

impl Id {
    /// Allocates the next non-nil `Id`.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);

        let next = COUNTER.fetch_add(1, Ordering::SeqCst);

        if next == u64::MAX {
            panic!("Id counter overflow.");
        }

        Self(next)
    }

    /// The identifier reserved for "no container". Never equal to an `Id`
    /// returned by [`Id::new`].
    pub const fn nil() -> Self {
        Self(0)
    }

    pub const fn is_nil(self) -> bool {
        self.0 == 0
    }

    pub const fn into_inner(self) -> u64 {
        self.0
    }
}

/// Implemented by types that own or refer to a uniquely identified container.
pub trait Identifiable {
    fn id(&self) -> Id;
}
