use std::fmt;

/// Identifier of a worker inside one dispatcher.
///
/// Ids are issued by fetch-and-increment starting at 1 and are never reused,
/// not even for attempts whose `create` failed. `WorkerId::INVALID` (raw `0`)
/// is never issued; every lookup rejects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(u64);

impl WorkerId {
    /// The id that is never issued.
    pub const INVALID: WorkerId = WorkerId(0);

    /// Wraps a raw id (e.g. one stored by a caller as a plain integer).
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw id.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Returns false for [`WorkerId::INVALID`].
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl From<u64> for WorkerId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
