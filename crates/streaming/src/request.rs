/// Identifies one fetch started by a [`crate::QueryCache`].
///
/// A pending entry remembers the request that created it so a late waiter
/// never settles an entry that was invalidated and re-requested meanwhile.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Request(pub u64);
