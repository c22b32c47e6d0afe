/// Lifecycle of a cached query result.
///
/// Fetching -> Resident on success, Fetching -> Failed on error. A failed
/// entry stays failed until the next explicit request for the same key.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ResidencyState {
    Fetching,
    Resident,
    Failed,
}

impl ResidencyState {
    pub fn is_settled(self) -> bool {
        !matches!(self, ResidencyState::Fetching)
    }
}
