//! Identity for records the client holds on to across updates.

/// Something whose identity survives changes to its other fields.
pub trait Entity {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;

    /// True when `other` is a newer (or older) version of the same record.
    fn same_identity(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}
