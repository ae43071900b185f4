//! Read model trait for query-side views.

/// A read model providing query access to state derived from events.
///
/// Read models are updated by event handlers after commit.
pub trait ReadModel: Send + Sync {
    /// Returns the name of this read model.
    fn name(&self) -> &'static str;

    /// Returns the number of entries in this read model.
    fn count(&self) -> usize;
}
