//! Model navigation seen from the viewer

/// Source of "which model is current". The index state machine itself lives
/// with the host; the viewer only reads it.
pub trait ModelNavigator {
    /// Identifier of the current model, `None` when the list is empty
    fn current_model_url(&self) -> Option<String>;

    /// Zero-based index of the current model
    fn current_index(&self) -> usize;

    fn model_count(&self) -> usize;
}
