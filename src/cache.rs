use anyhow::Result;
use once_cell::sync::OnceCell;

/// A cluster model that is trained at most once and then shared read-only.
///
/// Many tile workers may ask for the same model at the same time. The first one
/// trains it while the others block; afterwards every caller gets a reference to
/// the frozen value without locking. A failed training leaves the holder empty
/// so the next caller tries again.
pub struct TrainedModel<T> {
    model: OnceCell<T>,
}

impl<T> TrainedModel<T> {
    pub fn new() -> Self {
        Self {
            model: OnceCell::new(),
        }
    }

    /// The model, if it has been trained already.
    pub fn get(&self) -> Option<&T> {
        self.model.get()
    }

    pub fn get_or_train<F>(&self, train: F) -> Result<&T>
    where
        F: FnOnce() -> Result<T>,
    {
        self.model.get_or_try_init(train)
    }
}

impl<T> Default for TrainedModel<T> {
    fn default() -> Self {
        Self::new()
    }
}
