//! Reconnection backoff (S4.H: "bounded exponential backoff with jitter on repeated failures; a
//! successful open resets the backoff").

use std::{ops::DerefMut, time::Duration};

use backon::{Backoff, BackoffBuilder};

/// A [`Backoff`] that can also be reset back to its first delay.
///
/// Implemented by [`ResettableBackoffWrapper`].
// Separated into a trait so that it can be used as a trait object, erasing the backing [`BackoffBuilder`].
pub trait ResettableBackoff: Backoff {
    /// Discard the in-progress backoff sequence; the next `next()` call starts over from the
    /// builder's first delay.
    fn reset(&mut self);
}

impl ResettableBackoff for Box<dyn ResettableBackoff + Send> {
    fn reset(&mut self) {
        Box::deref_mut(self).reset();
    }
}

/// Implements [`ResettableBackoff`] by reconstructing the backing [`Backoff`] each time
/// [`ResettableBackoff::reset`] has been called.
#[derive(Debug)]
pub struct ResettableBackoffWrapper<B: BackoffBuilder> {
    backoff_builder: B,
    current_backoff: Option<B::Backoff>,
}

impl<B: BackoffBuilder> ResettableBackoffWrapper<B> {
    /// Wrap a backoff builder; the first `next()` call builds the initial [`Backoff`].
    pub fn new(backoff_builder: B) -> Self {
        Self {
            backoff_builder,
            current_backoff: None,
        }
    }
}

impl<B: BackoffBuilder + Default> Default for ResettableBackoffWrapper<B> {
    fn default() -> Self {
        Self::new(B::default())
    }
}

impl<B: BackoffBuilder + Clone> Iterator for ResettableBackoffWrapper<B> {
    type Item = Duration;

    fn next(&mut self) -> Option<Self::Item> {
        self.current_backoff
            .get_or_insert_with(|| self.backoff_builder.clone().build())
            .next()
    }
}

impl<B: BackoffBuilder + Clone> ResettableBackoff for ResettableBackoffWrapper<B> {
    fn reset(&mut self) {
        self.current_backoff = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backon::ConstantBuilder;

    #[test]
    fn reset_restarts_the_sequence() {
        let builder = ConstantBuilder::default()
            .with_delay(Duration::from_millis(10))
            .with_max_times(3);
        let mut backoff = ResettableBackoffWrapper::new(builder);
        assert_eq!(backoff.next(), Some(Duration::from_millis(10)));
        assert_eq!(backoff.next(), Some(Duration::from_millis(10)));
        assert_eq!(backoff.next(), Some(Duration::from_millis(10)));
        assert_eq!(backoff.next(), None);

        backoff.reset();
        assert_eq!(backoff.next(), Some(Duration::from_millis(10)));
    }
}
