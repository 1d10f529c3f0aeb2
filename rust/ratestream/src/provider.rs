//! Pull-mode input providers.

use std::error::Error as StdError;

use crate::buffer::InputBuffer;

/// Error type input providers fail with.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// A source of input frames for [`Resampler::output`](crate::Resampler::output).
///
/// The session calls `provide` only from inside `output`, on the calling
/// thread, asking for at most `requested` frames. Returning a buffer with zero
/// frames ends the stream. The returned buffer may borrow the provider; it is
/// consumed before the provider is called again.
pub trait InputProvider {
    fn provide(&mut self, requested: usize) -> Result<InputBuffer<'_>, BoxError>;
}

/// Adapts a closure returning owned buffers.
pub(crate) struct FnProvider<F>(pub F);

impl<F> InputProvider for FnProvider<F>
where
    F: FnMut(usize) -> Result<InputBuffer<'static>, BoxError>,
{
    fn provide(&mut self, requested: usize) -> Result<InputBuffer<'_>, BoxError> {
        (self.0)(requested)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferView;

    #[test]
    fn test_fn_provider() {
        let mut calls = 0;
        let mut provider = FnProvider(|requested: usize| {
            calls += 1;
            Ok(InputBuffer::owned_interleaved(vec![0.5f32; requested]))
        });
        let buf = provider.provide(4).unwrap();
        assert_eq!(buf.region_len(0), 4);
        drop(buf);
        drop(provider);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_fn_provider_error() {
        let mut provider =
            FnProvider(|_: usize| -> Result<InputBuffer<'static>, BoxError> { Err("eof".into()) });
        let err = provider.provide(1).unwrap_err();
        assert_eq!(err.to_string(), "eof");
    }
}
