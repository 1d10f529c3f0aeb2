//! Streaming sample-rate conversion.
//!
//! This crate converts audio from one sample rate to another, either in one
//! call ([`oneshot`]) or incrementally through a [`Resampler`] session:
//!
//! - push mode: hand input to [`Resampler::process`] and collect output
//! - pull mode: register an [`InputProvider`] and call [`Resampler::output`]
//!
//! Samples may be `f32`, `f64`, `i32` or `i16`, laid out interleaved in one
//! buffer or planar with one buffer per channel. The layout is inferred from
//! the number of buffers and the session's channel count.
//!
//! # Example
//!
//! ```rust
//! use ratestream::{
//!     oneshot, ElementType, InputBuffer, IoSpec, OutputBuffer, QualityFlags, QualitySpec,
//!     Recipe, RuntimeSpec,
//! };
//!
//! // Mono square wave, played to both channels.
//! let input: Vec<f32> = (0..24)
//!     .flat_map(|i| {
//!         let v = if i % 4 < 2 { 1.0 } else { -1.0 };
//!         [v, v]
//!     })
//!     .collect();
//! let mut left = vec![0i32; 48];
//! let mut right = vec![0i32; 48];
//!
//! let done = oneshot(
//!     1.0,
//!     2.0,
//!     2,
//!     &InputBuffer::interleaved(&input[..]),
//!     &mut OutputBuffer::planar([&mut left[..], &mut right[..]]),
//!     IoSpec::validate(ElementType::Float32, ElementType::Int32)?,
//!     QualitySpec::from_recipe(Recipe::Low, QualityFlags::default())?,
//!     RuntimeSpec::default(),
//! )?;
//! assert_eq!(done.produced, 48);
//! assert_eq!(left, right);
//! # Ok::<(), ratestream::Error>(())
//! ```

pub mod buffer;
pub mod config;
pub mod engine;
pub mod error;
mod oneshot;
pub mod provider;
pub mod reader;
pub mod sample;
pub mod session;
pub mod shape;

pub use buffer::{BufferView, InputBuffer, OutputBuffer, Region, RegionMut};
pub use config::{
    CoefInterpolation, IoSpec, PhaseResponse, QualityFlags, QualitySpec, Recipe, Rolloff,
    RuntimeSpec,
};
pub use engine::{Engine, RubatoEngine};
pub use error::{Error, Result, ShapeError};
pub use oneshot::oneshot;
pub use provider::{BoxError, InputProvider};
pub use reader::SampleReader;
pub use sample::{ElementType, Layout, Sample};
pub use session::{Progress, Resampler, State};
pub use shape::{Shape, resolve};
