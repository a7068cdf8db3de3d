//! Spectral acquisition and adaptive normalisation.
//!
//! Data flows frame buffer -> spectrum -> band map -> gain balance ->
//! peak normaliser -> smoother. [`pipeline::BandPipeline`] owns one instance
//! of each stage and is the only thing the engine talks to.

pub mod bands;
pub mod frame_buffer;
pub mod normalizer;
pub mod pipeline;
pub mod spectrum;

pub use bands::{BandMap, GainBalancer};
pub use frame_buffer::FrameBuffer;
pub use normalizer::{PeakNormalizer, Smoother};
pub use pipeline::BandPipeline;
pub use spectrum::SpectralTransform;
