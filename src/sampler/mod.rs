// Sampler boundary - wav pool lookups and the external stretch renderer
//
// The wav pool and the time-stretch tool live outside the project core.
// Items only ever read from the pool; rendering blocks until the external
// tool finishes.

pub mod pool;
pub mod render;

pub use pool::{SamplePool, WavPool};
pub use render::{StretchCache, StretchParams, StretchRenderer};
