pub mod audio;
pub mod dsp;
pub mod error;
pub mod search;
pub mod types;

pub use dsp::fingerprint::{Fingerprint, Matcher, MatcherParams};
pub use error::{Error, Result};
pub use search::{locate_clip, SearchParams, WindowPlan};
pub use types::{AudioData, MatchLocation, MatchResult};
