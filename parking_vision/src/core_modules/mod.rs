pub mod annotator;
pub mod glyphs;
pub mod patch;
pub mod pixel;
pub mod region;
pub mod sampler;
