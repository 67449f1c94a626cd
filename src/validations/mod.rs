pub mod bundles;
pub mod extended_support;
pub mod management;
pub mod preflight;
pub mod registry_mirror;
pub mod skew;

pub use preflight::Preflight;
