pub mod skew;
pub mod support_bundle;
pub mod validate;
pub mod version;
