pub mod bundle;
pub mod cluster;
pub mod cluster_config;
pub mod distro;
pub mod status;
