pub mod cluster;
pub mod version;
