//! The pod metadata relay plugin.

pub mod cache;
pub mod plugin;

pub use cache::PodKey;
pub use cache::PodMetadataCache;
pub use plugin::PodMetadataRelay;
pub use plugin::POD_DATA_ANNOTATION;
