pub mod cache;
pub mod codec;
pub mod loader;
pub mod pool;
pub mod scheme;
pub mod source;
pub mod tile;

// Re-exports for convenience
pub use loader::TileLoader;
pub use source::TileSource;
