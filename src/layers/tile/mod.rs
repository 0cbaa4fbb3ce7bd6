//! Tile rendering: the scheduler that turns a viewport into draws and fetches

pub mod host;
pub mod renderer;
pub mod timer;

pub use host::RenderHost;
pub use renderer::{RenderState, TileRenderer};
pub use timer::Deadline;
