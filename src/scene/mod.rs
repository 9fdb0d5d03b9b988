//! Host cameras and the overlay content registered against them

mod camera;
mod overlay_table;

pub use camera::*;
pub use overlay_table::*;
