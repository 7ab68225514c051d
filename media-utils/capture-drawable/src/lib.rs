//! Raster, rectangle and drawing-primitive types shared by the video capture
//! core crates (`capture-clock`, `damage-tracker`, `frame-preparer`,
//! `video-capture-core`).

mod drawable;
mod primitive;
mod rect;

pub use drawable::{Drawable, BYTES_PER_PIXEL};
pub use primitive::{DrawPrimitive, GraphicsSink};
pub use rect::Rect;
