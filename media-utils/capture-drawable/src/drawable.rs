use machine_vision_formats::{
    pixel_format::RGB8, ImageBuffer, ImageBufferMutRef, ImageBufferRef, ImageData, ImageMutData,
    Stride,
};

use crate::Rect;

/// Number of bytes used to store one pixel in a [Drawable].
///
/// The wire decoder's screen buffer is a packed 24-bit colour raster;
/// [pixel_format::RGB8] is the only three-byte-per-pixel format
/// `machine-vision-formats` defines, so it is reused here. The exact channel
/// order is a detail owned by the encoder ("the encoder owns pixel-format
/// adaptation"); this crate never interprets channel values.
pub const BYTES_PER_PIXEL: usize = 3;

/// The mutable in-memory raster that is the authoritative view of the remote
/// screen, as accumulated by the RDP decoder.
///
/// `Drawable` owns its backing buffer and is written to by drawing
/// primitives. It never interprets pixel values; it only stores bytes.
#[derive(Clone)]
pub struct Drawable {
    width: u32,
    height: u32,
    stride: usize,
    data: Vec<u8>,
}

impl Drawable {
    /// Allocate a zeroed drawable of the given size, using the minimum stride.
    pub fn zeros(width: u32, height: u32) -> Self {
        let stride = width as usize * BYTES_PER_PIXEL;
        let data = vec![0u8; stride * height as usize];
        Self {
            width,
            height,
            stride,
            data,
        }
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// The full backing buffer, `height() * stride()` bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Resize in place, discarding prior contents. Used when the drawable is
    /// resized by the decoder (see `CaptureCtx::update_fullscreen`).
    pub fn resize(&mut self, width: u32, height: u32) {
        *self = Self::zeros(width, height);
    }

    /// A read-only view of one scanline.
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        &self.data[start..start + self.width as usize * BYTES_PER_PIXEL]
    }

    /// A mutable view of one scanline, for the decoder's "raw row write"
    /// primitive.
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let width = self.width;
        let stride = self.stride;
        let start = y as usize * stride;
        &mut self.data[start..start + width as usize * BYTES_PER_PIXEL]
    }

    /// Copy `rect` (which must lie within `self.bounds()`) into a
    /// freshly-allocated, tightly-packed buffer.
    pub fn copy_rect(&self, rect: &Rect) -> Drawable {
        debug_assert!(self.bounds().contains_rect(rect));
        let mut out = Drawable::zeros(rect.width, rect.height);
        for row in 0..rect.height {
            let src_y = rect.y + row;
            let src_start = src_y as usize * self.stride + rect.x as usize * BYTES_PER_PIXEL;
            let src = &self.data[src_start..src_start + rect.width as usize * BYTES_PER_PIXEL];
            out.row_mut(row).copy_from_slice(src);
        }
        out
    }

    /// Copy `src` into `self` at `(dest_x, dest_y)`; `src` must fit entirely
    /// within `self.bounds()` at that offset.
    pub fn blit_from(&mut self, src: &Drawable, dest_x: u32, dest_y: u32) {
        debug_assert!(dest_x + src.width <= self.width);
        debug_assert!(dest_y + src.height <= self.height);
        for row in 0..src.height {
            let src_row = src.row(row).to_vec();
            let dest_start =
                (dest_y + row) as usize * self.stride + dest_x as usize * BYTES_PER_PIXEL;
            self.data[dest_start..dest_start + src_row.len()].copy_from_slice(&src_row);
        }
    }
}

impl std::fmt::Debug for Drawable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Drawable {{ {}x{} }}", self.width, self.height)
    }
}

impl ImageData<RGB8> for Drawable {
    fn width(&self) -> u32 {
        self.width
    }
    fn height(&self) -> u32 {
        self.height
    }
    fn buffer_ref(&self) -> ImageBufferRef<'_, RGB8> {
        ImageBufferRef::new(&self.data)
    }
    fn buffer(self) -> ImageBuffer<RGB8> {
        ImageBuffer::new(self.data)
    }
}

impl ImageMutData<RGB8> for Drawable {
    fn buffer_mut_ref(&mut self) -> ImageBufferMutRef<'_, RGB8> {
        ImageBufferMutRef::new(&mut self.data)
    }
}

impl Stride for Drawable {
    fn stride(&self) -> usize {
        self.stride
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeros_are_zero() {
        let d = Drawable::zeros(4, 3);
        assert_eq!(d.image_data().len(), 4 * 3 * BYTES_PER_PIXEL);
        assert!(d.image_data().iter().all(|&b| b == 0));
    }

    #[test]
    fn copy_rect_and_blit_back_roundtrips() {
        let mut d = Drawable::zeros(10, 10);
        for y in 0..10 {
            d.row_mut(y).fill(y as u8 + 1);
        }
        let rect = Rect::new(2, 3, 4, 4);
        let patch = d.copy_rect(&rect);
        let mut blank = Drawable::zeros(10, 10);
        blank.blit_from(&patch, rect.x, rect.y);
        for y in rect.y..rect.bottom() {
            assert_eq!(blank.row(y)[rect.x as usize * BYTES_PER_PIXEL], y as u8 + 1);
        }
    }
}
