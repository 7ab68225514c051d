//! Turns a raw [Drawable] plus the current damage/overlay state into the
//! exact bytes handed to the encoder: optionally cropped, optionally
//! timestamp-stamped, optionally pointer-composited.
//!
//! Grounded on the original `RDPDrawable`/`rect_tracker` pairing of a live
//! drawing surface with a capture-time "prepare this frame for dumping"
//! step, and on `font-drawing`'s alpha-blend `put_pixel` compositing algebra
//! -- but never its runtime rasteriser: see [font] for the divergence.

mod font;
mod pointer;
mod saver;

pub use pointer::{LazyDrawablePointer, PointerBitmap, PointerOverlay};
pub use saver::BufferSaver;

use capture_clock::BrokenDownTime;
use capture_drawable::{Drawable, Rect, BYTES_PER_PIXEL};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("crop rectangle {crop:?} is not contained in drawable bounds {bounds:?}")]
    InvalidCropRect { crop: Rect, bounds: Rect },
}

/// Which overlays a given frame should carry.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrepareFlags {
    pub draw_timestamp: bool,
    pub draw_pointer: bool,
}

const TEXT_MARGIN: u32 = 2;
const GLYPH_SPACING: u32 = 1;
const FOREGROUND: [u8; 3] = [255, 255, 255];
const BACKGROUND: [u8; 3] = [0, 0, 0];

/// Crops, timestamp-stamps and pointer-overlays the drawable on demand.
///
/// Holds an owned shadow buffer used only in cropped mode; in fullscreen
/// mode the output view borrows the live drawable directly and every
/// overlay write is mirrored into a [BufferSaver] so [FramePreparer::release_image_for_dump]
/// can put the drawable back exactly as drawing primitives left it.
pub struct FramePreparer {
    crop_rect: Rect,
    is_fullscreen: bool,
    shadow: Option<Drawable>,
    pointer_overlay: PointerOverlay,
    saver: BufferSaver,
}

impl FramePreparer {
    pub fn new(drawable_bounds: Rect, crop_rect: Rect) -> Result<Self, Error> {
        let mut preparer = Self {
            crop_rect,
            is_fullscreen: false,
            shadow: None,
            pointer_overlay: PointerOverlay::new(),
            saver: BufferSaver::new(),
        };
        preparer.set_cropping(crop_rect, drawable_bounds)?;
        Ok(preparer)
    }

    pub fn is_fullscreen(&self) -> bool {
        self.is_fullscreen
    }

    pub fn crop_rect(&self) -> Rect {
        self.crop_rect
    }

    /// Rebinds the crop rectangle; a crop equal to the full drawable bounds
    /// switches into fullscreen (direct-view) mode, anything smaller
    /// switches into cropped (owned shadow) mode.
    pub fn set_cropping(&mut self, crop_rect: Rect, drawable_bounds: Rect) -> Result<(), Error> {
        if !drawable_bounds.contains_rect(&crop_rect) {
            return Err(Error::InvalidCropRect { crop: crop_rect, bounds: drawable_bounds });
        }
        self.crop_rect = crop_rect;
        self.is_fullscreen = crop_rect == drawable_bounds;
        self.shadow = if self.is_fullscreen {
            None
        } else {
            Some(Drawable::zeros(crop_rect.width, crop_rect.height))
        };
        Ok(())
    }

    /// Step 1-3 of the prepare algorithm: produce the output view for this
    /// frame and composite its overlays into it. The returned [PreparedFrame]
    /// borrows either the live drawable (fullscreen) or the owned shadow
    /// (cropped); consume it (e.g. hand its bytes to an encoder) before
    /// calling [FramePreparer::release_image_for_dump].
    pub fn acquire_image_for_dump<'a>(
        &'a mut self,
        drawable: &'a mut Drawable,
        cursor: (i32, i32),
        broken_down: &BrokenDownTime,
        flags: PrepareFlags,
        pointer_provider: &mut dyn LazyDrawablePointer,
    ) -> PreparedFrame<'a> {
        self.pointer_overlay.reset();
        self.saver.restore(drawable.data_mut());

        let target: &mut Drawable = if self.is_fullscreen {
            drawable
        } else {
            self.shadow = Some(drawable.copy_rect(&self.crop_rect));
            self.shadow.as_mut().expect("just assigned")
        };

        let saver = if self.is_fullscreen { Some(&mut self.saver) } else { None };
        composite_overlays(target, saver, cursor, broken_down, flags, &mut self.pointer_overlay, pointer_provider);

        PreparedFrame { image: if self.is_fullscreen { drawable } else { self.shadow.as_ref().unwrap() } }
    }

    /// Undoes whatever [FramePreparer::acquire_image_for_dump] wrote
    /// directly into the live drawable. A no-op in cropped mode, where the
    /// overlays only ever touched the disposable shadow buffer.
    pub fn release_image_for_dump(&mut self, drawable: &mut Drawable) {
        self.saver.restore(drawable.data_mut());
    }
}

/// The frame handed to the encoder: a view of a [Drawable], possibly
/// cropped and with overlays baked in.
pub struct PreparedFrame<'a> {
    image: &'a Drawable,
}

impl<'a> PreparedFrame<'a> {
    pub fn image(&self) -> &Drawable {
        self.image
    }

    pub fn base_ptr(&self) -> *const u8 {
        self.image.data().as_ptr()
    }
}

// The reborrow via `as_deref_mut` below is genuine, not redundant: `saver` is
// used twice in this function, so a plain move would not compile.
#[allow(clippy::needless_option_as_deref)]
fn composite_overlays(
    target: &mut Drawable,
    mut saver: Option<&mut BufferSaver>,
    cursor: (i32, i32),
    broken_down: &BrokenDownTime,
    flags: PrepareFlags,
    pointer_overlay: &mut PointerOverlay,
    pointer_provider: &mut dyn LazyDrawablePointer,
) {
    if flags.draw_timestamp {
        stamp_timestamp_band(target, saver.as_deref_mut(), &broken_down.to_string());
    }
    if flags.draw_pointer {
        let bitmap = pointer_overlay.get_or_materialise(pointer_provider);
        composite_pointer(target, saver.as_deref_mut(), cursor, bitmap);
    }
}

fn put_pixel(target: &mut Drawable, saver: Option<&mut BufferSaver>, x: u32, y: u32, rgb: [u8; 3]) {
    if x >= target.width() || y >= target.height() {
        return;
    }
    let offset = y as usize * target.stride() + x as usize * BYTES_PER_PIXEL;
    if let Some(saver) = saver {
        saver.save(target.data(), offset, BYTES_PER_PIXEL);
    }
    target.data_mut()[offset..offset + BYTES_PER_PIXEL].copy_from_slice(&rgb);
}

fn stamp_timestamp_band(target: &mut Drawable, mut saver: Option<&mut BufferSaver>, text: &str) {
    let band_height = font::GLYPH_HEIGHT + 2 * TEXT_MARGIN;
    let band_width = (text.chars().count() as u32) * (font::GLYPH_WIDTH + GLYPH_SPACING) + 2 * TEXT_MARGIN;

    for y in 0..band_height.min(target.height()) {
        for x in 0..band_width.min(target.width()) {
            put_pixel(target, saver.as_deref_mut(), x, y, BACKGROUND);
        }
    }

    for (i, ch) in text.chars().enumerate() {
        let glyph_x0 = TEXT_MARGIN + i as u32 * (font::GLYPH_WIDTH + GLYPH_SPACING);
        for row in 0..font::GLYPH_HEIGHT {
            for col in 0..font::GLYPH_WIDTH {
                if font::glyph_pixel(ch, col, row) {
                    put_pixel(target, saver.as_deref_mut(), glyph_x0 + col, TEXT_MARGIN + row, FOREGROUND);
                }
            }
        }
    }
}

fn composite_pointer(
    target: &mut Drawable,
    mut saver: Option<&mut BufferSaver>,
    cursor: (i32, i32),
    bitmap: &PointerBitmap,
) {
    let origin_x = cursor.0 - bitmap.hotspot_x as i32;
    let origin_y = cursor.1 - bitmap.hotspot_y as i32;

    for py in 0..bitmap.height {
        let y = origin_y + py as i32;
        if y < 0 || y as u32 >= target.height() {
            continue;
        }
        for px in 0..bitmap.width {
            let x = origin_x + px as i32;
            if x < 0 || x as u32 >= target.width() {
                continue;
            }
            let [r, g, b, a] = bitmap.pixel(px, py);
            if a == 0 {
                continue;
            }
            let blended = if a == 255 {
                [r, g, b]
            } else {
                let offset = y as usize * target.stride() + x as usize * BYTES_PER_PIXEL;
                let under = &target.data()[offset..offset + BYTES_PER_PIXEL];
                let a = a as u32;
                [
                    ((r as u32 * a + under[0] as u32 * (255 - a)) / 255) as u8,
                    ((g as u32 * a + under[1] as u32 * (255 - a)) / 255) as u8,
                    ((b as u32 * a + under[2] as u32 * (255 - a)) / 255) as u8,
                ]
            };
            put_pixel(target, saver.as_deref_mut(), x as u32, y as u32, blended);
        }
    }
}
