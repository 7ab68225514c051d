use crate::Rect;

/// One drawing order from the RDP wire decoder.
///
/// The decoder's real graphics API has one virtual method per order kind;
/// this collapses that into a single enum, per the "observer chain for
/// drawing" design note, so a single [GraphicsSink::record] method can
/// dispatch on it instead of requiring a trait method per order kind.
#[derive(Debug, Clone, Copy)]
pub enum DrawPrimitive {
    /// An order whose damage is its bounding rectangle, already clipped by
    /// the caller to the current clip region (e.g. `MemBlt`, `PatBlt`,
    /// `DstBlt`, `LineTo`, glyph/text orders, `Polyline`).
    Bounded(Rect),
    /// A bitmap-data order: its damage is the destination rectangle clipped
    /// to the bitmap's own dimensions, taking the smaller of the two in each
    /// axis.
    BitmapData {
        dest: Rect,
        bitmap_width: u32,
        bitmap_height: u32,
    },
    /// A full surface replacement (`RDPSetSurfaceCommand`) or a raw
    /// scanline write (`set_row`): both damage the entire image.
    SurfaceReplace,
    /// A pointer-cache update (`cached_pointer`, `new_pointer`): damages the
    /// entire image because the pointer overlay may move anywhere.
    PointerCacheUpdate,
    /// A frame-marker order: contributes no damage.
    FrameMarker,
    /// A RAIL window order, palette update, or cache-management order: not
    /// pixel damage, ignored entirely.
    Ignored,
}

impl DrawPrimitive {
    /// The bounding rectangle this primitive damages, within an image of the
    /// given size. `None` means "no damage" (frame-marker or ignored
    /// orders); `Some(full_bounds)` is returned for the orders that force
    /// full-image damage.
    pub fn damage_rect(&self, full_bounds: Rect) -> Option<Rect> {
        match self {
            DrawPrimitive::Bounded(r) => {
                let clipped = r.intersect(&full_bounds);
                if clipped.is_empty() {
                    None
                } else {
                    Some(clipped)
                }
            }
            DrawPrimitive::BitmapData {
                dest,
                bitmap_width,
                bitmap_height,
            } => {
                let w = dest.width.min(*bitmap_width);
                let h = dest.height.min(*bitmap_height);
                let clipped = Rect::new(dest.x, dest.y, w, h).intersect(&full_bounds);
                if clipped.is_empty() {
                    None
                } else {
                    Some(clipped)
                }
            }
            DrawPrimitive::SurfaceReplace | DrawPrimitive::PointerCacheUpdate => {
                Some(full_bounds)
            }
            DrawPrimitive::FrameMarker | DrawPrimitive::Ignored => None,
        }
    }
}

/// The drawing interface a [crate::Drawable] (or anything tapping its
/// drawing-order stream, such as a damage tracker) accepts.
///
/// The caller must route every drawing primitive it receives from the wire
/// decoder through this sink, in arrival order, on the same thread as any
/// `snapshot`/`frame_marker_event` calls.
pub trait GraphicsSink {
    fn record(&mut self, primitive: DrawPrimitive);
}
