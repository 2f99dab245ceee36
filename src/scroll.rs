/// Scrollable region measurements, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewportGeometry {
    pub scroll_height: u32,
    pub scroll_top: u32,
}

/// Position of the reader measured from the bottom of the content, which is
/// what stays constant when older messages are inserted above.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollAnchor {
    distance_from_bottom: u32,
}

impl ScrollAnchor {
    pub fn capture(before: ViewportGeometry) -> Self {
        ScrollAnchor {
            distance_from_bottom: before.scroll_height.saturating_sub(before.scroll_top),
        }
    }

    pub fn distance_from_bottom(&self) -> u32 {
        self.distance_from_bottom
    }

    pub fn restore(&self, new_scroll_height: u32) -> u32 {
        new_scroll_height.saturating_sub(self.distance_from_bottom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewportRequest {
    ScrollToBottom,
    RestoreAnchor(ScrollAnchor),
}

impl ViewportRequest {
    /// The `scroll_top` to apply, given the geometry measured after layout.
    pub fn resolve(&self, laid_out: ViewportGeometry) -> u32 {
        match self {
            ViewportRequest::ScrollToBottom => laid_out.scroll_height,
            ViewportRequest::RestoreAnchor(anchor) => anchor.restore(laid_out.scroll_height),
        }
    }
}
