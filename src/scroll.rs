//! Auto-follow policy for streamed replies.

/// Distance from the bottom, in logical pixels, below which the view follows
/// new content.
pub const FOLLOW_THRESHOLD: f64 = 50.0;

/// Snapshot of the renderer's scrollable area.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ViewportState {
    /// Offset of the top of the visible area.
    pub scroll_top: f64,
    /// Total height of the content.
    pub scroll_height: f64,
    /// Height of the visible area.
    pub client_height: f64,
}

impl ViewportState {
    /// Creates a viewport snapshot.
    pub fn new(scroll_top: f64, scroll_height: f64, client_height: f64) -> Self {
        Self {
            scroll_top,
            scroll_height,
            client_height,
        }
    }

    /// How far the bottom of the visible area is from the end of the content.
    pub fn distance_from_bottom(&self) -> f64 {
        self.scroll_height - self.scroll_top - self.client_height
    }
}

/// Decides whether the renderer should follow new content.
///
/// The decision only changes when the user scrolls, and is forced back on at
/// the start of every message. Programmatic scrolls done on the policy's
/// advice are never fed back into it.
#[derive(Clone, Debug)]
pub struct ScrollPolicy {
    auto_scroll: bool,
}

impl ScrollPolicy {
    /// Creates a policy that follows new content.
    pub fn new() -> Self {
        Self { auto_scroll: true }
    }

    /// Returns true if a viewport in this state is near enough the bottom to
    /// keep following.
    pub fn should_auto_scroll(&self, viewport: &ViewportState) -> bool {
        viewport.distance_from_bottom() < FOLLOW_THRESHOLD
    }

    /// Records a user-driven scroll.
    pub fn on_user_scroll(&mut self, viewport: &ViewportState) {
        self.auto_scroll = self.should_auto_scroll(viewport);
    }

    /// Re-anchors to the bottom for a new message.
    pub fn on_new_message(&mut self) {
        self.auto_scroll = true;
    }

    /// The current decision.
    pub fn follows(&self) -> bool {
        self.auto_scroll
    }
}

impl Default for ScrollPolicy {
    fn default() -> Self {
        Self::new()
    }
}
