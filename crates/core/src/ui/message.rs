/// Centered status message with an optional timeout.
#[derive(Debug, Default, Clone)]
pub struct MessageOverlay {
    text: Option<String>,
    remaining: Option<f32>,
}

impl MessageOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shows `text` for `seconds`; a negative duration keeps it up until
    /// [`hide`](Self::hide) is called.
    pub fn show(&mut self, text: impl Into<String>, seconds: f32) {
        self.text = Some(text.into());
        self.remaining = (seconds >= 0.0).then_some(seconds);
    }

    pub fn hide(&mut self) {
        self.text = None;
        self.remaining = None;
    }

    pub fn advance(&mut self, delta: f32) {
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= delta;
            if *remaining <= 0.0 {
                self.hide();
            }
        }
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn is_visible(&self) -> bool {
        self.text.is_some()
    }
}
