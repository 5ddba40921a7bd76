/// Buttons exposed by the control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Audio,
    Play,
    Restart,
    Controls,
}

/// Intent produced by a button press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    ToggleAudio,
    TogglePlay,
    Restart,
    ToggleControls,
}

/// Explicit user confirmation step for destructive actions.
pub trait Confirm {
    fn confirm(&mut self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: FnMut(&str) -> bool,
{
    fn confirm(&mut self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Control surface the lifecycle manager pushes its state back into.
pub trait ControlSurface {
    /// Translates a press into an action, or `None` when the user backed out.
    fn press(&mut self, button: Button) -> Option<ControlAction>;

    fn set_audio_enabled_label(&mut self, enabled: bool);

    fn set_running_label(&mut self, running: bool);
}

pub const RESTART_PROMPT: &str = "Restart simulation?";

/// Audio, play, restart and controls button row.
#[derive(Debug)]
pub struct ButtonsOverlay<C> {
    confirm: C,
    audio_label: &'static str,
    play_label: &'static str,
}

impl<C: Confirm> ButtonsOverlay<C> {
    pub fn new(confirm: C) -> Self {
        Self {
            confirm,
            audio_label: "Audio: OFF",
            play_label: "Pause",
        }
    }

    pub fn audio_label(&self) -> &'static str {
        self.audio_label
    }

    pub fn play_label(&self) -> &'static str {
        self.play_label
    }
}

impl<C: Confirm> ControlSurface for ButtonsOverlay<C> {
    fn press(&mut self, button: Button) -> Option<ControlAction> {
        match button {
            Button::Audio => Some(ControlAction::ToggleAudio),
            Button::Play => Some(ControlAction::TogglePlay),
            Button::Restart => self
                .confirm
                .confirm(RESTART_PROMPT)
                .then_some(ControlAction::Restart),
            Button::Controls => Some(ControlAction::ToggleControls),
        }
    }

    fn set_audio_enabled_label(&mut self, enabled: bool) {
        self.audio_label = if enabled { "Audio: ON" } else { "Audio: OFF" };
    }

    fn set_running_label(&mut self, running: bool) {
        self.play_label = if running { "Pause" } else { "Resume" };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restart_requires_confirmation() {
        let mut declined = ButtonsOverlay::new(|_: &str| false);
        assert_eq!(declined.press(Button::Restart), None);

        let mut prompts = Vec::new();
        let mut accepted = ButtonsOverlay::new(|prompt: &str| {
            prompts.push(prompt.to_string());
            true
        });
        assert_eq!(accepted.press(Button::Restart), Some(ControlAction::Restart));
        drop(accepted);
        assert_eq!(prompts, vec![RESTART_PROMPT.to_string()]);
    }

    #[test]
    fn labels_follow_state() {
        let mut overlay = ButtonsOverlay::new(|_: &str| true);
        assert_eq!(overlay.audio_label(), "Audio: OFF");
        overlay.set_audio_enabled_label(true);
        overlay.set_running_label(false);
        assert_eq!(overlay.audio_label(), "Audio: ON");
        assert_eq!(overlay.play_label(), "Resume");
        assert_eq!(overlay.press(Button::Play), Some(ControlAction::TogglePlay));
    }

    #[test]
    fn controls_button_skips_confirmation() {
        let mut overlay = ButtonsOverlay::new(|_: &str| -> bool { panic!("no prompt expected") });
        assert_eq!(
            overlay.press(Button::Controls),
            Some(ControlAction::ToggleControls)
        );
    }
}
