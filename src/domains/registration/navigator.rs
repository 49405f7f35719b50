use serde::{Deserialize, Serialize};

/// Wizard screens in the order they are shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Screen {
    CameraPermission,
    TakePicture,
    ConfirmPicture,
    ParticipantDetails,
    CaptureVaccines,
}

impl Screen {
    pub const ALL: [Screen; 5] = [
        Screen::CameraPermission,
        Screen::TakePicture,
        Screen::ConfirmPicture,
        Screen::ParticipantDetails,
        Screen::CaptureVaccines,
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn from_index(index: usize) -> Option<Screen> {
        Self::ALL.get(index).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NavigationDirection {
    #[default]
    None,
    Forward,
    Backward,
}

/// Moves one step at a time through [`Screen::ALL`]; never leaves the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WizardNavigator {
    current: Screen,
    direction: NavigationDirection,
}

impl Default for WizardNavigator {
    fn default() -> Self {
        Self::new()
    }
}

impl WizardNavigator {
    pub fn new() -> Self {
        Self {
            current: Screen::CameraPermission,
            direction: NavigationDirection::None,
        }
    }

    /// Editing an existing participant skips the picture steps
    pub fn for_update() -> Self {
        Self {
            current: Screen::ParticipantDetails,
            direction: NavigationDirection::None,
        }
    }

    pub fn current(&self) -> Screen {
        self.current
    }

    pub fn direction(&self) -> NavigationDirection {
        self.direction
    }

    pub fn forward(&mut self) -> bool {
        match Screen::from_index(self.current.index() + 1) {
            Some(next) => {
                self.move_to(next, NavigationDirection::Forward);
                true
            }
            None => false,
        }
    }

    pub fn back(&mut self) -> bool {
        let previous = self
            .current
            .index()
            .checked_sub(1)
            .and_then(Screen::from_index);
        match previous {
            Some(previous) => {
                self.move_to(previous, NavigationDirection::Backward);
                true
            }
            None => false,
        }
    }

    /// Jump forward to `screen` regardless of position (picture confirmed or skipped)
    pub fn jump_forward_to(&mut self, screen: Screen) {
        self.move_to(screen, NavigationDirection::Forward);
    }

    fn move_to(&mut self, screen: Screen, direction: NavigationDirection) {
        log::debug!("Wizard {:?} -> {:?} ({:?})", self.current, screen, direction);
        self.current = screen;
        self.direction = direction;
    }
}
