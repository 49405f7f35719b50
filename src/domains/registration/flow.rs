use crate::domains::registration::navigator::{NavigationDirection, Screen, WizardNavigator};
use crate::domains::registration::observable::Observable;
use crate::domains::registration::providers::ParticipantImageProvider;
use crate::domains::registration::types::{ImageBytes, ParticipantSummary, RegistrationArgs};

/// What the wizard hands back to its caller when it closes
#[derive(Debug, Clone, PartialEq)]
pub enum WizardResult {
    Registered(ParticipantSummary),
    Updated(ParticipantSummary),
    Cancelled,
}

/// Screen-level state of the registration wizard: picture sub-wizard, details and vaccines.
pub struct RegistrationFlow {
    navigator: WizardNavigator,
    args: RegistrationArgs,
    pub current_screen: Observable<Screen>,
    pub participant_picture: Observable<Option<ImageBytes>>,
    pub participant: Observable<Option<ParticipantSummary>>,
    pub request_finish: Observable<bool>,
}

impl Default for RegistrationFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistrationFlow {
    pub fn new() -> Self {
        let navigator = WizardNavigator::new();
        Self {
            current_screen: Observable::new(navigator.current()),
            navigator,
            args: RegistrationArgs::default(),
            participant_picture: Observable::default(),
            participant: Observable::default(),
            request_finish: Observable::new(false),
        }
    }

    /// Entering with a participant UUID edits that participant: its picture is loaded
    /// and the wizard starts at the details screen.
    pub async fn set_arguments(&mut self, args: RegistrationArgs, images: &dyn ParticipantImageProvider) {
        if let Some(participant_uuid) = args.participant_uuid.as_deref() {
            let picture = match images.get_person_image(participant_uuid).await {
                Ok(picture) => picture.filter(|p| !p.is_empty()),
                Err(e) => {
                    log::debug!("No picture for participant {}: {}", participant_uuid, e);
                    None
                }
            };
            self.participant_picture.set(picture);
            self.navigator = WizardNavigator::for_update();
            self.sync_screen();
        }
        self.args = args;
    }

    /// Arguments for loading the details step
    pub fn args(&self) -> &RegistrationArgs {
        &self.args
    }

    pub fn is_update_mode(&self) -> bool {
        self.args.is_update()
    }

    pub fn current(&self) -> Screen {
        self.navigator.current()
    }

    pub fn direction(&self) -> NavigationDirection {
        self.navigator.direction()
    }

    pub fn navigate_back(&mut self) -> bool {
        let moved = self.navigator.back();
        self.sync_screen();
        moved
    }

    fn navigate_forward(&mut self) -> bool {
        let moved = self.navigator.forward();
        self.sync_screen();
        moved
    }

    fn jump_to_details(&mut self) {
        self.navigator.jump_forward_to(Screen::ParticipantDetails);
        self.sync_screen();
    }

    fn sync_screen(&self) {
        self.current_screen.set(self.navigator.current());
    }

    pub fn confirm_camera_permission_granted(&mut self) {
        self.navigate_forward();
    }

    pub fn save_picture_and_continue(&mut self, picture: ImageBytes) {
        self.participant_picture.set(Some(picture));
        self.navigate_forward();
    }

    pub fn retake_picture(&mut self) {
        self.participant_picture.set(None);
        self.navigate_back();
    }

    pub fn skip_picture(&mut self) {
        self.participant_picture.set(None);
        self.jump_to_details();
    }

    pub fn confirm_picture(&mut self) {
        self.jump_to_details();
    }

    /// Picture to submit with the participant details
    pub fn picture(&self) -> Option<ImageBytes> {
        self.participant_picture.get()
    }

    /// Called after a successful submit. Updates close the wizard; fresh registrations
    /// continue to vaccine capture.
    pub fn confirm_registration(&mut self, summary: ParticipantSummary) {
        self.participant.set(Some(summary));
        if self.is_update_mode() {
            self.request_finish.set(true);
            return;
        }
        self.navigator.jump_forward_to(Screen::CaptureVaccines);
        self.sync_screen();
    }

    pub fn finish(&self) -> WizardResult {
        match self.participant.get() {
            Some(summary) if self.is_update_mode() => WizardResult::Updated(summary),
            Some(summary) => WizardResult::Registered(summary),
            None => WizardResult::Cancelled,
        }
    }
}
