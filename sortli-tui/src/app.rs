use std::path::PathBuf;
use std::sync::Arc;

use sortli_core::{Session, pipeline::PipelineState, service::SortliService};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Screen {
    Capture,
    Results,
    Sites,
}

pub(crate) struct App {
    pub service: Arc<SortliService>,
    pub images_dir: PathBuf,

    pub screen: Screen,
    pub image_input: String,

    pub session: Option<Session>,
    pub sites: Option<String>,
    pub scroll: u16,

    pub pipeline_state: PipelineState,
    pub activity: String,
    pub is_loading: bool,
    pub error_message: Option<String>,
}

impl App {
    pub(crate) fn new(service: Arc<SortliService>, images_dir: PathBuf) -> Self {
        Self {
            service,
            images_dir,
            screen: Screen::Capture,
            image_input: String::new(),
            session: None,
            sites: None,
            scroll: 0,
            pipeline_state: PipelineState::AwaitingImage,
            activity: String::new(),
            is_loading: false,
            error_message: None,
        }
    }

    /// Drop the previous interaction before a new capture is analyzed.
    pub(crate) fn begin_capture(&mut self) {
        self.session = None;
        self.scroll = 0;
        self.error_message = None;
        self.start_activity("Loading image");
    }

    pub(crate) fn start_activity(&mut self, activity: &str) {
        self.activity = activity.to_owned();
        self.is_loading = true;
    }

    pub(crate) fn set_pipeline_state(&mut self, state: PipelineState) {
        self.pipeline_state = state;
        self.activity = capitalize(&state.to_string());
    }

    pub(crate) fn show_session(&mut self, session: Session) {
        self.session = Some(session);
        self.screen = Screen::Results;
        self.scroll = 0;
    }

    pub(crate) fn show_sites(&mut self, answer: String) {
        self.sites = Some(answer);
        self.screen = Screen::Sites;
        self.scroll = 0;
    }

    pub(crate) fn back_to_capture(&mut self) {
        self.screen = Screen::Capture;
        self.pipeline_state = PipelineState::AwaitingImage;
        self.scroll = 0;
    }

    pub(crate) fn scroll_up(&mut self) {
        self.scroll = self.scroll.saturating_sub(1);
    }

    pub(crate) fn scroll_down(&mut self) {
        let limit = match self.screen {
            Screen::Results => self
                .session
                .as_ref()
                .map_or(0, |session| session.blocks.len().saturating_sub(1)),
            Screen::Sites => self
                .sites
                .as_ref()
                .map_or(0, |sites| sites.lines().count().saturating_sub(1)),
            Screen::Capture => 0,
        };
        if usize::from(self.scroll) < limit {
            self.scroll = self.scroll.saturating_add(1);
        }
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capitalize_first_letter() {
        assert_eq!(capitalize("analyzing image"), "Analyzing image");
        assert_eq!(capitalize(""), "");
    }
}
