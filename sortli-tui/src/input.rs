use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{App, Screen};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    None,
    Quit,
    /// Run `service.analyze_image`(...) on the typed path
    AnalyzeImage,
    /// Run `service.find_nearby_sites`()
    FindSites,
}

pub(crate) fn handle_key_event(key: KeyEvent, app: &mut App) -> Action {
    use KeyCode::{Backspace, Char, Down, Enter, Esc, F, Left, Tab, Up};

    // Global shortcuts
    if key.code == Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Action::Quit;
    }
    if (key.code == Char('f') && key.modifiers.contains(KeyModifiers::CONTROL))
        || key.code == F(2)
    {
        return Action::FindSites;
    }

    let mut action = Action::None;

    match app.screen {
        Screen::Capture => match key.code {
            Char(character) => {
                if !key.modifiers.contains(KeyModifiers::CONTROL)
                    && !key.modifiers.contains(KeyModifiers::ALT)
                {
                    app.image_input.push(character);
                }
            }
            Backspace => {
                app.image_input.pop();
            }
            Enter => {
                action = Action::AnalyzeImage;
            }
            Esc => {
                action = Action::Quit;
            }
            _ => {}
        },

        Screen::Results | Screen::Sites => match key.code {
            Up | Char('k') => app.scroll_up(),
            Down | Char('j') => app.scroll_down(),
            Left | Esc | Tab | Char('b') => app.back_to_capture(),
            Char('q') if key.modifiers.is_empty() => {
                action = Action::Quit;
            }
            _ => {}
        },
    }
    action
}
