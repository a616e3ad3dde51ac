use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ViewerAction {
    Close,
    Resize(u16, u16),
}

/// Blocks until something the viewer cares about happens.
pub(crate) fn next_action() -> anyhow::Result<ViewerAction> {
    loop {
        if let Some(action) = map_event(event::read()?) {
            return Ok(action);
        }
    }
}

pub(crate) fn map_event(ev: Event) -> Option<ViewerAction> {
    match ev {
        Event::Resize(c, r) => Some(ViewerAction::Resize(c, r)),
        Event::Key(k) if k.kind == KeyEventKind::Press => {
            if k.modifiers.contains(KeyModifiers::CONTROL) && matches!(k.code, KeyCode::Char('c')) {
                return Some(ViewerAction::Close);
            }
            match k.code {
                KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc | KeyCode::Enter => {
                    Some(ViewerAction::Close)
                }
                _ => None,
            }
        }
        _ => None,
    }
}
