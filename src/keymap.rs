use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::action::LayerAction;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum KeymapProfile {
    #[default]
    Default,
    Vim,
    Arrows,
}

/// Maps key events to [`LayerAction`]s.
#[derive(Clone, Copy, Debug)]
pub struct LayerKeyBindings {
    profile: KeymapProfile,
}

impl Default for LayerKeyBindings {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerKeyBindings {
    pub const fn new() -> Self {
        Self {
            profile: KeymapProfile::Default,
        }
    }

    pub const fn with_profile(profile: KeymapProfile) -> Self {
        Self { profile }
    }

    pub const fn profile(&self) -> KeymapProfile {
        self.profile
    }

    pub const fn set_profile(&mut self, profile: KeymapProfile) {
        self.profile = profile;
    }

    pub fn resolve<C>(&self, key: KeyEvent) -> Option<LayerAction<C>> {
        if key.modifiers.contains(KeyModifiers::ALT) {
            match key.code {
                KeyCode::Up => return Some(LayerAction::MoveUp),
                KeyCode::Down => return Some(LayerAction::MoveDown),
                KeyCode::Right => return Some(LayerAction::Indent),
                KeyCode::Left => return Some(LayerAction::Outdent),
                _ => {}
            }
        }

        let nav_action = match self.profile {
            KeymapProfile::Default => Self::resolve_default_nav(key),
            KeymapProfile::Vim => Self::resolve_vim_nav(key),
            KeymapProfile::Arrows => Self::resolve_arrow_nav(key),
        };
        if nav_action.is_some() {
            return nav_action;
        }

        Self::resolve_common(key)
    }

    pub fn resolve_with<C, F>(&self, key: KeyEvent, custom: F) -> Option<LayerAction<C>>
    where
        F: Fn(KeyEvent) -> Option<C>,
    {
        if let Some(action) = custom(key) {
            return Some(LayerAction::Custom(action));
        }

        self.resolve(key)
    }

    const fn resolve_default_nav<C>(key: KeyEvent) -> Option<LayerAction<C>> {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => Some(LayerAction::SelectPrev),
            KeyCode::Down | KeyCode::Char('j') => Some(LayerAction::SelectNext),
            KeyCode::Left | KeyCode::Char('h') => Some(LayerAction::SelectParent),
            _ => None,
        }
    }

    const fn resolve_vim_nav<C>(key: KeyEvent) -> Option<LayerAction<C>> {
        match key.code {
            KeyCode::Char('k') => Some(LayerAction::SelectPrev),
            KeyCode::Char('j') => Some(LayerAction::SelectNext),
            KeyCode::Char('h') => Some(LayerAction::SelectParent),
            KeyCode::Char('K') => Some(LayerAction::MoveUp),
            KeyCode::Char('J') => Some(LayerAction::MoveDown),
            KeyCode::Char('>') => Some(LayerAction::Indent),
            KeyCode::Char('<') => Some(LayerAction::Outdent),
            _ => None,
        }
    }

    const fn resolve_arrow_nav<C>(key: KeyEvent) -> Option<LayerAction<C>> {
        match key.code {
            KeyCode::Up => Some(LayerAction::SelectPrev),
            KeyCode::Down => Some(LayerAction::SelectNext),
            KeyCode::Left => Some(LayerAction::SelectParent),
            _ => None,
        }
    }

    const fn resolve_common<C>(key: KeyEvent) -> Option<LayerAction<C>> {
        match key.code {
            KeyCode::Enter | KeyCode::Char(' ') => Some(LayerAction::ToggleCollapse),
            KeyCode::Char('-') => Some(LayerAction::CollapseAll),
            KeyCode::Char('+' | '=') => Some(LayerAction::ExpandAll),
            KeyCode::Esc => Some(LayerAction::CancelDrag),
            KeyCode::Home => Some(LayerAction::SelectFirst),
            KeyCode::End => Some(LayerAction::SelectLast),
            _ => None,
        }
    }
}
