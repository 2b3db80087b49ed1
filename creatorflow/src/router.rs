//! View router
//!
//! Which page is showing, which idea is open on top of it, and which
//! dialogs are stacked above that. The router never touches data: a
//! confirmed destructive action is handed back to the caller as a
//! [`PendingAction`] to execute against the store.

use crate::error::{AppError, Result};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Screen {
    Auth,
    Main,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum TopView {
    #[default]
    Home,
    Channels,
    Calendar,
    Settings,
}

impl std::str::FromStr for TopView {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "home" => Ok(TopView::Home),
            "channels" => Ok(TopView::Channels),
            "calendar" => Ok(TopView::Calendar),
            "settings" => Ok(TopView::Settings),
            other => Err(AppError::Validation(format!("Unknown view: {}", other))),
        }
    }
}

/// A destructive action waiting for confirmation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PendingAction {
    MoveToBin { idea_id: String },
    DeleteForever { idea_id: String },
    EmptyBin,
    DeleteChannel { channel_id: String },
    DeleteStatus { status_id: String },
    SignOut,
}

impl PendingAction {
    fn idea_id(&self) -> Option<&str> {
        match self {
            PendingAction::MoveToBin { idea_id } | PendingAction::DeleteForever { idea_id } => {
                Some(idea_id)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationDialog {
    pub title: String,
    pub message: String,
    pub confirm_label: String,
    pub cancel_label: String,
    pub is_destructive: bool,
    pub action: PendingAction,
}

impl ConfirmationDialog {
    pub fn for_action(action: PendingAction) -> Self {
        let (title, message, confirm_label, is_destructive) = match &action {
            PendingAction::MoveToBin { .. } => (
                "Move to Bin",
                "Move this idea to the bin? You can restore it later.",
                "Move",
                true,
            ),
            PendingAction::DeleteForever { .. } => (
                "Delete Forever",
                "Permanently delete this idea? This cannot be undone.",
                "Delete",
                true,
            ),
            PendingAction::EmptyBin => (
                "Empty Bin",
                "Permanently delete every idea in the bin? This cannot be undone.",
                "Empty Bin",
                true,
            ),
            PendingAction::DeleteChannel { .. } => (
                "Delete Channel",
                "Delete this channel? Ideas in it are handled by your deletion setting.",
                "Delete",
                true,
            ),
            PendingAction::DeleteStatus { .. } => (
                "Delete Status",
                "Delete this pipeline stage? Ideas in it are handled by your deletion setting.",
                "Delete",
                true,
            ),
            PendingAction::SignOut => ("Sign Out", "Sign out of CreatorFlow?", "Sign Out", false),
        };

        Self {
            title: title.to_string(),
            message: message.to_string(),
            confirm_label: confirm_label.to_string(),
            cancel_label: "Cancel".to_string(),
            is_destructive,
            action,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Modal {
    /// `None` creates a new idea
    EditIdea { idea_id: Option<String> },
    Confirm(ConfirmationDialog),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Router {
    screen: Screen,
    view: TopView,
    detail: Option<String>,
    modals: Vec<Modal>,
}

impl Router {
    /// Start on Home with nothing open
    pub fn new() -> Self {
        Self {
            screen: Screen::Main,
            view: TopView::Home,
            detail: None,
            modals: Vec::new(),
        }
    }

    /// Start on the sign-in page
    pub fn signed_out() -> Self {
        Self {
            screen: Screen::Auth,
            ..Self::new()
        }
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn view(&self) -> TopView {
        self.view
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    pub fn modals(&self) -> &[Modal] {
        &self.modals
    }

    pub fn top_modal(&self) -> Option<&Modal> {
        self.modals.last()
    }

    pub fn pending_confirmation(&self) -> Option<&ConfirmationDialog> {
        match self.modals.last() {
            Some(Modal::Confirm(dialog)) => Some(dialog),
            _ => None,
        }
    }

    fn ensure_interactive(&self) -> Result<()> {
        if self.screen == Screen::Auth {
            return Err(AppError::NotSignedIn);
        }
        if self.pending_confirmation().is_some() {
            return Err(AppError::InputBlocked);
        }
        Ok(())
    }

    pub fn navigate(&mut self, view: TopView) -> Result<()> {
        self.ensure_interactive()?;
        self.view = view;
        self.detail = None;
        self.modals.clear();
        Ok(())
    }

    pub fn open_idea(&mut self, idea_id: &str) -> Result<()> {
        self.ensure_interactive()?;
        self.detail = Some(idea_id.to_string());
        Ok(())
    }

    pub fn close_detail(&mut self) -> Result<()> {
        self.ensure_interactive()?;
        self.detail = None;
        Ok(())
    }

    /// Open the editor; an open detail overlay stays underneath
    pub fn open_editor(&mut self, idea_id: Option<&str>) -> Result<()> {
        self.ensure_interactive()?;
        self.modals.push(Modal::EditIdea {
            idea_id: idea_id.map(str::to_string),
        });
        Ok(())
    }

    pub fn close_editor(&mut self) -> Result<()> {
        self.ensure_interactive()?;
        if matches!(self.modals.last(), Some(Modal::EditIdea { .. })) {
            self.modals.pop();
        }
        Ok(())
    }

    /// Suspend everything else until the user confirms or cancels
    pub fn request_confirmation(&mut self, action: PendingAction) -> Result<&ConfirmationDialog> {
        self.ensure_interactive()?;
        self.modals
            .push(Modal::Confirm(ConfirmationDialog::for_action(action)));
        self.pending_confirmation().ok_or(AppError::NothingPending)
    }

    /// Accept the open dialog. Every modal closes, and so does the detail
    /// overlay when the action removes the idea it shows.
    pub fn confirm(&mut self) -> Result<PendingAction> {
        let action = self
            .pending_confirmation()
            .map(|dialog| dialog.action.clone())
            .ok_or(AppError::NothingPending)?;

        self.modals.clear();
        if action.idea_id().is_some() && action.idea_id() == self.detail.as_deref() {
            self.detail = None;
        }
        if action == PendingAction::SignOut {
            self.sign_out();
        }

        Ok(action)
    }

    /// Dismiss the open dialog and nothing else
    pub fn cancel(&mut self) -> Result<()> {
        if self.pending_confirmation().is_none() {
            return Err(AppError::NothingPending);
        }
        self.modals.pop();
        Ok(())
    }

    pub fn sign_in(&mut self) {
        *self = Self::new();
    }

    pub fn sign_out(&mut self) {
        *self = Self::signed_out();
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bin(id: &str) -> PendingAction {
        PendingAction::MoveToBin {
            idea_id: id.to_string(),
        }
    }

    #[test]
    fn test_initial_state() {
        let router = Router::new();
        assert_eq!(router.screen(), Screen::Main);
        assert_eq!(router.view(), TopView::Home);
        assert!(router.detail().is_none());
        assert!(router.modals().is_empty());
    }

    #[test]
    fn test_navigate_clears_detail() {
        let mut router = Router::new();
        router.open_idea("i1").unwrap();
        router.navigate(TopView::Calendar).unwrap();

        assert_eq!(router.view(), TopView::Calendar);
        assert!(router.detail().is_none());
    }

    #[test]
    fn test_editor_keeps_overlay() {
        let mut router = Router::new();
        router.open_idea("i1").unwrap();
        router.open_editor(Some("i1")).unwrap();

        assert_eq!(router.detail(), Some("i1"));
        assert!(matches!(router.top_modal(), Some(Modal::EditIdea { .. })));

        router.close_editor().unwrap();
        assert!(router.modals().is_empty());
        assert_eq!(router.detail(), Some("i1"));
    }

    #[test]
    fn test_confirmation_blocks_input() {
        let mut router = Router::new();
        router.request_confirmation(PendingAction::EmptyBin).unwrap();

        assert!(matches!(router.navigate(TopView::Settings), Err(AppError::InputBlocked)));
        assert!(matches!(router.open_idea("i1"), Err(AppError::InputBlocked)));
        assert!(matches!(
            router.request_confirmation(PendingAction::SignOut),
            Err(AppError::InputBlocked)
        ));
    }

    #[test]
    fn test_confirm_closes_overlay_of_removed_idea() {
        let mut router = Router::new();
        router.open_idea("i1").unwrap();
        router.open_editor(Some("i1")).unwrap();
        router.request_confirmation(bin("i1")).unwrap();

        assert_eq!(router.confirm().unwrap(), bin("i1"));
        assert!(router.modals().is_empty());
        assert!(router.detail().is_none());
    }

    #[test]
    fn test_confirm_keeps_unrelated_overlay() {
        let mut router = Router::new();
        router.open_idea("i1").unwrap();
        router.request_confirmation(PendingAction::EmptyBin).unwrap();

        router.confirm().unwrap();
        assert_eq!(router.detail(), Some("i1"));
    }

    #[test]
    fn test_cancel_closes_only_the_dialog() {
        let mut router = Router::new();
        router.open_idea("i1").unwrap();
        router.open_editor(Some("i1")).unwrap();
        router.request_confirmation(bin("i1")).unwrap();

        router.cancel().unwrap();
        assert_eq!(router.modals().len(), 1);
        assert_eq!(router.detail(), Some("i1"));
        assert!(matches!(router.cancel(), Err(AppError::NothingPending)));
        assert!(matches!(router.confirm(), Err(AppError::NothingPending)));
    }

    #[test]
    fn test_dialog_text() {
        let dialog = ConfirmationDialog::for_action(PendingAction::DeleteForever {
            idea_id: "i1".to_string(),
        });
        assert_eq!(dialog.confirm_label, "Delete");
        assert_eq!(dialog.cancel_label, "Cancel");
        assert!(dialog.is_destructive);
        assert!(!ConfirmationDialog::for_action(PendingAction::SignOut).is_destructive);
    }

    #[test]
    fn test_sign_out_and_back_in() {
        let mut router = Router::new();
        router.navigate(TopView::Settings).unwrap();
        router.request_confirmation(PendingAction::SignOut).unwrap();
        router.confirm().unwrap();

        assert_eq!(router.screen(), Screen::Auth);
        assert!(matches!(router.navigate(TopView::Home), Err(AppError::NotSignedIn)));

        router.sign_in();
        assert_eq!(router.screen(), Screen::Main);
        assert_eq!(router.view(), TopView::Home);
    }
}
