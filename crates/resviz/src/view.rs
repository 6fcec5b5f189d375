//! Frontend view state, driven only by the coordinator

use chrono::{DateTime, Utc};
use resviz_core::{Dataset, ServiceData};

/// What the frontend is currently showing
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ViewState {
    /// Nothing requested yet
    #[default]
    Idle,
    /// A batch job is in flight
    Loading,
    /// Data adopted from the cache
    Completed(ServiceData),
    /// A templated message for the user
    Error(String),
}

impl ViewState {
    /// Short name for logs and JSON output
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Completed(_) => "completed",
            Self::Error(_) => "error",
        }
    }
}

/// View state plus the data it was last populated with
///
/// The rendering layer only reads this; transitions happen through the
/// coordinator.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    view: ViewState,
    loading_since: Option<DateTime<Utc>>,
}

impl AppState {
    /// Fresh, idle state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current view
    #[must_use]
    pub const fn view(&self) -> &ViewState {
        &self.view
    }

    /// Whether a batch job is in flight
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self.view, ViewState::Loading)
    }

    /// When the current loading phase began
    #[must_use]
    pub const fn loading_since(&self) -> Option<DateTime<Utc>> {
        self.loading_since
    }

    /// Whether data has been adopted
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self.view, ViewState::Completed(_))
    }

    /// Adopted data, if any
    #[must_use]
    pub const fn data(&self) -> Option<&ServiceData> {
        match &self.view {
            ViewState::Completed(data) => Some(data),
            _ => None,
        }
    }

    /// Dataset of one service, if adopted
    #[must_use]
    pub fn dataset(&self, service: &str) -> Option<&Dataset> {
        self.data().and_then(|data| data.get(service))
    }

    /// Error message, if the view is an error
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match &self.view {
            ViewState::Error(message) => Some(message),
            _ => None,
        }
    }

    /// Whether any adopted dataset has rows
    #[must_use]
    pub fn has_data(&self) -> bool {
        self.data()
            .is_some_and(|data| data.values().any(|dataset| !dataset.is_empty()))
    }

    pub(crate) fn set_loading(&mut self) {
        if !self.is_loading() {
            self.loading_since = Some(Utc::now());
        }
        self.view = ViewState::Loading;
    }

    pub(crate) fn set_completed(&mut self, data: ServiceData) {
        self.view = ViewState::Completed(data);
        self.loading_since = None;
    }

    pub(crate) fn set_error(&mut self, message: impl Into<String>) {
        self.view = ViewState::Error(message.into());
        self.loading_since = None;
    }

    pub(crate) fn reset(&mut self) {
        self.view = ViewState::Idle;
        self.loading_since = None;
    }
}
