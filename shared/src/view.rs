//! Pure projection of the [`Model`] into what the shell renders.

use serde::{Deserialize, Serialize};

use crate::api::{Credentials, HistoryItemType, HistoryPage, ImageAnalysis, SignedIn, Summary};
use crate::model::{AuthTab, DashboardTab, Model};
use crate::task::{Task, TaskStatus};
use crate::validation::{InputMode, InputPayload};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Screen {
    /// The stored session has not been read yet.
    Restoring,
    Auth { tab: AuthTab },
    Dashboard { tab: DashboardTab },
}

/// Renderable state of one task.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TaskView<R> {
    pub status: TaskStatus,
    pub input_label: Option<String>,
    pub result: Option<R>,
    pub error: Option<String>,
    pub error_code: Option<String>,
    pub notice: Option<String>,
    pub is_loading: bool,
    pub can_submit: bool,
    pub can_reset: bool,
}

impl<R: Clone> TaskView<R> {
    fn project<I>(task: &Task<I, R>, label: impl Fn(&I) -> String) -> Self {
        Self {
            status: task.status(),
            input_label: task.input().map(label),
            result: task.result().cloned(),
            error: task.error().map(|e| e.message.clone()),
            error_code: task.error().map(|e| e.code().to_string()),
            notice: task.notice().map(ToString::to_string),
            is_loading: task.is_loading(),
            can_submit: task.can_submit(),
            can_reset: task.can_reset(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AuthView {
    pub tab: AuthTab,
    pub session_notice: Option<String>,
    pub task: TaskView<SignedIn>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ImageView {
    pub prompt: String,
    pub task: TaskView<ImageAnalysis>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SummarizerView {
    pub mode: InputMode,
    pub max_length: Option<u32>,
    pub task: TaskView<Summary>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct HistoryView {
    pub filter: Option<HistoryItemType>,
    pub task: TaskView<HistoryPage>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ViewModel {
    pub screen: Screen,
    pub auth: AuthView,
    pub image: ImageView,
    pub summarizer: SummarizerView,
    pub history: HistoryView,
}

fn payload_label(input: &InputPayload) -> String {
    input.label().to_string()
}

#[must_use]
pub fn project(model: &Model) -> ViewModel {
    let screen = if model.session.is_restoring() {
        Screen::Restoring
    } else if model.session.is_authenticated() {
        Screen::Dashboard {
            tab: model.dashboard_tab,
        }
    } else {
        Screen::Auth {
            tab: model.auth_tab,
        }
    };

    ViewModel {
        screen,
        auth: AuthView {
            tab: model.auth_tab,
            session_notice: model.session_notice.clone(),
            task: TaskView::project(&model.auth, |c: &Credentials| c.username.clone()),
        },
        image: ImageView {
            prompt: model.image.prompt.clone(),
            task: TaskView::project(&model.image.task, payload_label),
        },
        summarizer: SummarizerView {
            mode: model.summarizer.mode,
            max_length: model.summarizer.max_length,
            task: TaskView::project(&model.summarizer.task, payload_label),
        },
        history: HistoryView {
            filter: model.history.filter,
            task: TaskView::project(&model.history.task, |q| match q.item_type {
                Some(item_type) => format!("{} ({})", item_type.as_str(), q.limit),
                None => format!("all ({})", q.limit),
            }),
        },
    }
}
