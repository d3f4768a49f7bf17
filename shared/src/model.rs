use serde::{Deserialize, Serialize};

use crate::api::{
    Credentials, HistoryItemType, HistoryPage, HistoryQuery, ImageAnalysis, SignedIn, Summary,
};
use crate::capabilities::StorageKey;
use crate::config::ClientConfig;
use crate::session::SessionStore;
use crate::task::Task;
use crate::validation::{DocumentRule, InputMode, InputPayload};
use crate::DEFAULT_TOKEN_KEY;

pub type AuthTask = Task<Credentials, SignedIn>;
pub type ImageTask = Task<InputPayload, ImageAnalysis>;
pub type SummaryTask = Task<InputPayload, Summary>;
pub type HistoryTask = Task<HistoryQuery, HistoryPage>;

#[derive(Default, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AuthTab {
    #[default]
    Login,
    Signup,
}

#[derive(Default, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DashboardTab {
    #[default]
    ImageAnalysis,
    Summarize,
    History,
}

#[derive(Default, Debug)]
pub struct ImagePanel {
    /// Optional question sent alongside the image.
    pub prompt: String,
    pub task: ImageTask,
}

#[derive(Default, Debug)]
pub struct SummarizerPanel {
    pub mode: InputMode,
    pub max_length: Option<u32>,
    pub task: SummaryTask,
}

impl SummarizerPanel {
    #[must_use]
    pub fn rule(&self) -> DocumentRule {
        DocumentRule { mode: self.mode }
    }
}

#[derive(Default, Debug)]
pub struct HistoryPanel {
    pub filter: Option<HistoryItemType>,
    pub task: HistoryTask,
}

#[derive(Debug)]
pub struct Model {
    pub config: ClientConfig,
    /// Validated form of `config.token_key`.
    pub token_key: StorageKey,
    pub session: SessionStore,

    pub auth_tab: AuthTab,
    pub auth: AuthTask,
    /// Why the last session ended, when it was not an explicit logout.
    pub session_notice: Option<String>,

    pub dashboard_tab: DashboardTab,
    pub image: ImagePanel,
    pub summarizer: SummarizerPanel,
    pub history: HistoryPanel,
}

impl Default for Model {
    fn default() -> Self {
        Self {
            config: ClientConfig::default(),
            token_key: default_token_key(),
            session: SessionStore::default(),
            auth_tab: AuthTab::default(),
            auth: AuthTask::default(),
            session_notice: None,
            dashboard_tab: DashboardTab::default(),
            image: ImagePanel::default(),
            summarizer: SummarizerPanel::default(),
            history: HistoryPanel::default(),
        }
    }
}

impl Model {
    /// Drops every task's input, result and in-flight request.
    pub fn reset_tasks(&mut self) {
        self.auth.reset();
        self.image.task.reset();
        self.image.prompt.clear();
        self.summarizer.task.reset();
        self.history.task.reset();
    }

    #[must_use]
    pub fn history_query(&self) -> HistoryQuery {
        HistoryQuery::new(self.config.history_limit).with_item_type(self.history.filter)
    }
}

fn default_token_key() -> StorageKey {
    StorageKey::new(DEFAULT_TOKEN_KEY).expect("default token key is valid")
}
