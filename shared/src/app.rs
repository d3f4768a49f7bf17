use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::api::{interpret, ApiCall, ApiClient, AuthGrant, Endpoint, SignedIn};
use crate::capabilities::{Capabilities, HttpCapability, HttpOutcome, StorageKey};
use crate::config::{ClientConfig, ConfigError};
use crate::event::Event;
use crate::model::{AuthTab, DashboardTab, Model};
use crate::session::Restored;
use crate::task::{Generation, Resolution, Submission, Task, TaskRejected};
use crate::validation::{
    CredentialsRule, HistoryQueryRule, ImageRule, InputPayload, TextInput, ValidationRule,
};
use crate::view::{self, ViewModel};
use crate::{ApiError, SESSION_EXPIRED_MESSAGE};

#[derive(Default)]
pub struct App;

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        match event {
            // Lifecycle
            Event::Configure(config) => Self::configure(config, model),
            Event::AppStarted => {
                model.session.restore(&model.token_key, &caps.key_value);
            }
            Event::TokenRestored(result) => {
                let restored = model
                    .session
                    .on_restored(&model.token_key, result, &caps.key_value);
                if restored == Restored::Found {
                    Self::enter_dashboard(model, caps);
                }
            }
            Event::TokenPersisted(result) => {
                if let Err(e) = result {
                    warn!(error = %e, "session token was not persisted");
                }
                return;
            }
            Event::TokenCleared(result) => {
                if let Err(e) = result {
                    warn!(error = %e, "stored session token was not cleared");
                }
                return;
            }

            // Auth
            Event::SelectAuthTab(tab) => {
                if tab != model.auth_tab {
                    model.auth_tab = tab;
                    model.auth.reset();
                }
            }
            Event::CredentialsSubmitted(credentials) => {
                if model.session.is_authenticated() {
                    debug!("already signed in, ignoring credentials");
                    return;
                }
                model.session_notice = None;
                if Self::accept_input(&mut model.auth, credentials, &CredentialsRule) {
                    let endpoint = match model.auth_tab {
                        AuthTab::Login => Endpoint::Login,
                        AuthTab::Signup => Endpoint::Signup,
                    };
                    let client = ApiClient::new(&model.config.base_url, None);
                    Self::submit_task(
                        &mut model.auth,
                        client,
                        &caps.http,
                        |credentials| match endpoint {
                            Endpoint::Signup => ApiCall::signup(credentials),
                            _ => ApiCall::login(credentials),
                        },
                        move |generation, outcome| Event::AuthResponse {
                            endpoint,
                            generation,
                            outcome: Box::new(outcome),
                        },
                    );
                }
            }
            Event::AuthResponse {
                endpoint,
                generation,
                outcome,
            } => {
                let (token, result) = match interpret::<AuthGrant>(endpoint, *outcome) {
                    Ok(AuthGrant { token, message }) => (Some(token), Ok(SignedIn { message })),
                    Err(e) => (None, Err(e)),
                };

                match model.auth.resolve(generation, result) {
                    Resolution::Applied => {
                        if let Some(token) = token {
                            model.session.login(token, &model.token_key, &caps.key_value);
                            model.session_notice = None;
                            Self::enter_dashboard(model, caps);
                        }
                    }
                    Resolution::Stale => {
                        debug!(endpoint = %endpoint, "discarding stale auth response");
                        return;
                    }
                }
            }
            Event::Logout => Self::end_session(model, caps, None),

            // Dashboard
            Event::SelectDashboardTab(tab) => {
                if !model.session.is_authenticated() || tab == model.dashboard_tab {
                    return;
                }
                match model.dashboard_tab {
                    DashboardTab::ImageAnalysis => {
                        model.image.task.reset();
                        model.image.prompt.clear();
                    }
                    DashboardTab::Summarize => model.summarizer.task.reset(),
                    DashboardTab::History => model.history.task.reset(),
                }
                model.dashboard_tab = tab;
                Self::enter_dashboard(model, caps);
            }

            // Image analysis
            Event::ImageSelected(input) => {
                Self::accept_input(&mut model.image.task, input, &ImageRule);
            }
            Event::ImagePromptChanged(prompt) => model.image.prompt = prompt,
            Event::AnalyzeImage => {
                let client = ApiClient::new(&model.config.base_url, model.session.token());
                let prompt = model.image.prompt.as_str();
                Self::submit_task(
                    &mut model.image.task,
                    client,
                    &caps.http,
                    |input| ApiCall::analyze_image(input, Some(prompt)),
                    |generation, outcome| Event::ImageResponse {
                        generation,
                        outcome: Box::new(outcome),
                    },
                );
            }
            Event::ImageResponse {
                generation,
                outcome,
            } => {
                let unauthorized = Self::settle(
                    &mut model.image.task,
                    Endpoint::AnalyzeImage,
                    generation,
                    *outcome,
                );
                Self::on_settled(model, caps, unauthorized);
            }
            Event::ResetImage => {
                model.image.task.reset();
                model.image.prompt.clear();
            }

            // Summarization
            Event::SummarizerModeChanged(mode) => {
                if mode != model.summarizer.mode {
                    model.summarizer.mode = mode;
                    model.summarizer.task.reset();
                }
            }
            Event::DocumentSelected(file) => {
                let rule = model.summarizer.rule();
                Self::accept_input(&mut model.summarizer.task, InputPayload::File(file), &rule);
            }
            Event::UrlChanged(value) => {
                let rule = model.summarizer.rule();
                Self::accept_input(
                    &mut model.summarizer.task,
                    InputPayload::Text(TextInput { value }),
                    &rule,
                );
            }
            Event::MaxLengthChanged(max_length) => {
                model.summarizer.max_length = max_length.filter(|n| *n > 0);
            }
            Event::Summarize => {
                let client = ApiClient::new(&model.config.base_url, model.session.token());
                let max_length = model.summarizer.max_length;
                Self::submit_task(
                    &mut model.summarizer.task,
                    client,
                    &caps.http,
                    |input| Ok(ApiCall::summarize(input, max_length)),
                    |generation, outcome| Event::SummaryResponse {
                        generation,
                        outcome: Box::new(outcome),
                    },
                );
            }
            Event::SummaryResponse {
                generation,
                outcome,
            } => {
                let unauthorized = Self::settle(
                    &mut model.summarizer.task,
                    Endpoint::Summarize,
                    generation,
                    *outcome,
                );
                Self::on_settled(model, caps, unauthorized);
            }
            Event::ResetSummary => model.summarizer.task.reset(),

            // History
            Event::HistoryRequested => Self::fetch_history(model, caps),
            Event::HistoryFilterChanged(filter) => {
                if filter != model.history.filter {
                    // Drops any response still in flight for the previous filter.
                    model.history.task.reset();
                }
                model.history.filter = filter;
                Self::fetch_history(model, caps);
            }
            Event::HistoryResponse {
                generation,
                outcome,
            } => {
                let unauthorized = Self::settle(
                    &mut model.history.task,
                    Endpoint::History,
                    generation,
                    *outcome,
                );
                Self::on_settled(model, caps, unauthorized);
            }
            Event::ResetHistory => model.history.task.reset(),
        }

        caps.render.render();
    }

    fn view(&self, model: &Model) -> ViewModel {
        view::project(model)
    }
}

impl App {
    fn configure(config: ClientConfig, model: &mut Model) {
        // The token slot and base URL are fixed while a session may exist.
        if model.session.is_authenticated() || model.session.is_restoring() {
            warn!("ignoring client configuration while a session is active");
            return;
        }

        let validated = config
            .validate()
            .and_then(|()| StorageKey::new(config.token_key.as_str()).map_err(ConfigError::from));

        match validated {
            Ok(token_key) => {
                info!(
                    base_url = config.base_url.as_str(),
                    logout_on_unauthorized = config.logout_on_unauthorized,
                    "client configured"
                );
                model.token_key = token_key;
                model.config = config;
            }
            Err(e) => warn!(error = %e, "rejected client configuration"),
        }
    }

    /// Runs `input` through `rule` into `task`. Returns whether it was stored.
    fn accept_input<I, R, V>(task: &mut Task<I, R>, input: I, rule: &V) -> bool
    where
        I: Clone,
        V: ValidationRule<I>,
    {
        match task.set_input(input, rule) {
            Ok(()) => true,
            Err(TaskRejected::Busy) => {
                debug!("input ignored while a request is in flight");
                false
            }
            Err(TaskRejected::Invalid(e)) => {
                debug!(notice = %e, "input rejected");
                false
            }
        }
    }

    /// Moves `task` to `Loading` and sends its request. A request that cannot
    /// be built fails the task immediately.
    fn submit_task<I, R, B, E>(
        task: &mut Task<I, R>,
        client: ApiClient<'_>,
        http: &HttpCapability,
        build: B,
        respond: E,
    ) where
        I: Clone,
        B: FnOnce(&I) -> Result<ApiCall, ApiError>,
        E: FnOnce(Generation, HttpOutcome) -> Event + Send + 'static,
    {
        let Some(Submission { generation, input }) = task.submit() else {
            debug!(status = ?task.status(), "nothing to submit");
            return;
        };

        match build(&input).and_then(|call| client.request(call)) {
            Ok(request) => {
                debug!(generation = generation.value(), url = request.url(), "submitting");
                request.send(http, move |outcome| respond(generation, outcome));
            }
            Err(e) => {
                warn!(error = %e, "request could not be built");
                task.resolve(generation, Err(e));
            }
        }
    }

    /// Applies a response to `task`. Returns true when an applied response was
    /// a 401.
    fn settle<I, R>(
        task: &mut Task<I, R>,
        endpoint: Endpoint,
        generation: Generation,
        outcome: HttpOutcome,
    ) -> bool
    where
        I: Clone,
        R: DeserializeOwned,
    {
        let result = interpret::<R>(endpoint, outcome);
        let unauthorized = result.as_ref().is_err_and(ApiError::is_unauthorized);

        match task.resolve(generation, result) {
            Resolution::Applied => {
                debug!(endpoint = %endpoint, status = ?task.status(), "response applied");
                unauthorized
            }
            Resolution::Stale => {
                debug!(
                    endpoint = %endpoint,
                    generation = generation.value(),
                    "discarding stale response"
                );
                false
            }
        }
    }

    fn on_settled(model: &mut Model, caps: &Capabilities, unauthorized: bool) {
        if unauthorized && model.config.logout_on_unauthorized && model.session.is_authenticated() {
            warn!("backend rejected the session token, logging out");
            Self::end_session(model, caps, Some(SESSION_EXPIRED_MESSAGE.to_string()));
        }
    }

    fn end_session(model: &mut Model, caps: &Capabilities, notice: Option<String>) {
        model.session.logout(&model.token_key, &caps.key_value);
        model.reset_tasks();
        model.auth_tab = AuthTab::default();
        model.dashboard_tab = DashboardTab::default();
        model.summarizer.mode = Default::default();
        model.session_notice = notice;
    }

    /// Loads whatever the active dashboard tab shows on entry.
    fn enter_dashboard(model: &mut Model, caps: &Capabilities) {
        if model.session.is_authenticated() && model.dashboard_tab == DashboardTab::History {
            Self::fetch_history(model, caps);
        }
    }

    fn fetch_history(model: &mut Model, caps: &Capabilities) {
        let query = model.history_query();
        if !Self::accept_input(&mut model.history.task, query, &HistoryQueryRule) {
            return;
        }

        let client = ApiClient::new(&model.config.base_url, model.session.token());
        Self::submit_task(
            &mut model.history.task,
            client,
            &caps.http,
            |query| Ok(ApiCall::history(*query)),
            |generation, outcome| Event::HistoryResponse {
                generation,
                outcome: Box::new(outcome),
            },
        );
    }
}
