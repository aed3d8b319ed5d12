use background_service::{FeedService, RefreshOutcome};
use chrono::{DateTime, Local};
use iced::widget::{
    button, column, container, horizontal_rule, row, scrollable, text, toggler, Column,
};
use iced::{Command, Element, Length, Subscription};
use moodwatch_core::{AppConfig, CoreError, ErrorExt, ErrorReporter, ProcessedPost};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub const TITLE: &str = "Análisis de emociones de Reddit";

/// Stored history rows shown under "past posts".
const HISTORY_LIMIT: u32 = 50;

#[derive(Debug, Clone)]
pub enum Message {
    ServiceReady(Result<Arc<FeedService>, String>),
    Refresh,
    Tick,
    Refreshed(Result<RefreshOutcome, String>),
    HistoryLoaded(Result<Vec<ProcessedPost>, String>),
    ToggleShowPast(bool),
}

pub struct App {
    config: AppConfig,
    service: Option<Arc<FeedService>>,
    latest: Vec<ProcessedPost>,
    past: Vec<ProcessedPost>,
    show_past: bool,
    history_loaded: bool,
    loading: bool,
    status: String,
    last_refresh: Option<DateTime<Local>>,
}

/// Logs the error and turns it into something a person can read.
fn report(error: CoreError) -> String {
    ErrorReporter::new()
        .with_warning_reporting(false)
        .report_error(&error);
    error.user_friendly_message()
}

impl App {
    pub fn new(config: AppConfig) -> (Self, Command<Message>) {
        let app = Self {
            show_past: config.show_past_posts,
            config: config.clone(),
            service: None,
            latest: Vec::new(),
            past: Vec::new(),
            history_loaded: false,
            loading: true,
            status: "Conectando con Reddit...".to_string(),
            last_refresh: None,
        };

        let command = Command::perform(
            async move {
                FeedService::from_config(&config)
                    .await
                    .map(Arc::new)
                    .map_err(report)
            },
            Message::ServiceReady,
        );

        (app, command)
    }

    pub fn title(&self) -> String {
        format!("{} - r/{}", TITLE, self.config.subreddit)
    }

    pub fn latest(&self) -> &[ProcessedPost] {
        &self.latest
    }

    pub fn past(&self) -> &[ProcessedPost] {
        &self.past
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn update(&mut self, message: Message) -> Command<Message> {
        match message {
            Message::ServiceReady(Ok(service)) => {
                info!("Feed service ready for r/{}", service.subreddit());
                self.service = Some(service);
                self.loading = false;
                let mut commands = vec![self.start_refresh()];
                if self.show_past {
                    commands.push(self.load_history());
                }
                Command::batch(commands)
            }
            Message::ServiceReady(Err(message)) => {
                self.loading = false;
                self.status = message;
                Command::none()
            }
            Message::Refresh | Message::Tick => self.start_refresh(),
            Message::Refreshed(Ok(outcome)) => {
                self.loading = false;
                self.last_refresh = Some(Local::now());
                self.status = format!(
                    "{} publicaciones nuevas, {} ya analizadas",
                    outcome.new_posts.len(),
                    outcome.skipped
                );
                if outcome.failed > 0 {
                    self.status
                        .push_str(&format!(", {} sin analizar", outcome.failed));
                }
                self.apply_new_posts(outcome.new_posts);
                Command::none()
            }
            Message::Refreshed(Err(message)) => {
                self.loading = false;
                self.status = message;
                Command::none()
            }
            Message::HistoryLoaded(Ok(posts)) => {
                self.history_loaded = true;
                self.merge_history(posts);
                Command::none()
            }
            Message::HistoryLoaded(Err(message)) => {
                self.status = message;
                Command::none()
            }
            Message::ToggleShowPast(show) => {
                self.show_past = show;
                if show && !self.history_loaded {
                    self.load_history()
                } else {
                    Command::none()
                }
            }
        }
    }

    fn start_refresh(&mut self) -> Command<Message> {
        let Some(service) = self.service.clone() else {
            return Command::none();
        };
        if self.loading {
            debug!("Refresh already running");
            return Command::none();
        }

        self.loading = true;
        self.status = "Actualizando...".to_string();
        Command::perform(
            async move { service.refresh().await.map_err(report) },
            Message::Refreshed,
        )
    }

    fn load_history(&self) -> Command<Message> {
        match self.service.clone() {
            Some(service) if service.has_history() => Command::perform(
                async move { service.past_posts(HISTORY_LIMIT).await.map_err(report) },
                Message::HistoryLoaded,
            ),
            _ => Command::none(),
        }
    }

    /// New posts replace the current list; the old list moves to the front of the past list.
    fn apply_new_posts(&mut self, posts: Vec<ProcessedPost>) {
        if posts.is_empty() {
            return;
        }
        let mut previous = std::mem::replace(&mut self.latest, posts);
        previous.append(&mut self.past);
        self.past = previous;
        self.dedup_past();
    }

    /// Stored history goes after the session's own posts.
    fn merge_history(&mut self, posts: Vec<ProcessedPost>) {
        self.past.extend(posts);
        self.dedup_past();
    }

    fn dedup_past(&mut self) {
        let mut shown: HashSet<String> =
            self.latest.iter().map(|p| p.id().to_string()).collect();
        self.past.retain(|p| shown.insert(p.id().to_string()));
    }

    pub fn subscription(&self) -> Subscription<Message> {
        if self.service.is_some() {
            iced::time::every(Duration::from_secs(self.config.polling_interval_seconds))
                .map(|_| Message::Tick)
        } else {
            Subscription::none()
        }
    }

    pub fn view(&self) -> Element<'_, Message> {
        let header = column![
            text(TITLE).size(28),
            text(format!(
                "Este es un análisis de emociones para publicaciones del subreddit r/{}.",
                self.config.subreddit
            ))
            .size(16),
        ]
        .spacing(6);

        let refreshed = match &self.last_refresh {
            Some(at) => format!("Última actualización: {}", at.format("%H:%M:%S")),
            None => String::new(),
        };

        let controls = row![
            button("Actualizar").on_press_maybe((!self.loading).then_some(Message::Refresh)),
            toggler(
                "Mostrar publicaciones anteriores".to_string(),
                self.show_past,
                Message::ToggleShowPast
            )
            .width(Length::Shrink),
            text(refreshed).size(14),
        ]
        .spacing(20);

        let mut body = Column::new().spacing(16);
        if self.latest.is_empty() {
            body = body.push(text("No hay publicaciones nuevas.").size(16));
        } else {
            for post in &self.latest {
                body = body.push(post_card(post));
            }
        }

        if self.show_past {
            body = body
                .push(horizontal_rule(2))
                .push(text("Publicaciones anteriores").size(22));
            if self.past.is_empty() {
                body = body.push(text("Todavía no hay publicaciones anteriores.").size(14));
            }
            for post in &self.past {
                body = body.push(post_card(post));
            }
        }

        let content = column![
            header,
            controls,
            text(&self.status).size(14),
            scrollable(body).height(Length::Fill),
        ]
        .spacing(16);

        container(content)
            .width(Length::Fill)
            .height(Length::Fill)
            .padding(20)
            .into()
    }
}

fn post_card(post: &ProcessedPost) -> Element<'_, Message> {
    container(
        column![
            text(&post.post.title).size(20),
            text(format!("Autor: {}", post.post.author)).size(14),
            text(format!("Contenido: {}", post.post.text())).size(14),
            text(format!("Ver publicación en Reddit: {}", post.post.permalink)).size(14),
            text(format!("Emoción detectada: {}", post.emotion)).size(16),
            text(format!("Consejo: {}", post.advice)).size(16),
        ]
        .spacing(6),
    )
    .padding(12)
    .width(Length::Fill)
    .into()
}
