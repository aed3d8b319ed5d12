use background_service::BackgroundService;
use gui::App;
use iced::{Application, Settings};
use moodwatch_core::{AppConfig, ErrorExt};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str =
    "moodwatch=info,moodwatch_core=info,reddit_client=info,emotion_engine=info,database=info,background_service=info,gui=info";

fn main() -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = AppConfig::load().map_err(|e| {
        e.log_error();
        anyhow::anyhow!(e.user_friendly_message())
    })?;

    if std::env::args().skip(1).any(|arg| arg == "--watch") {
        return run_headless(config);
    }

    tracing::info!("Starting moodwatch dashboard for r/{}", config.subreddit);

    let settings = Settings {
        window: iced::window::Settings {
            size: iced::Size::new(1000.0, 800.0),
            min_size: Some(iced::Size::new(640.0, 480.0)),
            ..Default::default()
        },
        ..Settings::with_flags(config)
    };

    MoodwatchApp::run(settings).map_err(|e| {
        tracing::error!("Application error: {}", e);
        anyhow::anyhow!("GUI error: {e}")
    })
}

/// Polls and logs without a window until Ctrl-C.
fn run_headless(config: AppConfig) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;

    runtime.block_on(async move {
        let service = BackgroundService::from_config(&config).await?;

        if config.show_past_posts {
            for post in service.feed().past_posts(config.post_limit).await? {
                tracing::info!(
                    post_id = %post.id(),
                    emotion = %post.emotion,
                    "Previously analysed: {}",
                    post.post.title
                );
            }
        }

        let handle = service.start();
        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutting down");
        service.stop();
        handle.await?;
        Ok::<(), anyhow::Error>(())
    })
}

struct MoodwatchApp {
    app: App,
}

impl Application for MoodwatchApp {
    type Message = gui::Message;
    type Theme = iced::Theme;
    type Executor = iced::executor::Default;
    type Flags = AppConfig;

    fn new(flags: Self::Flags) -> (Self, iced::Command<Self::Message>) {
        tracing::info!("Initializing application");
        let (app, command) = App::new(flags);
        (Self { app }, command)
    }

    fn title(&self) -> String {
        self.app.title()
    }

    fn update(&mut self, message: Self::Message) -> iced::Command<Self::Message> {
        self.app.update(message)
    }

    fn view(&self) -> iced::Element<Self::Message> {
        self.app.view()
    }

    fn subscription(&self) -> iced::Subscription<Self::Message> {
        self.app.subscription()
    }
}
