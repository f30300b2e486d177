mod adapter;
mod telegram;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderValue, Request, StatusCode},
    middleware::{Next, from_fn},
    response::Json,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use tracing::{Instrument, debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use order_flow::{
    Catalog, DialogueRunner, Event, FlowEngine, InMemorySessionStore, PresentationAdapter,
    Selection, SessionStore, UserProfile,
};

use crate::adapter::{TelegramNotifier, TelegramPresenter};
use crate::telegram::{TelegramClient, Update};

#[derive(Clone)]
struct AppState {
    runner: Arc<DialogueRunner>,
    presenter: Arc<TelegramPresenter>,
    webhook_token: Arc<String>,
}

struct Config {
    bot_token: String,
    manager_chat_id: i64,
    webhook_url: Option<String>,
    port: u16,
    photos_dir: String,
    session_idle: Duration,
}

impl Config {
    fn from_env() -> anyhow::Result<Self> {
        let bot_token = std::env::var("BOT_TOKEN").context("BOT_TOKEN not set")?;
        let manager_chat_id = std::env::var("MANAGER_CHAT_ID")
            .context("MANAGER_CHAT_ID not set")?
            .parse()
            .context("MANAGER_CHAT_ID must be a numeric chat id")?;
        let webhook_url = std::env::var("WEBHOOK_URL").ok();
        let port = match std::env::var("PORT") {
            Ok(value) => value.parse().context("PORT must be a port number")?,
            Err(_) => 8000,
        };
        let photos_dir = std::env::var("PHOTOS_DIR").unwrap_or_else(|_| "Photos".to_string());
        let idle_minutes: u64 = match std::env::var("SESSION_IDLE_MINUTES") {
            Ok(value) => value
                .parse()
                .context("SESSION_IDLE_MINUTES must be a number of minutes")?,
            Err(_) => 120,
        };

        Ok(Self {
            bot_token,
            manager_chat_id,
            webhook_url,
            port,
            photos_dir,
            session_idle: Duration::from_secs(idle_minutes * 60),
        })
    }
}

/// Initialize structured JSON tracing based on environment variables
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "sweetshop_service=debug,order_flow=debug,tower_http=debug".into());

    match log_format.as_str() {
        "pretty" => {
            // Human-readable logging for development
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        _ => {
            // Structured JSON logging for production
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_level(true),
                )
                .init();
        }
    }
}

/// Middleware to add correlation ID to all requests
async fn correlation_id_middleware(
    mut request: Request<axum::body::Body>,
    next: Next,
) -> axum::response::Response {
    let correlation_id = Uuid::new_v4().to_string();

    request.headers_mut().insert(
        "x-correlation-id",
        HeaderValue::from_str(&correlation_id).unwrap(),
    );

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);

    next.run(request).instrument(span).await
}

#[tokio::main]
async fn main() {
    init_tracing();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("{err:#}");
            std::process::exit(1);
        }
    };

    let catalog = Catalog::standard(&config.photos_dir);
    if catalog.wrap_overview().is_none() || catalog.ribbon_overview().is_none() {
        warn!(photos_dir = %config.photos_dir, "overview photos missing, those screens degrade to text");
    }

    let client = Arc::new(TelegramClient::new(&config.bot_token));
    let store = Arc::new(InMemorySessionStore::new());
    let presenter = Arc::new(TelegramPresenter::new(client.clone()));
    let notifier = Arc::new(TelegramNotifier::new(client.clone(), config.manager_chat_id));
    let engine = FlowEngine::new(Arc::new(catalog));
    let runner = Arc::new(DialogueRunner::new(engine, store.clone(), notifier));

    // Telegram only needs the webhook registered once, but doing it on every
    // boot keeps the bot working after the public URL changes.
    if let Some(base_url) = &config.webhook_url {
        let webhook = format!("{}/webhook/{}", base_url.trim_end_matches('/'), config.bot_token);
        if let Err(err) = client.set_webhook(&webhook).await {
            error!(error = %err, "failed to register webhook");
            std::process::exit(1);
        }
        info!("webhook registered");
    } else {
        info!("WEBHOOK_URL not set, expecting an externally managed webhook");
    }

    let sweep_store = store.clone();
    let session_idle = config.session_idle;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        loop {
            ticker.tick().await;
            match sweep_store.remove_idle(session_idle).await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "expired idle sessions"),
                Err(err) => error!(error = %err, "session sweep failed"),
            }
        }
    });

    let app_state = AppState {
        runner,
        presenter,
        webhook_token: Arc::new(config.bot_token.clone()),
    };

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/webhook/{token}", post(receive_update))
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(correlation_id_middleware))
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .unwrap();

    info!(port = config.port, "webhook server running");

    axum::serve(listener, app).await.unwrap();
}

async fn health_check() -> &'static str {
    "OK"
}

/// Everything the dialogue needs out of one webhook update.
struct InboundEvent {
    profile: UserProfile,
    chat_id: String,
    callback_id: Option<String>,
    event: Event,
}

async fn receive_update(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(update): Json<Update>,
) -> StatusCode {
    // The webhook path doubles as a shared secret, exactly like the path the
    // webhook was registered with.
    if token != *state.webhook_token {
        warn!("webhook called with a foreign token");
        return StatusCode::NOT_FOUND;
    }

    let update_id = update.update_id;
    let Some(inbound) = map_update(update) else {
        debug!(update_id, "update carries nothing for the dialogue");
        return StatusCode::OK;
    };

    debug!(update_id, user_id = %inbound.profile.id, "processing update");

    if let Some(callback_id) = &inbound.callback_id {
        state.presenter.acknowledge(callback_id).await;
    }

    match state.runner.handle(&inbound.profile, inbound.event).await {
        Ok(Some(directive)) => {
            if let Err(err) = state.presenter.render(&inbound.chat_id, &directive).await {
                error!(user_id = %inbound.profile.id, error = %err, "failed to render reply");
            }
        }
        Ok(None) => {}
        Err(err) => {
            error!(user_id = %inbound.profile.id, error = %err, "failed to process update");
        }
    }

    // Telegram retries non-2xx responses and the dialogue never wants a
    // replayed event, so the webhook always acknowledges.
    StatusCode::OK
}

/// Translates a webhook update into a dialogue event. `None` means the update
/// carries nothing the dialogue reacts to: service messages, media without
/// text, unknown commands, or callback tokens from foreign keyboards.
fn map_update(update: Update) -> Option<InboundEvent> {
    if let Some(query) = update.callback_query {
        let chat_id = query.message.as_ref()?.chat.id;
        let selection = query.data.as_deref().and_then(Selection::parse)?;
        return Some(InboundEvent {
            profile: query.from.profile(),
            chat_id: chat_id.to_string(),
            callback_id: Some(query.id),
            event: Event::Select(selection),
        });
    }

    let message = update.message?;
    let from = message.from?;
    let text = message.text?;
    let event = classify_text(&text)?;
    Some(InboundEvent {
        profile: from.profile(),
        chat_id: message.chat.id.to_string(),
        callback_id: None,
        event,
    })
}

fn classify_text(text: &str) -> Option<Event> {
    let trimmed = text.trim();
    if is_command(trimmed, "/start") {
        return Some(Event::Start);
    }
    if is_command(trimmed, "/cancel") {
        return Some(Event::Cancel);
    }
    if trimmed.starts_with('/') {
        // Unknown commands never count as dialogue text.
        return None;
    }
    Some(Event::Text(text.to_string()))
}

fn is_command(text: &str, command: &str) -> bool {
    match text.strip_prefix(command) {
        Some(rest) => rest.is_empty() || rest.starts_with(' ') || rest.starts_with('@'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use order_flow::FamilyId;
    use serde_json::json;

    fn update(value: serde_json::Value) -> Update {
        serde_json::from_value(value).expect("valid update")
    }

    fn message_update(text: &str) -> Update {
        update(json!({
            "update_id": 1,
            "message": {
                "message_id": 10,
                "chat": { "id": 42 },
                "from": { "id": 42, "first_name": "Анна", "last_name": "Иванова" },
                "text": text
            }
        }))
    }

    #[test]
    fn start_command_maps_to_the_entry_event() {
        let inbound = map_update(message_update("/start")).expect("mapped");
        assert_eq!(inbound.event, Event::Start);
        assert_eq!(inbound.chat_id, "42");
        assert_eq!(inbound.profile.full_name, "Анна Иванова");
        assert!(inbound.callback_id.is_none());
    }

    #[test]
    fn commands_with_bot_suffix_still_match() {
        assert_eq!(classify_text("/start@SweetShopBot"), Some(Event::Start));
        assert_eq!(classify_text("/cancel something"), Some(Event::Cancel));
    }

    #[test]
    fn unknown_commands_are_dropped() {
        assert_eq!(classify_text("/help"), None);
        assert_eq!(classify_text("/startit"), None);
    }

    #[test]
    fn plain_text_maps_verbatim() {
        let inbound = map_update(message_update("нежные пастельные тона")).expect("mapped");
        assert_eq!(
            inbound.event,
            Event::Text("нежные пастельные тона".to_string())
        );
    }

    #[test]
    fn callback_maps_to_a_selection() {
        let inbound = map_update(update(json!({
            "update_id": 2,
            "callback_query": {
                "id": "cb-7",
                "from": { "id": 42, "first_name": "Анна" },
                "message": { "message_id": 20, "chat": { "id": 42 } },
                "data": "category_bouquets"
            }
        })))
        .expect("mapped");

        assert_eq!(
            inbound.event,
            Event::Select(Selection::Family(FamilyId::Bouquets))
        );
        assert_eq!(inbound.callback_id.as_deref(), Some("cb-7"));
        assert_eq!(inbound.chat_id, "42");
    }

    #[test]
    fn foreign_callback_data_is_dropped() {
        let mapped = map_update(update(json!({
            "update_id": 3,
            "callback_query": {
                "id": "cb-8",
                "from": { "id": 42, "first_name": "Анна" },
                "message": { "message_id": 21, "chat": { "id": 42 } },
                "data": "poll_option_2"
            }
        })));
        assert!(mapped.is_none());
    }

    #[test]
    fn callback_without_a_message_is_dropped() {
        let mapped = map_update(update(json!({
            "update_id": 4,
            "callback_query": {
                "id": "cb-9",
                "from": { "id": 42, "first_name": "Анна" },
                "data": "category_sets"
            }
        })));
        assert!(mapped.is_none());
    }

    #[test]
    fn media_without_text_is_dropped() {
        let mapped = map_update(update(json!({
            "update_id": 5,
            "message": {
                "message_id": 30,
                "chat": { "id": 42 },
                "from": { "id": 42, "first_name": "Анна" }
            }
        })));
        assert!(mapped.is_none());
    }
}
