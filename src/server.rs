use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex as StdMutex, MutexGuard,
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tokio::sync::{broadcast, Mutex};
use tokio_stream::{wrappers::BroadcastStream, StreamExt};
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use crate::api::{
    error_body, error_status, ApiPersonaRequest, ApiPersonaResponse, ApiReportRequest,
    ApiReportResponse, RelayGenerateRequest,
};
use persona_report::llm::GeminiClient;
use persona_report::{
    AppConfig, GenerationStage, ReportError, ReportGenerator, ScoringPipeline, SubmissionSlot,
};

type Channels = Arc<Mutex<HashMap<String, broadcast::Sender<StreamEvent>>>>;
type Sessions = Arc<StdMutex<HashMap<String, Session>>>;

struct Session {
    slot: Arc<SubmissionSlot>,
    leases: usize,
}

#[derive(Clone)]
pub struct AppState {
    gemini: Option<GeminiClient>,
    generator: Option<Arc<ReportGenerator>>,
    pipeline: ScoringPipeline,
    channels: Channels,
    sessions: Sessions,
}

impl AppState {
    pub fn from_config(config: &AppConfig) -> Self {
        let gemini = match GeminiClient::from_config(&config.model) {
            Ok(client) => Some(client),
            Err(err) => {
                warn!(error = %err, "model client unavailable; /api/generate will refuse requests");
                None
            }
        };
        let generator = match ReportGenerator::from_config(config) {
            Ok(generator) => Some(Arc::new(generator)),
            Err(err) => {
                warn!(error = %err, "report generator unavailable; /api/report will refuse requests");
                None
            }
        };
        Self::new(gemini, generator, ScoringPipeline::from_config(config))
    }

    pub fn new(
        gemini: Option<GeminiClient>,
        generator: Option<Arc<ReportGenerator>>,
        pipeline: ScoringPipeline,
    ) -> Self {
        Self {
            gemini,
            generator,
            pipeline,
            channels: Arc::new(Mutex::new(HashMap::new())),
            sessions: Arc::new(StdMutex::new(HashMap::new())),
        }
    }
}

#[derive(Clone, Serialize)]
struct StreamEvent {
    event: String,
    message: String,
    timestamp_ms: u128,
}

#[derive(serde::Deserialize)]
struct StreamQuery {
    request_id: String,
}

static REQUEST_COUNTER: AtomicUsize = AtomicUsize::new(0);

pub async fn serve(args: crate::ServeArgs, config: AppConfig) -> Result<(), String> {
    let host = args.host.unwrap_or_else(|| config.server.host.clone());
    let port = args.port.unwrap_or(config.server.port);
    let web_root = args.web_root.unwrap_or_else(|| config.server.web_root.clone());

    let state = AppState::from_config(&config);
    let app = router(state, Some(&web_root));

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .map_err(|err| format!("invalid bind address: {}", err))?;
    info!(%addr, web_root = %web_root, "server listening");

    axum::serve(
        tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|err| format!("failed to bind server: {}", err))?,
        app,
    )
    .await
    .map_err(|err| format!("server error: {}", err))?;

    Ok(())
}

pub fn router(state: AppState, web_root: Option<&str>) -> Router {
    let api = Router::new()
        .route("/api/health", get(health))
        .route("/api/generate", post(relay_handler))
        .route("/api/persona", post(persona_handler))
        .route("/api/report", post(report_handler))
        .route("/api/report/stream", get(stream_handler))
        .with_state(state);

    let app = match web_root {
        Some(root) => {
            let index_path = format!("{}/index.html", root.trim_end_matches('/'));
            let static_service = ServeDir::new(root).not_found_service(ServeFile::new(index_path));
            api.fallback_service(static_service)
        }
        None => api,
    };

    app.layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health() -> impl IntoResponse {
    StatusCode::OK
}

async fn relay_handler(
    State(state): State<AppState>,
    request: Result<Json<RelayGenerateRequest>, JsonRejection>,
) -> Response {
    let Some(client) = state.gemini.as_ref() else {
        error!("API key is not configured on the server");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(error_body(
                "API key is not configured on the server. Deployment is missing the API_KEY environment variable.",
            )),
        )
            .into_response();
    };

    let Json(request) = match request {
        Ok(request) => request,
        Err(rejection) => return rejection_response(rejection),
    };
    let Some(payload) = request.into_payload() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(error_body("Missing required data in the request body.")),
        )
            .into_response();
    };

    let result = client
        .generate_content(&payload.system_instruction, &payload.user_content, &payload.schema)
        .await;

    match result {
        Ok(text) => match serde_json::from_str::<Value>(&text) {
            Ok(report) => Json(report).into_response(),
            Err(err) => {
                error!(error = %err, "model returned non-JSON output");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(error_body(
                        "The AI service returned a malformed response that was not valid JSON. This is an internal error.",
                    )),
                )
                    .into_response()
            }
        },
        Err(err @ ReportError::GenerationTimeout(_)) => (
            StatusCode::GATEWAY_TIMEOUT,
            Json(error_body(format!("{}. Please try again.", err))),
        )
            .into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(error_body(format!(
                "An error occurred while communicating with the AI service. Details: {}",
                err
            ))),
        )
            .into_response(),
    }
}

async fn persona_handler(
    State(state): State<AppState>,
    request: Result<Json<ApiPersonaRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match request {
        Ok(request) => request,
        Err(rejection) => return rejection_response(rejection),
    };
    match state.pipeline.score(&request.scores) {
        Ok(profile) => Json(ApiPersonaResponse::from_profile(profile)).into_response(),
        Err(err) => (error_status(&err), Json(error_body(err.to_string()))).into_response(),
    }
}

async fn report_handler(
    State(state): State<AppState>,
    request: Result<Json<ApiReportRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match request {
        Ok(request) => request,
        Err(rejection) => return rejection_response(rejection),
    };
    let Some(generator) = state.generator.clone() else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(error_body("Report generation is not configured on the server.")),
        )
            .into_response();
    };

    let form = match request.form() {
        Ok(form) => form,
        Err(err) => return (StatusCode::BAD_REQUEST, Json(error_body(err))).into_response(),
    };

    let request_id = request
        .request_id
        .clone()
        .unwrap_or_else(generate_request_id);
    let sender = get_or_create_channel(&state, &request_id).await;
    send_event(&sender, "start", "Scoring submission");

    let progress = sender.clone();
    let observe = move |stage: GenerationStage| {
        send_event(&progress, stage.label(), stage_message(stage));
    };
    let result = match request.session_id.as_deref() {
        Some(session_id) => {
            let lease = SessionLease::acquire(&state.sessions, session_id, &generator);
            lease.slot().submit_observed(form, observe).await
        }
        None => generator.generate_observed(form, observe).await,
    };

    let response = match result {
        Ok(generated) => {
            send_event(&sender, "done", "Report ready");
            Json(ApiReportResponse::from_generated(generated, request_id.clone())).into_response()
        }
        Err(err) => {
            send_event(&sender, "error", &err.to_string());
            (error_status(&err), Json(error_body(err.to_string()))).into_response()
        }
    };
    schedule_cleanup(state.channels.clone(), request_id);
    response
}

fn stage_message(stage: GenerationStage) -> &'static str {
    match stage {
        GenerationStage::Scored => "Persona resolved",
        GenerationStage::RequestBuilt => "Prompt assembled",
        GenerationStage::CallingModel => "Calling the model",
        GenerationStage::ResponseReceived => "Model responded",
        GenerationStage::Assembled => "Report assembled",
    }
}

async fn stream_handler(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, std::convert::Infallible>>>, StatusCode>
{
    let sender = get_or_create_channel(&state, &query.request_id).await;
    let receiver = sender.subscribe();
    let stream = BroadcastStream::new(receiver).filter_map(|event| match event {
        Ok(event) => {
            let data = serde_json::to_string(&event).unwrap_or_default();
            Some(Ok(Event::default().data(data)))
        }
        Err(_) => None,
    });

    send_event(&sender, "connected", "Streaming report progress");
    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(8))))
}

/// Keeps a session's slot registered while at least one request uses it.
/// Dropping the last lease, including on client disconnect, unregisters it.
struct SessionLease {
    sessions: Sessions,
    session_id: String,
    slot: Arc<SubmissionSlot>,
}

impl SessionLease {
    fn acquire(sessions: &Sessions, session_id: &str, generator: &Arc<ReportGenerator>) -> Self {
        let mut guard = lock(sessions);
        let session = guard
            .entry(session_id.to_string())
            .or_insert_with(|| Session {
                slot: Arc::new(SubmissionSlot::new(generator.clone())),
                leases: 0,
            });
        session.leases += 1;
        Self {
            sessions: sessions.clone(),
            session_id: session_id.to_string(),
            slot: session.slot.clone(),
        }
    }

    fn slot(&self) -> &SubmissionSlot {
        &self.slot
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        let mut guard = lock(&self.sessions);
        let Some(session) = guard.get_mut(&self.session_id) else {
            return;
        };
        if !Arc::ptr_eq(&session.slot, &self.slot) {
            return;
        }
        session.leases = session.leases.saturating_sub(1);
        if session.leases == 0 && session.slot.is_idle() {
            guard.remove(&self.session_id);
        }
    }
}

fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn rejection_response(rejection: JsonRejection) -> Response {
    (
        rejection.status(),
        Json(error_body(format!("Invalid request body: {}", rejection.body_text()))),
    )
        .into_response()
}

async fn get_or_create_channel(
    state: &AppState,
    request_id: &str,
) -> broadcast::Sender<StreamEvent> {
    let mut guard = state.channels.lock().await;
    if let Some(sender) = guard.get(request_id) {
        return sender.clone();
    }
    let (sender, _) = broadcast::channel(32);
    guard.insert(request_id.to_string(), sender.clone());
    sender
}

fn send_event(sender: &broadcast::Sender<StreamEvent>, event: &str, message: &str) {
    let _ = sender.send(StreamEvent {
        event: event.to_string(),
        message: message.to_string(),
        timestamp_ms: now_ms(),
    });
}

fn schedule_cleanup(channels: Channels, request_id: String) {
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(10)).await;
        let mut guard = channels.lock().await;
        guard.remove(&request_id);
    });
}

fn generate_request_id() -> String {
    let counter = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("req-{}-{}", now_ms(), counter)
}

fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis())
        .unwrap_or(0)
}
