use std::sync::{Mutex, MutexGuard};

use actix_web::{middleware, web, App, HttpRequest, HttpResponse, HttpServer, Result};
use serde::Deserialize;
use tracing::error;

use crate::config::{AppConfig, DrawOptions};
use crate::error::LotteryError;
use crate::history::{open_history_store, HistoryStore};
use crate::lottery::{LotteryOutcome, ThreadRandom};
use crate::requests::RequestQueue;
use crate::roster::{CsvRosterStore, NewParticipant, ParticipantChanges, RosterStore};
use crate::service::{persist_outcome, run_draw};

/// Shared state. Draws lock roster, requests and history in that order, so
/// only one draw runs at a time.
pub struct AppState {
    pub roster: Mutex<Box<dyn RosterStore + Send>>,
    pub requests: Mutex<RequestQueue>,
    pub history: Mutex<Box<dyn HistoryStore + Send>>,
    /// Drawn outcome whose writes failed; blocks new draws until saved
    pub unsaved: Mutex<Option<LotteryOutcome>>,
    pub admin_password: String,
}

impl AppState {
    pub fn new(
        roster: Box<dyn RosterStore + Send>,
        requests: RequestQueue,
        history: Box<dyn HistoryStore + Send>,
        admin_password: String,
    ) -> Self {
        Self {
            roster: Mutex::new(roster),
            requests: Mutex::new(requests),
            history: Mutex::new(history),
            unsaved: Mutex::new(None),
            admin_password,
        }
    }

    /// Opens the stores under the configured data directory
    pub fn from_config(config: &AppConfig) -> crate::Result<Self> {
        let roster = CsvRosterStore::open(config.roster_path())?;
        let requests = RequestQueue::open(config.requests_path())?;
        let history = open_history_store(config.history_location().as_deref());
        Ok(Self::new(
            Box::new(roster),
            requests,
            history,
            config.admin_password.clone(),
        ))
    }
}

#[derive(Deserialize)]
pub struct LoginRequest {
    password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencySubmission {
    participant_id: String,
    #[serde(default)]
    reason: String,
}

#[derive(Deserialize)]
pub struct ApprovalRequest {
    approved: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawRequest {
    #[serde(flatten)]
    options: DrawOptions,
    /// Active pool; every eligible participant when absent
    #[serde(default)]
    participant_ids: Option<Vec<String>>,
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| actix_web::error::ErrorInternalServerError("state lock poisoned"))
}

fn authorized(req: &HttpRequest, state: &AppState) -> bool {
    req.headers()
        .get("X-Admin-Password")
        .and_then(|v| v.to_str().ok())
        .map(|password| password == state.admin_password)
        .unwrap_or(false)
}

fn unauthorized() -> HttpResponse {
    HttpResponse::Unauthorized().json(serde_json::json!({"success": false, "error": "Unauthorized"}))
}

fn error_response(err: LotteryError) -> HttpResponse {
    let mut body = serde_json::json!({"success": false, "error": err.to_string()});
    if let Some(outcome) = err.unsaved_outcome() {
        body["outcome"] = serde_json::json!(outcome);
    }
    match err {
        LotteryError::ParticipantNotFound(_) => HttpResponse::NotFound().json(body),
        LotteryError::InvalidInput(_) => HttpResponse::BadRequest().json(body),
        _ => {
            error!(error = %err, "store operation failed");
            HttpResponse::InternalServerError().json(body)
        }
    }
}

// Admin login endpoint
async fn admin_login(req: web::Json<LoginRequest>, state: web::Data<AppState>) -> Result<HttpResponse> {
    if req.password == state.admin_password {
        Ok(HttpResponse::Ok().json(serde_json::json!({"success": true})))
    } else {
        Ok(HttpResponse::Unauthorized().json(serde_json::json!({"success": false, "error": "Invalid password"})))
    }
}

async fn list_participants(state: web::Data<AppState>) -> Result<HttpResponse> {
    let roster = lock(&state.roster)?;
    match roster.list() {
        Ok(participants) => Ok(HttpResponse::Ok().json(participants)),
        Err(e) => Ok(error_response(e)),
    }
}

async fn create_participant(
    req: HttpRequest,
    body: web::Json<NewParticipant>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    if !authorized(&req, &state) {
        return Ok(unauthorized());
    }
    let mut roster = lock(&state.roster)?;
    match roster.create(body.into_inner()) {
        Ok(participant) => Ok(HttpResponse::Created().json(participant)),
        Err(e) => Ok(error_response(e)),
    }
}

async fn update_participant(
    req: HttpRequest,
    id: web::Path<String>,
    body: web::Json<ParticipantChanges>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    if !authorized(&req, &state) {
        return Ok(unauthorized());
    }
    let mut roster = lock(&state.roster)?;
    match roster.update(&id, body.into_inner()) {
        Ok(participant) => Ok(HttpResponse::Ok().json(participant)),
        Err(e) => Ok(error_response(e)),
    }
}

async fn delete_participant(
    req: HttpRequest,
    id: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    if !authorized(&req, &state) {
        return Ok(unauthorized());
    }
    let mut roster = lock(&state.roster)?;
    match roster.delete(&id) {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(error_response(e)),
    }
}

async fn list_emergency(state: web::Data<AppState>) -> Result<HttpResponse> {
    let requests = lock(&state.requests)?;
    Ok(HttpResponse::Ok().json(requests.list()))
}

async fn submit_emergency(
    req: HttpRequest,
    body: web::Json<EmergencySubmission>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    if !authorized(&req, &state) {
        return Ok(unauthorized());
    }
    let roster = lock(&state.roster)?;
    let known = match roster.list() {
        Ok(participants) => participants.iter().any(|p| p.id == body.participant_id),
        Err(e) => return Ok(error_response(e)),
    };
    if !known {
        return Ok(error_response(LotteryError::ParticipantNotFound(body.participant_id.clone())));
    }

    let mut requests = lock(&state.requests)?;
    match requests.submit(&body.participant_id, &body.reason) {
        Ok(request) => Ok(HttpResponse::Created().json(request)),
        Err(e) => Ok(error_response(e)),
    }
}

async fn approve_emergency(
    req: HttpRequest,
    participant_id: web::Path<String>,
    body: web::Json<ApprovalRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    if !authorized(&req, &state) {
        return Ok(unauthorized());
    }
    let mut requests = lock(&state.requests)?;
    match requests.set_approved(&participant_id, body.approved) {
        Ok(request) => Ok(HttpResponse::Ok().json(request)),
        Err(e) => Ok(error_response(e)),
    }
}

async fn delete_emergency(
    req: HttpRequest,
    participant_id: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    if !authorized(&req, &state) {
        return Ok(unauthorized());
    }
    let mut requests = lock(&state.requests)?;
    match requests.remove(&participant_id) {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(error_response(e)),
    }
}

async fn run_lottery(
    req: HttpRequest,
    body: web::Json<DrawRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    if !authorized(&req, &state) {
        return Ok(unauthorized());
    }
    let body = body.into_inner();

    let mut roster = lock(&state.roster)?;
    let mut requests = lock(&state.requests)?;
    let mut history = lock(&state.history)?;
    let mut unsaved = lock(&state.unsaved)?;

    if let Some(pending) = unsaved.as_ref() {
        return Ok(HttpResponse::Conflict().json(serde_json::json!({
            "success": false,
            "error": format!("draw {} is not saved yet; retry saving it first", pending.history_entry.id),
        })));
    }

    let result = run_draw(
        roster.as_mut(),
        &mut requests,
        history.as_mut(),
        &mut ThreadRandom,
        &body.options,
        body.participant_ids.as_deref(),
    );
    match result {
        Ok(outcome) => Ok(HttpResponse::Ok().json(outcome)),
        Err(e) => {
            if let Some(outcome) = e.unsaved_outcome() {
                *unsaved = Some(outcome.clone());
            }
            Ok(error_response(e))
        }
    }
}

/// Writes the last unsaved draw again
async fn retry_save(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse> {
    if !authorized(&req, &state) {
        return Ok(unauthorized());
    }

    let mut roster = lock(&state.roster)?;
    let mut requests = lock(&state.requests)?;
    let mut history = lock(&state.history)?;
    let mut unsaved = lock(&state.unsaved)?;

    let Some(outcome) = unsaved.take() else {
        return Ok(HttpResponse::NotFound().json(serde_json::json!({"success": false, "error": "No unsaved draw"})));
    };
    match persist_outcome(&outcome, roster.as_mut(), &mut requests, history.as_mut()) {
        Ok(()) => Ok(HttpResponse::Ok().json(outcome)),
        Err(e) => {
            let response = error_response(LotteryError::persist(outcome.clone(), e));
            *unsaved = Some(outcome);
            Ok(response)
        }
    }
}

async fn get_history(state: web::Data<AppState>) -> Result<HttpResponse> {
    let history = lock(&state.history)?;
    match history.read() {
        Ok(entries) => Ok(HttpResponse::Ok().json(entries)),
        Err(e) => Ok(error_response(e)),
    }
}

/// Registers the API routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/login", web::post().to(admin_login))
        .route("/api/participants", web::get().to(list_participants))
        .route("/api/participants", web::post().to(create_participant))
        .service(
            web::resource("/api/participants/{id}")
                .route(web::patch().to(update_participant))
                .route(web::delete().to(delete_participant)),
        )
        .route("/api/emergency", web::get().to(list_emergency))
        .route("/api/emergency", web::post().to(submit_emergency))
        .route("/api/emergency/{participant_id}/approve", web::post().to(approve_emergency))
        .route("/api/emergency/{participant_id}", web::delete().to(delete_emergency))
        .route("/api/draw", web::post().to(run_lottery))
        .route("/api/draw/retry", web::post().to(retry_save))
        .route("/api/history", web::get().to(get_history));
}

pub async fn start_server(port: u16, state: AppState) -> std::io::Result<()> {
    let app_state = web::Data::new(state);

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(middleware::Logger::default())
            .configure(configure)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
