use crate::{
    backend::ImageBackend,
    config::{Config, DEFAULT_PORT},
    error::{BackendError, FluxgenError, Result},
    models::{GenerationDefaults, ModelEntry, ModelRegistry, RawGenerationForm},
    pipeline::ImagePipeline,
};
use actix_web::{
    error::InternalError,
    http::{header, StatusCode},
    web, App, HttpResponse, HttpServer,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

pub struct AppState {
    pub pipeline: ImagePipeline,
    pub status: ConfigStatus,
}

/// What the landing page reports about the loaded configuration.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigStatus {
    pub translate_model: String,
    pub accounts: usize,
    pub models: usize,
}

#[derive(Debug, Serialize)]
struct LandingStatus {
    cf_ai_status: String,
    config_status: ConfigStatus,
}

#[derive(Debug, Serialize)]
struct ModelsResponse {
    models: Vec<ModelEntry>,
    defaults: GenerationDefaults,
}

impl AppState {
    pub fn new(config: &Config, backend: Arc<dyn ImageBackend>) -> Self {
        let registry = Arc::new(ModelRegistry::new(config.model_map.clone()));
        let status = ConfigStatus {
            translate_model: config.cloudflare.translate_model.clone(),
            accounts: config.cloudflare.accounts.len(),
            models: registry.len(),
        };
        let defaults = GenerationDefaults::new(config.default_model.clone(), config.num_steps);

        Self {
            pipeline: ImagePipeline::new(registry, defaults, backend),
            status,
        }
    }
}

/// Redirects to the form when the backend answers, otherwise reports why not.
async fn landing(state: web::Data<AppState>) -> HttpResponse {
    match state.pipeline.test_connection().await {
        Ok(()) => HttpResponse::SeeOther()
            .insert_header((header::LOCATION, "/generate-image"))
            .finish(),
        Err(err) => {
            log::error!("Workers AI connection check failed: {}", err);
            let cf_ai_status = match err {
                BackendError::Service { message, .. } => format!("connection failed: {}", message),
                BackendError::Unknown(_) => "connection failed: unknown error".to_string(),
            };
            HttpResponse::Ok().json(LandingStatus {
                cf_ai_status,
                config_status: state.status.clone(),
            })
        }
    }
}

async fn list_models(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(ModelsResponse {
        models: state.pipeline.registry().list(),
        defaults: state.pipeline.defaults().clone(),
    })
}

async fn generate_image(
    state: web::Data<AppState>,
    form: web::Form<RawGenerationForm>,
) -> HttpResponse {
    let request_id = Uuid::new_v4();
    let started = Instant::now();
    log::info!(
        "[req:{}] generation requested (model {:?})",
        request_id,
        form.model
    );

    let outcome = state.pipeline.handle(&form).await;
    let status = response_status(outcome.status_code(), outcome.is_success());

    log::info!(
        "[req:{}] finished with {} in {}ms",
        request_id,
        status.as_u16(),
        started.elapsed().as_millis()
    );
    HttpResponse::build(status).json(outcome.to_response())
}

/// Failures are always answered with an error status; a backend that reports
/// something outside 4xx/5xx is treated as a bad gateway.
fn response_status(code: u16, success: bool) -> StatusCode {
    if success {
        return StatusCode::OK;
    }
    match StatusCode::from_u16(code) {
        Ok(status) if status.is_client_error() || status.is_server_error() => status,
        _ => StatusCode::BAD_GATEWAY,
    }
}

/// Registers the routes. Expects `web::Data<AppState>` on the app.
pub fn configure(cfg: &mut web::ServiceConfig) {
    let form_config = web::FormConfig::default().error_handler(|err, _req| {
        let response = HttpResponse::BadRequest().json(json!({ "error": err.to_string() }));
        InternalError::from_response(err, response).into()
    });

    cfg.app_data(form_config)
        .route("/", web::get().to(landing))
        .service(
            web::resource("/generate-image")
                .route(web::get().to(list_models))
                .route(web::post().to(generate_image)),
        );
}

pub async fn run(config: Config, backend: Arc<dyn ImageBackend>) -> Result<()> {
    let port = config.port.unwrap_or(DEFAULT_PORT);
    let state = web::Data::new(AppState::new(&config, backend));

    HttpServer::new(move || App::new().app_data(state.clone()).configure(configure))
        .bind(("0.0.0.0", port))
        .map_err(|e| FluxgenError::ServerError(format!("Failed to bind port {}: {}", port, e)))?
        .run()
        .await
        .map_err(|e| FluxgenError::ServerError(e.to_string()))
}
