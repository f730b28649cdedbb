use crate::error::{Error, Result};
use crate::manager::ModelManager;
use crate::model::{InputType, ModelCategory, ModelMeta, Registry};
use axum::{
	extract::{Path, Query, State},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
	Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

#[derive(Clone)]
pub struct AppState {
	manager: Arc<ModelManager>,
	registry: Arc<Registry>,
	// Held for the duration of a run; only one inference is in flight at a time.
	run_gate: Arc<Mutex<()>>,
	device_name: String,
}

impl AppState {
	pub fn new(manager: ModelManager, registry: Registry, device_name: String) -> Self {
		Self {
			manager: Arc::new(manager),
			registry: Arc::new(registry),
			run_gate: Arc::new(Mutex::new(())),
			device_name,
		}
	}
}

#[derive(Serialize)]
pub struct HealthResponse {
	pub status: String,
	pub backend: Option<String>,
	pub device: String,
	pub loaded: Vec<ModelCategory>,
}

#[derive(Deserialize)]
pub struct ModelsQuery {
	#[serde(default)]
	pub input_type: Option<InputType>,
}

#[derive(Serialize)]
pub struct ModelEntry {
	pub name: String,
	pub input_type: InputType,
	pub category: ModelCategory,
	pub model_id: String,
	pub task: String,
	pub description: String,
}

impl From<&ModelMeta> for ModelEntry {
	fn from(meta: &ModelMeta) -> Self {
		Self {
			name: meta.human_name.clone(),
			input_type: meta.input_type(),
			category: meta.category,
			model_id: meta.model_id.clone(),
			task: meta.task.clone(),
			description: meta.description.clone(),
		}
	}
}

#[derive(Deserialize)]
pub struct RunRequest {
	pub model: String,
	pub input_type: InputType,
	pub data: String,
}

#[derive(Serialize)]
pub struct RunResponse {
	pub model: String,
	pub output: String,
}

impl IntoResponse for Error {
	fn into_response(self) -> Response {
		let (status, message) = match self {
			Error::ModelNotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
			Error::InvalidInput(_) => (StatusCode::BAD_REQUEST, self.to_string()),
			Error::Busy => (StatusCode::CONFLICT, self.to_string()),
			Error::Execution(_) | Error::ConfigError(_) => {
				(StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
			}
			_ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string()),
		};

		let body = Json(serde_json::json!({
			"error": message,
		}));

		(status, body).into_response()
	}
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
	Json(HealthResponse {
		status: "ok".to_string(),
		backend: state.manager.backend_name().map(str::to_string),
		device: state.device_name.clone(),
		loaded: state.manager.loaded_categories(),
	})
}

async fn list_models_handler(
	State(state): State<AppState>,
	Query(query): Query<ModelsQuery>,
) -> Json<Vec<ModelEntry>> {
	let models: Vec<ModelEntry> = match query.input_type {
		Some(input_type) => state.registry.models_for(input_type).into_iter().map(ModelEntry::from).collect(),
		None => state.registry.list_models().iter().map(ModelEntry::from).collect(),
	};
	Json(models)
}

async fn model_info_handler(
	State(state): State<AppState>,
	Path(name): Path<String>,
) -> Result<Json<ModelEntry>> {
	state
		.registry
		.find_by_human_name(&name)
		.map(|meta| Json(ModelEntry::from(meta)))
		.ok_or(Error::ModelNotFound(name))
}

async fn run_handler(
	State(state): State<AppState>,
	Json(payload): Json<RunRequest>,
) -> Result<Json<RunResponse>> {
	payload.input_type.validate(&payload.data)?;

	let meta = state
		.registry
		.find_by_human_name(&payload.model)
		.cloned()
		.ok_or_else(|| Error::ModelNotFound(payload.model.clone()))?;

	let gate = state.run_gate.clone().try_lock_owned().map_err(|_| Error::Busy)?;

	tracing::info!("Running '{}' on {} input", meta.human_name, payload.input_type);

	let manager = state.manager.clone();
	let input_type = payload.input_type;
	let data = payload.data;
	let worker_meta = meta.clone();
	// The worker owns the gate, so a dropped request cannot release it early.
	let output = tokio::task::spawn_blocking(move || {
		let _gate = gate;
		manager.run(&worker_meta, input_type, &data)
	})
	.await
	.map_err(|e| Error::Execution(format!("Worker failed: {}", e)))??;

	Ok(Json(RunResponse {
		model: meta.human_name,
		output,
	}))
}

pub fn create_router(state: AppState) -> Router {
	Router::new()
		.route("/api/health", get(health_handler))
		.route("/api/models", get(list_models_handler))
		.route("/api/models/{name}", get(model_info_handler))
		.route("/api/run", post(run_handler))
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(CorsLayer::permissive()),
		)
		.with_state(state)
}

pub async fn serve(host: &str, port: u16, state: AppState) -> Result<()> {
	let app = create_router(state);
	let addr = format!("{}:{}", host, port);

	tracing::info!("Starting server on {}", addr);

	let listener = tokio::net::TcpListener::bind(&addr)
		.await
		.map_err(|e| Error::ConfigError(format!("Failed to bind to {}: {}", addr, e)))?;

	axum::serve(listener, app)
		.await
		.map_err(|e| Error::ConfigError(format!("Server error: {}", e)))?;

	Ok(())
}
