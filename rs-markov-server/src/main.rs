use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::PathBuf;
use std::sync::Mutex;

use actix_cors::Cors;
use actix_web::{delete, get, put, web, App, HttpResponse, HttpServer, Responder};
use clap::Parser;
use log::{error, info, warn};
use serde::Deserialize;

use rs_markov_core::{DEFAULT_ORDER, FolderStore, MarkovError, MarkovModel, SnapshotStore, Strategy};

/// HTTP front end serving named Markov chain models.
#[derive(Parser)]
#[command(version, about)]
struct Config {
	/// Folder holding model snapshots
	#[arg(long, env = "RS_MARKOV_DATA", default_value = "./data")]
	data: PathBuf,

	/// Address to listen on
	#[arg(long, env = "RS_MARKOV_BIND", default_value = "127.0.0.1:5000")]
	bind: String,
}

/// Query parameters for the `/v1/generate` endpoint
#[derive(Deserialize)]
struct GenerateParams {
	name: String,
	max_tokens: Option<usize>,
}

/// Query parameters for the `/v1/train` endpoint.
///
/// `order` and `strategy` only apply when the model does not exist yet.
#[derive(Deserialize)]
struct TrainParams {
	name: String,
	order: Option<usize>,
	strategy: Option<String>,
}

#[derive(Deserialize)]
struct ModelQuery {
	name: String,
}

/// Models loaded in memory plus the store backing them.
///
/// Lives behind a single `Mutex`: models are not synchronized, so every
/// request touching one holds the lock for its whole duration.
struct SharedData {
	store: FolderStore,
	models: HashMap<String, MarkovModel>,
}

impl SharedData {
	/// Returns the loaded model `name`, loading it from the store on first use.
	fn model(&mut self, name: &str) -> Result<Option<&mut MarkovModel>, MarkovError> {
		match self.models.entry(name.to_owned()) {
			Entry::Occupied(entry) => Ok(Some(entry.into_mut())),
			Entry::Vacant(entry) => match self.store.load_model(name)? {
				Some(model) => {
					info!("loaded model '{name}'");
					Ok(Some(entry.insert(model)))
				}
				None => Ok(None),
			},
		}
	}

	/// Like [`SharedData::model`], creating and storing an empty model when
	/// none exists.
	fn model_or_create(&mut self, name: &str, order: usize, strategy: Strategy) -> Result<&mut MarkovModel, MarkovError> {
		match self.models.entry(name.to_owned()) {
			Entry::Occupied(entry) => Ok(entry.into_mut()),
			Entry::Vacant(entry) => Ok(entry.insert(self.store.load_or_create(name, order, strategy)?)),
		}
	}

	/// Writes the loaded model `name` back to the store.
	fn persist(&self, name: &str) -> Result<(), MarkovError> {
		match self.models.get(name) {
			Some(model) => self.store.save_model(name, model),
			None => Ok(()),
		}
	}
}

/// Maps core errors to HTTP responses.
fn error_response(e: MarkovError) -> HttpResponse {
	match e {
		MarkovError::InvalidName(_) | MarkovError::UnknownStrategy(_) | MarkovError::NotText(_) => {
			HttpResponse::BadRequest().body(e.to_string())
		}
		_ => {
			error!("{e}");
			HttpResponse::InternalServerError().body(e.to_string())
		}
	}
}

/// Non-blank lines of a request body, trimmed.
fn body_lines(body: &str) -> impl Iterator<Item = &str> {
	body.lines().map(str::trim).filter(|line| !line.is_empty())
}

/// HTTP GET endpoint `/v1/generate`
///
/// Generates one sequence from the named model and returns it as the
/// response body.
#[get("/v1/generate")]
async fn get_generated(data: web::Data<Mutex<SharedData>>, query: web::Query<GenerateParams>) -> impl Responder {
	let max_tokens = query.max_tokens.unwrap_or(280);

	let mut shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};

	match shared_data.model(&query.name) {
		Ok(Some(model)) if model.is_trained() => HttpResponse::Ok().body(model.generate_text(max_tokens)),
		Ok(Some(_)) => HttpResponse::Conflict().body(format!("Model '{}' is not trained", query.name)),
		Ok(None) => HttpResponse::NotFound().body(format!("Model '{}' not found", query.name)),
		Err(e) => error_response(e),
	}
}

/// HTTP PUT endpoint `/v1/train`
///
/// Trains the named model on each non-blank line of the body, creating the
/// model first if needed, then stores it.
#[put("/v1/train")]
async fn put_train(data: web::Data<Mutex<SharedData>>, query: web::Query<TrainParams>, body: web::Bytes) -> impl Responder {
	let body = match std::str::from_utf8(&body) {
		Ok(s) => s,
		Err(e) => return error_response(e.into()),
	};
	let strategy = match query.strategy.as_deref().map(str::parse::<Strategy>).transpose() {
		Ok(s) => s.unwrap_or_default(),
		Err(e) => return error_response(e),
	};
	let order = query.order.unwrap_or(DEFAULT_ORDER);

	let mut shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};

	let model = match shared_data.model_or_create(&query.name, order, strategy) {
		Ok(m) => m,
		Err(e) => return error_response(e),
	};
	let mut lines = 0;
	for line in body_lines(body) {
		model.train(line);
		lines += 1;
	}

	match shared_data.persist(&query.name) {
		Ok(()) => HttpResponse::Ok().body(format!("Trained '{}' on {} lines", query.name, lines)),
		Err(e) => error_response(e),
	}
}

/// HTTP PUT endpoint `/v1/untrain`
///
/// Removes each non-blank line of the body from the named model, then stores
/// it. Observations that cannot be found are reported, not treated as errors.
#[put("/v1/untrain")]
async fn put_untrain(data: web::Data<Mutex<SharedData>>, query: web::Query<ModelQuery>, body: web::Bytes) -> impl Responder {
	let body = match std::str::from_utf8(&body) {
		Ok(s) => s,
		Err(e) => return error_response(e.into()),
	};

	let mut shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};

	let model = match shared_data.model(&query.name) {
		Ok(Some(m)) => m,
		Ok(None) => return HttpResponse::NotFound().body(format!("Model '{}' not found", query.name)),
		Err(e) => return error_response(e),
	};
	let (mut removed, mut missing) = (0, 0);
	for line in body_lines(body) {
		let outcome = model.untrain(line);
		removed += outcome.removed;
		missing += outcome.missing;
	}
	if missing > 0 {
		warn!("{} observations not found while untraining '{}'", missing, query.name);
	}

	match shared_data.persist(&query.name) {
		Ok(()) => HttpResponse::Ok().body(format!("Removed {removed} observations, {missing} not found")),
		Err(e) => error_response(e),
	}
}

/// HTTP GET endpoint `/v1/models`: names of every stored model.
#[get("/v1/models")]
async fn get_models(data: web::Data<Mutex<SharedData>>) -> impl Responder {
	let shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};
	match shared_data.store.names() {
		Ok(names) => HttpResponse::Ok().body(names.join("\n")),
		Err(e) => error_response(e),
	}
}

#[get("/v1/loaded_models")]
async fn get_loaded_models(data: web::Data<Mutex<SharedData>>) -> impl Responder {
	let shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};
	let mut names: Vec<&str> = shared_data.models.keys().map(String::as_str).collect();
	names.sort_unstable();
	HttpResponse::Ok().body(names.join("\n"))
}

#[delete("/v1/models/{name}")]
async fn delete_model(data: web::Data<Mutex<SharedData>>, name: web::Path<String>) -> impl Responder {
	let mut shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};
	shared_data.models.remove(name.as_str());
	match shared_data.store.remove(&name) {
		Ok(true) => HttpResponse::Ok().body(format!("Model '{}' deleted", name)),
		Ok(false) => HttpResponse::NotFound().body(format!("Model '{}' not found", name)),
		Err(e) => error_response(e),
	}
}

/// Main entry point for the server.
///
/// Opens the snapshot store, wraps the shared state in a `Mutex` and starts
/// an Actix-web HTTP server. Models are loaded lazily on first request.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
	let config = Config::parse();

	let store = FolderStore::new(&config.data).map_err(std::io::Error::other)?;
	info!("serving models from {} on {}", store.folder().display(), config.bind);

	let shared_data = SharedData { store, models: HashMap::new() };
	let shared_data = web::Data::new(Mutex::new(shared_data));

	HttpServer::new(move || {
		App::new()
			.wrap(Cors::permissive())
			.app_data(shared_data.clone())
			.service(get_generated)
			.service(put_train)
			.service(put_untrain)
			.service(get_models)
			.service(get_loaded_models)
			.service(delete_model)
	})
		.bind(config.bind)?
		.run()
		.await
}

#[cfg(test)]
mod tests {
	use super::*;
	use actix_web::{http::StatusCode, test};

	fn app_data(dir: &std::path::Path) -> web::Data<Mutex<SharedData>> {
		let store = FolderStore::new(dir).unwrap();
		web::Data::new(Mutex::new(SharedData { store, models: HashMap::new() }))
	}

	#[actix_web::test]
	async fn train_then_generate() {
		let dir = tempfile::tempdir().unwrap();
		let app = test::init_service(
			App::new()
				.app_data(app_data(dir.path()))
				.service(get_generated)
				.service(put_train)
				.service(get_models),
		)
		.await;

		let req = test::TestRequest::put()
			.uri("/v1/train?name=news&order=1&strategy=word")
			.set_payload("stocks rally today\n\nstocks fall today\n")
			.to_request();
		let resp = test::call_service(&app, req).await;
		assert_eq!(resp.status(), StatusCode::OK);

		let req = test::TestRequest::get().uri("/v1/generate?name=news").to_request();
		let body = test::call_and_read_body(&app, req).await;
		let text = std::str::from_utf8(&body).unwrap();
		assert!(text.split(' ').all(|w| ["stocks", "rally", "fall", "today"].contains(&w)), "{text}");

		let req = test::TestRequest::get().uri("/v1/models").to_request();
		let body = test::call_and_read_body(&app, req).await;
		assert_eq!(body, "news");
	}

	#[actix_web::test]
	async fn unknown_model_is_not_found() {
		let dir = tempfile::tempdir().unwrap();
		let app = test::init_service(
			App::new().app_data(app_data(dir.path())).service(get_generated).service(put_untrain),
		)
		.await;

		let req = test::TestRequest::get().uri("/v1/generate?name=absent").to_request();
		assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

		let req = test::TestRequest::put().uri("/v1/untrain?name=absent").set_payload("x").to_request();
		assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
	}

	#[actix_web::test]
	async fn bad_input_is_rejected() {
		let dir = tempfile::tempdir().unwrap();
		let app = test::init_service(App::new().app_data(app_data(dir.path())).service(put_train)).await;

		let req = test::TestRequest::put()
			.uri("/v1/train?name=news&strategy=bytes")
			.set_payload("text")
			.to_request();
		assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

		let req = test::TestRequest::put()
			.uri("/v1/train?name=news")
			.set_payload(vec![0xffu8, 0xfe])
			.to_request();
		assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
	}
}
