use actix_web::{middleware, web, App, HttpResponse, HttpServer, Result};
use log::{error, info};
use serde::Deserialize;

use crate::config::SearchConfig;
use crate::export::solution_to_csv;
use crate::repository::Repository;
use crate::request::SearchStartRequest;
use crate::schedule::Searcher;

pub struct AppState {
    pub searcher: Searcher,
    pub repo: Repository,
}

#[derive(Deserialize)]
pub struct StatusQuery {
    #[serde(rename = "with-data", default)]
    with_data: Option<String>,
}

impl StatusQuery {
    fn with_data(&self) -> bool {
        matches!(self.with_data.as_deref(), Some("1") | Some("true"))
    }
}

fn bad_request(message: impl ToString) -> HttpResponse {
    HttpResponse::BadRequest().json(serde_json::json!({ "error": message.to_string() }))
}

fn not_found(message: impl ToString) -> HttpResponse {
    HttpResponse::NotFound().json(serde_json::json!({ "error": message.to_string() }))
}

// Resolves the request against the reference data and launches the search
async fn search_start(
    req: web::Json<SearchStartRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let input = match req.resolve(&state.repo) {
        Ok(input) => input,
        Err(e) => return Ok(bad_request(e)),
    };

    match state.searcher.start(&input).await {
        Ok(report) => Ok(HttpResponse::Ok().json(report)),
        Err(e) => {
            info!("search for '{}' rejected: {}", input.tour_name, e);
            Ok(bad_request(e))
        }
    }
}

async fn search_stop(state: web::Data<AppState>) -> Result<HttpResponse> {
    state.searcher.stop().await;
    Ok(HttpResponse::Ok().json(serde_json::json!({})))
}

async fn get_status(query: web::Query<StatusQuery>, state: web::Data<AppState>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(state.searcher.status(query.with_data())))
}

async fn get_solutions(state: web::Data<AppState>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(state.searcher.solutions()))
}

// CSV download of one solution
async fn export_solution(path: web::Path<String>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let hash = path.into_inner();
    let (Some(solution), Some(condition)) = (state.searcher.solution(&hash), state.searcher.condition()) else {
        return Ok(not_found(format!("no solution with hash {}", hash)));
    };

    match solution_to_csv(&condition, &solution) {
        Ok(body) => Ok(HttpResponse::Ok()
            .content_type("text/csv; charset=utf-8")
            .insert_header((
                "Content-Disposition",
                format!("attachment; filename=\"{}.csv\"", condition.tour_name),
            ))
            .body(body)),
        Err(e) => {
            error!("failed to export solution {}: {}", hash, e);
            Ok(HttpResponse::InternalServerError().json(serde_json::json!({ "error": e.to_string() })))
        }
    }
}

async fn get_reference(state: web::Data<AppState>) -> Result<HttpResponse> {
    match state.repo.reference() {
        Ok(reference) => Ok(HttpResponse::Ok().json(reference)),
        Err(e) => Ok(bad_request(e)),
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/search/start", web::post().to(search_start))
        .route("/api/search/stop", web::post().to(search_stop))
        .route("/api/status", web::get().to(get_status))
        .route("/api/solutions", web::get().to(get_solutions))
        .route("/api/solutions/{hash}/export", web::get().to(export_solution))
        .route("/api/reference", web::get().to(get_reference));
}

pub async fn start_server(port: u16, data_dir: String, config: SearchConfig) -> std::io::Result<()> {
    let app_state = web::Data::new(AppState {
        searcher: Searcher::new(config),
        repo: Repository::new(&data_dir),
    });
    info!("serving reference data from {}", data_dir);

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
