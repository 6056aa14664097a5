use axum::http::{HeaderValue, Method};
use axum::routing::{get, post, put};
use axum::{middleware, Extension, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

use crate::config::config;
use crate::database::Store;
use crate::error::ApiError;
use crate::handlers::{analytics, attendance, auth, events, schools, students, system, users};
use crate::middleware::require_bearer;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn Store>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }
}

pub fn router(state: AppState) -> Router {
    let mut app = Router::new()
        // Public
        .route("/", get(system::root))
        .route("/health", get(system::health))
        .route("/auth/login", post(auth::login))
        // Protected
        .merge(protected_routes().route_layer(middleware::from_fn(require_bearer)))
        .fallback(|| async { ApiError::not_found("Route not found") })
        .layer(Extension(state))
        .layer(cors_layer());

    if config().api.enable_request_logging {
        app = app.layer(TraceLayer::new_for_http());
    }
    app
}

fn protected_routes() -> Router {
    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/me", get(auth::me))
        .merge(school_routes())
        .merge(user_routes())
        .merge(student_routes())
        .merge(event_routes())
        .merge(attendance_routes())
        .route("/analytics", get(analytics::summary))
}

fn school_routes() -> Router {
    Router::new()
        .route("/schools", get(schools::list).post(schools::create))
        .route(
            "/schools/:id",
            get(schools::get).put(schools::update).delete(schools::delete),
        )
        .route("/schools/:id/assign", put(schools::assign))
        .route("/cities", get(schools::cities))
}

fn user_routes() -> Router {
    Router::new()
        .route("/users", get(users::list))
        .route("/users/:id", put(users::update).delete(users::delete))
        .route("/users/:id/add-child", put(users::add_child))
        .route("/users/:id/remove-child", put(users::remove_child))
        .route("/my-children", get(users::my_children))
        .route("/my-student", get(users::my_student))
}

fn student_routes() -> Router {
    Router::new()
        .route("/students", get(students::list).post(students::create))
        .route(
            "/students/:id",
            get(students::get).put(students::update).delete(students::delete),
        )
        .route("/students/qr/:code", get(students::by_qr))
}

fn event_routes() -> Router {
    Router::new()
        .route("/events", get(events::list).post(events::create))
        .route("/events/active", get(events::active))
        .route("/events/teacher/:id", get(events::by_teacher))
        .route(
            "/events/:id",
            get(events::get).put(events::update).delete(events::delete),
        )
        .route("/events/:id/toggle-active", put(events::toggle_active))
}

fn attendance_routes() -> Router {
    Router::new()
        .route("/attendance", get(attendance::list).post(attendance::record))
        .route("/attendance/check", get(attendance::check))
        .route("/attendance/student/:id", get(attendance::by_student))
        .route("/attendance/event/:name", get(attendance::by_event))
        .route("/attendance/event/:name/delete-all", axum::routing::delete(attendance::delete_all))
        .route("/attendance/:id", axum::routing::delete(attendance::delete))
}

fn cors_layer() -> CorsLayer {
    let origins: Vec<HeaderValue> = config()
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([axum::http::header::AUTHORIZATION, axum::http::header::CONTENT_TYPE])
}
