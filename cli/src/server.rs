use std::sync::{Arc, Mutex};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Query, Request, State},
    http::{HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use recipedex_core::RecipeError;
use recipedex_core::db::Database;
use recipedex_core::filter::SearchParams;
use recipedex_core::models::{DEFAULT_LIMIT, DEFAULT_PAGE, Pagination, Recipe, RecipePage};
use recipedex_core::query::compile;

#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Database>>,
}

// --- Request / Response types ---

/// Raw query string pairs. Taken as a list so repeated names never fail
/// extraction; the first occurrence of each name is used.
type QueryPairs = Query<Vec<(String, String)>>;

fn first<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

/// Raw listing parameters; parsed by hand so bad values get a JSON 400.
struct ListQuery {
    page: Option<String>,
    limit: Option<String>,
}

impl ListQuery {
    fn from_pairs(pairs: &[(String, String)]) -> Self {
        ListQuery {
            page: first(pairs, "page").map(str::to_string),
            limit: first(pairs, "limit").map(str::to_string),
        }
    }

    fn pagination(&self) -> Result<Pagination, ApiError> {
        let page = parse_positive("page", self.page.as_deref(), DEFAULT_PAGE)?;
        let limit = parse_positive("limit", self.limit.as_deref(), DEFAULT_LIMIT)?;
        Pagination::new(page, limit).map_err(|e| ApiError::BadRequest(format!("{e}")))
    }
}

/// A whole number; digit strings too large for `u64` saturate to `u64::MAX`.
fn parse_positive(name: &str, raw: Option<&str>, default: u64) -> Result<u64, ApiError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(default),
        Some(s) => s.parse::<u64>().or_else(|_| {
            if s.bytes().all(|b| b.is_ascii_digit()) {
                Ok(u64::MAX)
            } else {
                Err(ApiError::BadRequest(format!(
                    "Invalid {name} '{s}'. Use a whole number >= 1"
                )))
            }
        }),
    }
}

#[derive(Serialize)]
struct SearchResponse {
    data: Vec<Recipe>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    BadRequest(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Internal(err) => {
                tracing::error!(error = ?err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

// --- Middleware ---

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Handlers ---

async fn index() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "Recipe API Server",
        "endpoints": {
            "recipes": "/api/recipes",
            "search": "/api/recipes/search",
        },
    }))
}

async fn list_recipes(
    State(state): State<AppState>,
    Query(pairs): QueryPairs,
) -> Result<Json<RecipePage>, ApiError> {
    let pagination = ListQuery::from_pairs(&pairs).pagination()?;

    let page = {
        let db = state
            .db
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        db.list_recipes(pagination).context("database error")?
    };

    Ok(Json(page))
}

/// Returns every match; unlike the listing, search is not paginated.
async fn search_recipes(
    State(state): State<AppState>,
    Query(pairs): QueryPairs,
) -> Result<Json<SearchResponse>, ApiError> {
    let params = SearchParams::from_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    let filter = compile(&params.predicates());

    let data = {
        let db = state
            .db
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        db.search_recipes(&filter).context("database error")?
    };

    Ok(Json(SearchResponse { data }))
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/recipes", get(list_recipes))
        .route("/api/recipes/search", get(search_recipes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(db: Database, port: u16, bind: &str) -> anyhow::Result<()> {
    let count = db.count_recipes()?;
    if count == 0 {
        return Err(RecipeError::EmptyStore.into());
    }

    let state = AppState {
        db: Arc::new(Mutex::new(db)),
    };
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}"))
        .await
        .with_context(|| format!("failed to bind {bind}:{port}"))?;
    tracing::info!(recipes = count, "Listening on http://{bind}:{port}");
    axum::serve(listener, app).await?;

    Ok(())
}
