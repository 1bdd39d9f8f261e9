use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use cinegraph::services::catalog::SearchCriteria;
use cinegraph::{
    init_tracing, AppState, AttributeCategory, Config, Explanation, FeedbackEvent,
    FeedbackResult, MovieDetails, RecError, RecommendationRequest, RecommendationResponse,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[derive(Debug, Deserialize)]
struct RecommendationQuery {
    limit: Option<usize>,
    season: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    limit: Option<usize>,
}

const ALL_MOVIES_LIMIT: usize = 150;

#[derive(Debug, Deserialize)]
struct SearchQuery {
    q: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    message: String,
}

impl<T> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: "Success".to_string(),
        }
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, RecError>;

async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<HashMap<String, String>>> {
    let stats = state.store.inner().stats();

    let mut status = HashMap::new();
    status.insert("status".to_string(), "healthy".to_string());
    status.insert("service".to_string(), "cinegraph".to_string());
    status.insert("version".to_string(), env!("CARGO_PKG_VERSION").to_string());
    status.insert("nodes".to_string(), stats.nodes.to_string());
    status.insert("edges".to_string(), stats.edges.to_string());

    Json(ApiResponse::success(status))
}

async fn record_interaction(
    State(state): State<AppState>,
    Json(event): Json<FeedbackEvent>,
) -> ApiResult<FeedbackResult> {
    let result = state.preference_service.record_event(&event).await?;
    Ok(Json(ApiResponse::success(result)))
}

async fn get_recommendations(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(params): Query<RecommendationQuery>,
) -> ApiResult<RecommendationResponse> {
    let request = RecommendationRequest {
        user_id,
        limit: params
            .limit
            .unwrap_or(state.config.recommendation.default_limit),
        season: params.season,
    };

    let response = state
        .recommendation_service
        .get_recommendations(&request)
        .await?;
    Ok(Json(ApiResponse::success(response)))
}

async fn explain_recommendation(
    State(state): State<AppState>,
    Path((user_id, movie_id)): Path<(String, String)>,
) -> ApiResult<Explanation> {
    let explanation = state.explanation_service.explain(&user_id, &movie_id).await?;
    Ok(Json(ApiResponse::success(explanation)))
}

async fn top_movies(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> ApiResult<Vec<MovieDetails>> {
    let limit = list_limit(&state, params.limit)?;
    let movies = state.catalog_service.top_movies(limit).await?;
    Ok(Json(ApiResponse::success(movies)))
}

async fn latest_movies(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> ApiResult<Vec<MovieDetails>> {
    let limit = list_limit(&state, params.limit)?;
    let movies = state.catalog_service.latest_movies(limit).await?;
    Ok(Json(ApiResponse::success(movies)))
}

async fn search_movies(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> ApiResult<Vec<MovieDetails>> {
    let movies = state.catalog_service.search_movies(&params.q).await?;
    Ok(Json(ApiResponse::success(movies)))
}

async fn all_movies(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> ApiResult<Vec<MovieDetails>> {
    let limit = cinegraph::utils::validation::validate_limit(
        params.limit.unwrap_or(ALL_MOVIES_LIMIT),
        ALL_MOVIES_LIMIT,
    )?;
    let movies = state.catalog_service.all_movies(limit).await?;
    Ok(Json(ApiResponse::success(movies)))
}

async fn advanced_search(
    State(state): State<AppState>,
    Query(criteria): Query<SearchCriteria>,
) -> ApiResult<Vec<MovieDetails>> {
    let movies = state.catalog_service.advanced_search(&criteria).await?;
    Ok(Json(ApiResponse::success(movies)))
}

async fn list_attributes(state: AppState, category: AttributeCategory) -> ApiResult<Vec<String>> {
    let names = state.catalog_service.list_attributes(category).await?;
    Ok(Json(ApiResponse::success(names)))
}

async fn movies_by_season(
    State(state): State<AppState>,
    Path(season): Path<String>,
) -> ApiResult<Vec<MovieDetails>> {
    let movies = state.catalog_service.movies_by_season(&season).await?;
    Ok(Json(ApiResponse::success(movies)))
}

async fn get_movie(State(state): State<AppState>, Path(movie_id): Path<String>) -> ApiResult<MovieDetails> {
    let movie = state.catalog_service.get_movie(&movie_id).await?;
    Ok(Json(ApiResponse::success(movie)))
}

fn list_limit(state: &AppState, limit: Option<usize>) -> Result<usize, RecError> {
    let settings = &state.config.recommendation;
    cinegraph::utils::validation::validate_limit(
        limit.unwrap_or(settings.default_limit),
        settings.max_limit,
    )
}

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/interact", post(record_interaction))
        .route("/recommendations/:user_id", get(get_recommendations))
        .route(
            "/recommendations/:user_id/explain/:movie_id",
            get(explain_recommendation),
        )
        .route("/movies", get(all_movies))
        .route("/movies/top", get(top_movies))
        .route("/movies/latest", get(latest_movies))
        .route("/movies/search", get(search_movies))
        .route("/movies/search/advanced", get(advanced_search))
        .route("/movies/season/:name", get(movies_by_season))
        .route("/movies/:movie_id", get(get_movie))
        .route(
            "/genres",
            get(|State(state): State<AppState>| list_attributes(state, AttributeCategory::Genre)),
        )
        .route(
            "/actors",
            get(|State(state): State<AppState>| list_attributes(state, AttributeCategory::Actor)),
        )
        .route(
            "/directors",
            get(|State(state): State<AppState>| list_attributes(state, AttributeCategory::Director)),
        )
        .route(
            "/seasons",
            get(|State(state): State<AppState>| list_attributes(state, AttributeCategory::Season)),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    std::env::set_var("RUST_LOG", &args.log_level);
    init_tracing();

    let config = if std::path::Path::new(&args.config).exists() {
        Config::from_file(&args.config)?
    } else {
        info!("Config file not found, using default configuration");
        Config::default()
    };

    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.server.workers.max(1))
        .enable_all()
        .build()?
        .block_on(serve(config))
}

async fn serve(config: Config) -> anyhow::Result<()> {
    info!("Starting Cinegraph server with config: {:?}", config.server);
    let addr = config.server.socket_addr()?;

    let state = AppState::new(config).await?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
