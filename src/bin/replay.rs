use anyhow::{Context, Result};
use cinegraph::{init_tracing, AppState, Config, FeedbackEvent, RecommendationRequest};
use clap::Parser;
use serde_json::json;
use tracing::{info, warn};

/// Replays a feedback log against a seeded catalog and prints the resulting recommendations.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    #[arg(short, long, default_value = "warn")]
    log_level: String,

    /// JSON catalog seed; overrides `store.catalog_path`.
    #[arg(long)]
    catalog: Option<String>,

    /// One `{"user_id", "movie_id", "type"}` object per line.
    #[arg(long)]
    events: Option<String>,

    #[arg(short, long)]
    user: String,

    #[arg(short = 'n', long)]
    limit: Option<usize>,

    #[arg(long)]
    season: Option<String>,

    /// Also explain this movie for the user.
    #[arg(long)]
    explain: Option<String>,

    /// Stop at the first rejected event instead of skipping it.
    #[arg(long)]
    strict: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    std::env::set_var("RUST_LOG", &args.log_level);
    init_tracing();

    let mut config = if std::path::Path::new(&args.config).exists() {
        Config::from_file(&args.config)?
    } else {
        info!("Config file not found, using default configuration");
        Config::default()
    };
    if let Some(catalog) = &args.catalog {
        config.store.catalog_path = Some(catalog.clone());
    }
    let default_limit = config.recommendation.default_limit;

    let state = AppState::new(config).await?;

    if let Some(path) = &args.events {
        let (applied, skipped) = replay(&state, path, args.strict).await?;
        info!(applied, skipped, "Replayed feedback log");
    }

    let mut request = RecommendationRequest::new(&args.user, args.limit.unwrap_or(default_limit));
    request.season = args.season.clone();
    let recommendations = state
        .recommendation_service
        .get_recommendations(&request)
        .await?;

    let explanation = match &args.explain {
        Some(movie_id) => Some(state.explanation_service.explain(&args.user, movie_id).await?),
        None => None,
    };

    let output = json!({
        "recommendations": recommendations,
        "explanation": explanation,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}

async fn replay(state: &AppState, path: &str, strict: bool) -> Result<(usize, usize)> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path))?;

    let mut applied = 0;
    let mut skipped = 0;
    for (line_no, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let event: FeedbackEvent = serde_json::from_str(line)
            .with_context(|| format!("{}:{}: malformed event", path, line_no + 1))?;

        match state.preference_service.record_event(&event).await {
            Ok(_) => applied += 1,
            Err(e) if !strict => {
                warn!("{}:{}: skipped event: {}", path, line_no + 1, e);
                skipped += 1;
            }
            Err(e) => return Err(e).with_context(|| format!("{}:{}", path, line_no + 1)),
        }
    }

    Ok((applied, skipped))
}

