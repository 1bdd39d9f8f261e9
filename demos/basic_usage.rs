use cinegraph::services::catalog::CatalogSeed;
use cinegraph::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    println!("Cinegraph basic usage");

    let state = AppState::new(Config::default()).await?;
    let seed = CatalogSeed::from_file("demos/catalog.json")?;
    let summary = state.catalog_service.seed(seed).await?;
    println!(
        "Seeded {} users, {} movies, {} attributes",
        summary.users, summary.movies, summary.attributes
    );

    for (movie, feedback) in [("m1", "like"), ("m6", "like"), ("m3", "dislike")] {
        let result = state
            .preference_service
            .record_feedback("u1", movie, feedback)
            .await?;
        println!(
            "u1 {} {}: {} genres, {} directors, {} actors updated",
            feedback,
            result.movie.title,
            result.updated.genre.count,
            result.updated.director.count,
            result.updated.actor.count
        );
    }

    let response = state
        .recommendation_service
        .get_recommendations(&RecommendationRequest::new("u1", 5))
        .await?;
    println!("Recommendations for u1:");
    for (rank, item) in response.recommendations.iter().enumerate() {
        println!(
            "  {}. {} ({}) score={} genres={:?} via {:?}",
            rank + 1,
            item.title,
            item.year.map(|y| y.to_string()).unwrap_or_default(),
            item.score,
            item.genres,
            item.sources
        );
    }

    if let Some(top) = response.recommendations.first() {
        let explanation = state.explanation_service.explain("u1", &top.id).await?;
        println!("Why {}:", explanation.movie.title);
        for matched in &explanation.matched_directors {
            println!("  director {} ({:.2})", matched.name, matched.weight);
        }
        for matched in &explanation.matched_genres {
            println!("  genre {} ({:.2})", matched.name, matched.weight);
        }
    }

    let christmas = state.catalog_service.movies_by_season("christmas").await?;
    println!(
        "Christmas picks: {:?}",
        christmas.iter().map(|m| m.title.as_str()).collect::<Vec<_>>()
    );

    Ok(())
}
