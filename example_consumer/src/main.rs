//! Example consumer: pulls the review queue and dashboard metrics the way
//! the operator UI does.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Or from this directory: `cargo run`

use dropship_sdk::{Client, Direction, PgBackend, Query, RpcDefaults};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("dropship_sdk=debug")),
        )
        .init();

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/dropship".into());
    let backend = PgBackend::connect(&database_url).await?;
    let client = Client::with_defaults(backend, RpcDefaults::from_env());

    let state = client.get_system_state().await?;
    tracing::info!(state = %state, "system state");

    let review_queue = client
        .get_all(
            Query::new("tasks")
                .filter("status", "NEEDS_REVIEW")
                .order_by("created_at", Direction::Descending)
                .limit(5),
        )
        .await?;
    tracing::info!(count = review_queue.len(), "tasks awaiting review");
    for task in &review_queue {
        println!("{}", serde_json::to_string_pretty(task)?);
    }

    let top = client.get_top_products(None, None).await?;
    println!("top products: {}", serde_json::to_string_pretty(&top)?);

    Ok(())
}
