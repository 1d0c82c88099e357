//! Terminal companion for the shopping assistant API.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use shopping_assistant_api::models::{
    HistoryResponse, Recommendation, RecommendationRequest, RecommendationResponse,
};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "shop-ui", about = "Smart Shopping Assistant")]
struct Cli {
    /// Base URL of the recommendation API
    #[arg(long, env = "SHOP_API_URL", default_value = "http://127.0.0.1:5000")]
    api_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Get product recommendations for a query
    Recommend {
        /// What are you looking for? e.g. "I need a gaming laptop under $1500"
        query: Vec<String>,
        /// Number of recommendations
        #[arg(long)]
        top_n: Option<usize>,
    },
    /// Show previous searches, latest first
    History {
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(120))
        .build()
        .context("Failed to build HTTP client")?;
    let api_url = cli.api_url.trim_end_matches('/');

    match cli.command {
        Command::Recommend { query, top_n } => {
            recommend(&client, api_url, &query.join(" "), top_n).await
        }
        Command::History { limit } => history(&client, api_url, limit).await,
    }
}

async fn recommend(
    client: &reqwest::Client,
    api_url: &str,
    query: &str,
    top_n: Option<usize>,
) -> Result<()> {
    if query.trim().is_empty() {
        println!("{}", style("Please enter a query before searching.").yellow());
        return Ok(());
    }

    println!("{}", style("Fetching recommendations...").dim());
    let response = client
        .post(format!("{}/recommend", api_url))
        .json(&RecommendationRequest {
            query: Some(query.to_string()),
            top_n,
        })
        .send()
        .await
        .context("Connection error")?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        bail!("Error fetching recommendations ({}): {}", status, body);
    }

    let result: RecommendationResponse = response
        .json()
        .await
        .context("Failed to parse recommendations")?;

    if result.recommendations.is_empty() {
        println!(
            "{}",
            style("No recommendations found. Try a different query.").yellow()
        );
        return Ok(());
    }

    println!(
        "{} {}\n",
        style("Here are your recommendations for:").green(),
        style(&result.query).bold()
    );
    for item in &result.recommendations {
        print_recommendation(item);
    }
    Ok(())
}

async fn history(client: &reqwest::Client, api_url: &str, limit: Option<usize>) -> Result<()> {
    let mut request = client.get(format!("{}/history", api_url));
    if let Some(limit) = limit {
        request = request.query(&[("limit", limit)]);
    }

    let response = request
        .send()
        .await
        .context("Connection error")?
        .error_for_status()
        .context("Error fetching search history")?;
    let result: HistoryResponse = response
        .json()
        .await
        .context("Failed to parse search history")?;

    if result.history.is_empty() {
        println!("{}", style("No previous searches found.").yellow());
        return Ok(());
    }

    println!("{}\n", style("Search History").bold().underlined());
    for entry in &result.history {
        println!("{} {}", style("Query:").bold(), entry.query);
        for item in &entry.recommendations {
            println!(
                "  - {} - ${:.2} ({}/5)",
                style(&item.title).bold(),
                item.price,
                item.rating
            );
        }
        println!("---");
    }
    Ok(())
}

fn print_recommendation(item: &Recommendation) {
    println!("{} - ${:.2}", style(&item.title).bold(), item.price);
    if let Some(description) = &item.description {
        println!("{}", style(description).italic());
    }
    println!("Rating: {} ({} reviews)", item.rating, item.review_count);
    println!("---");
}
