//! `tclass classify`: run one request through the engine and print it.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::engine::Engine;
use crate::models::{ClassifyResponse, SearchRequest};

pub async fn run_classify(
    config: &Config,
    text: &str,
    company: Option<String>,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let cap = config.retrieval.max_results_cap;
    let limit = limit.unwrap_or(config.retrieval.default_max_results);
    if limit == 0 || limit > cap {
        bail!("--limit must be between 1 and {}", cap);
    }

    let engine = Engine::open(config).await?;
    let mut request = SearchRequest::new(text).with_max_results(limit);
    if let Some(company) = company {
        request = request.with_company(company);
    }

    let response = engine.classify(&request).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_response(&response);
    }
    Ok(())
}

fn print_response(response: &ClassifyResponse) {
    println!(
        "strategy: {}  context: {}",
        response.strategy,
        if response.used_context { "yes" } else { "no" }
    );
    println!();

    if response.results.is_empty() {
        println!("No results.");
        return;
    }

    for (i, r) in response.results.iter().enumerate() {
        println!(
            "{}. [{:.1}] {} / {}",
            i + 1,
            r.confidence,
            r.code,
            r.description.replace('\n', " ").trim()
        );
        println!(
            "    chapter: {:02}  match: {}  terms: {}",
            r.chapter,
            r.match_type.as_str(),
            r.matched_terms
        );
        println!(
            "    rates: base {:.2}%  preferential {:.2}%  savings {:.2}%",
            r.base_rate, r.preferential_rate, r.savings
        );
        if r.trade_volume > 0 {
            println!("    trade volume: {}", r.trade_volume);
        }
        println!();
    }
}
