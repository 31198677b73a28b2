//! Prompt builders for advisory text.
//!
//! Each returns a [`CompletionRequest`] for any [`TextCompletion`]
//! implementation; the answers are shown to the user and never fed back
//! into pricing.

use crate::ledger::Quality;
use crate::pricing::{DemandLevel, LocationBucket, PricingQuote};
use crate::services::gemini::{CompletionRequest, TextCompletion};

/// Plain-language explanation of how a quote was built.
pub fn explain_quote(quote: &PricingQuote, demand: DemandLevel, distance_km: f64) -> CompletionRequest {
    let bucket = match LocationBucket::from_distance(distance_km) {
        LocationBucket::Near => "near (1 km or less)",
        LocationBucket::Medium => "medium (1 to 5 km)",
        LocationBucket::Far => "far (over 5 km)",
    };
    let prompt = format!(
        "Explain to a user in 2-3 sentences why their P2P bandwidth price is ${:.3}/GB.

Breakdown:
- Base rate: ${:.3}/GB
- Demand: {} (x{:.2})
- Distance: {:.1} km, {} (x{:.2})",
        quote.current_rate,
        quote.base_rate,
        demand,
        quote.demand_multiplier,
        distance_km,
        bucket,
        quote.location_multiplier,
    );
    CompletionRequest::new(prompt).with_max_tokens(300)
}

/// Shown in place of a quote explanation the AI service could not produce.
pub const EXPLANATION_UNAVAILABLE: &str = "Explanation unavailable right now. Please try again later.";

/// Explain a quote, falling back to [`EXPLANATION_UNAVAILABLE`] when the
/// completion fails. Never an error: the quote stands on its own.
pub async fn explain_or_fallback(
    backend: &dyn TextCompletion,
    quote: &PricingQuote,
    demand: DemandLevel,
    distance_km: f64,
) -> String {
    let response = backend
        .generate(&explain_quote(quote, demand, distance_km))
        .await;
    if response.success {
        response.text.trim().to_string()
    } else {
        EXPLANATION_UNAVAILABLE.to_string()
    }
}

/// Suggest a price for the given conditions.
pub fn optimal_pricing(current_price: f64, demand: DemandLevel, distance_km: f64, time_of_day: &str) -> CompletionRequest {
    let prompt = format!(
        "As a pricing optimization AI, suggest the optimal price per GB for P2P internet sharing:

Current Conditions:
- Current Price: ${}/GB
- Demand Level: {}
- Distance: {} km
- Time: {}

Provide a recommended price and brief explanation (2-3 sentences).",
        current_price, demand, distance_km, time_of_day
    );
    CompletionRequest::new(prompt).with_max_tokens(300)
}

/// Raw link metrics to rate.
#[derive(Debug, Clone, Copy)]
pub struct LinkMetrics {
    pub latency_ms: f64,
    pub packet_loss_pct: f64,
    pub jitter_ms: f64,
}

pub fn connection_quality(metrics: LinkMetrics) -> CompletionRequest {
    let prompt = format!(
        "Analyze this network connection quality and provide improvement suggestions:

Metrics:
- Latency: {}ms
- Packet Loss: {}%
- Jitter: {}ms

Rate the quality (excellent/good/fair/poor) and suggest 2-3 improvements.",
        metrics.latency_ms, metrics.packet_loss_pct, metrics.jitter_ms
    );
    CompletionRequest::new(prompt).with_max_tokens(400)
}

/// Pull a quality rating out of advisory text, if the model gave one.
pub fn parse_quality(text: &str) -> Option<Quality> {
    let lower = text.to_ascii_lowercase();
    [
        ("excellent", Quality::Excellent),
        ("good", Quality::Good),
        ("fair", Quality::Fair),
        ("poor", Quality::Poor),
    ]
    .into_iter()
    .filter_map(|(word, quality)| lower.find(word).map(|pos| (pos, quality)))
    .min_by_key(|(pos, _)| *pos)
    .map(|(_, quality)| quality)
}

pub fn network_optimization(upload_mbps: f64, download_mbps: f64, connections: usize) -> CompletionRequest {
    let prompt = format!(
        "As a network optimization expert, analyze these P2P network statistics and provide 3 specific optimization suggestions:

Current Stats:
- Upload Speed: {} Mbps
- Download Speed: {} Mbps
- Active Connections: {}

Provide actionable recommendations to improve performance and earnings.",
        upload_mbps, download_mbps, connections
    );
    CompletionRequest::new(prompt).with_max_tokens(500)
}
