// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tally status` command implementation.
//!
//! Loads the persisted ledger and prints session/today/week/month/all-time
//! totals with cost attribution. Costs come from the offline price
//! resolution chain (user override -> cached catalog); no network refresh
//! happens here.

use std::io::IsTerminal;
use std::sync::Arc;

use serde::Serialize;
use tally_clock::{resync_once, HttpReferenceClock, TimeSource};
use tally_config::model::TallyConfig;
use tracing::warn;
use tally_core::{ModelId, TallyError, UsageBucket};
use tally_price::PriceResolver;
use tally_store::{JsonSettingsStore, StatsSnapshot, UsageStore};

/// One reported window in `--json` mode.
#[derive(Debug, Serialize)]
struct WindowReport {
    input: u64,
    output: u64,
    reasoning: u64,
    total: u64,
    messages: u64,
    /// Present only for windows with a per-model breakdown.
    #[serde(skip_serializing_if = "Option::is_none")]
    cost_usd: Option<f64>,
}

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
struct StatusReport {
    session_started: String,
    session: WindowReport,
    today: WindowReport,
    this_hour: WindowReport,
    this_week: WindowReport,
    this_month: WindowReport,
    all_time: WindowReport,
}

/// Run the `tally status` command.
pub async fn run_status(config: &TallyConfig, json: bool) -> Result<(), TallyError> {
    let time = Arc::new(TimeSource::system());
    if let Some(url) = &config.clock.reference_url {
        // Best-effort correction so window keys agree with the reference.
        match HttpReferenceClock::new(url.clone()) {
            Ok(reference) => {
                if let Err(e) = resync_once(&time, &reference).await {
                    warn!(error = %e, "reference clock unreachable, using system time");
                }
            }
            Err(e) => warn!(error = %e, "reference clock unavailable"),
        }
    }

    let persist = Arc::new(JsonSettingsStore::new(config.store.settings_path.clone()));
    let store = Arc::new(UsageStore::load(time.clone(), persist).await?);
    let resolver = PriceResolver::new(store.clone(), time, config.catalog.clone())?;

    let snapshot = store.snapshot().await;

    // Cost is only computable where a per-model breakdown exists.
    let today_cost = breakdown_cost(&resolver, &snapshot.today.models).await;
    let hour_cost = breakdown_cost(&resolver, &snapshot.this_hour.models).await;
    let all_time_cost = breakdown_cost(&resolver, &snapshot.by_model).await;

    if json {
        let report = StatusReport {
            session_started: snapshot.session_started.to_rfc3339(),
            session: window(&snapshot.session, None),
            today: window(&snapshot.today, Some(today_cost)),
            this_hour: window(&snapshot.this_hour, Some(hour_cost)),
            this_week: window(&snapshot.this_week, None),
            this_month: window(&snapshot.this_month, None),
            all_time: window(&snapshot.all_time, Some(all_time_cost)),
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&report)
                .unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        let use_color = std::io::stdout().is_terminal();
        print_text_status(&snapshot, today_cost, all_time_cost, use_color);
    }

    Ok(())
}

/// Sum the cost of a per-model bucket map.
async fn breakdown_cost(
    resolver: &PriceResolver,
    by_model: &std::collections::BTreeMap<String, UsageBucket>,
) -> f64 {
    let mut total = 0.0;
    for (model, bucket) in by_model {
        // Reasoning tokens are billed at the output rate.
        total += resolver
            .calculate_cost(
                bucket.input,
                bucket.output + bucket.reasoning,
                &ModelId::from(model.as_str()),
            )
            .await;
    }
    total
}

fn window(bucket: &UsageBucket, cost_usd: Option<f64>) -> WindowReport {
    WindowReport {
        input: bucket.input,
        output: bucket.output,
        reasoning: bucket.reasoning,
        total: bucket.total,
        messages: bucket.message_count,
        cost_usd,
    }
}

fn print_text_status(
    snapshot: &StatsSnapshot,
    today_cost: f64,
    all_time_cost: f64,
    use_color: bool,
) {
    println!();
    println!("  tally status");
    println!("  {}", "-".repeat(48));
    print_window("Session", &snapshot.session, None, use_color);
    print_window("Today", &snapshot.today, Some(today_cost), use_color);
    print_window("This week", &snapshot.this_week, None, use_color);
    print_window("This month", &snapshot.this_month, None, use_color);
    print_window("All time", &snapshot.all_time, Some(all_time_cost), use_color);
    println!();
    println!(
        "    Session started {}",
        snapshot.session_started.format("%Y-%m-%d %H:%M UTC")
    );
    println!();
}

fn print_window(label: &str, bucket: &UsageBucket, cost: Option<f64>, use_color: bool) {
    let tokens = format!(
        "{} in / {} out{}",
        format_tokens(bucket.input),
        format_tokens(bucket.output),
        if bucket.reasoning > 0 {
            format!(" / {} reasoning", format_tokens(bucket.reasoning))
        } else {
            String::new()
        }
    );
    let cost_text = cost
        .map(|c| format!("  ${c:.4}"))
        .unwrap_or_default();

    if use_color {
        use colored::Colorize;
        println!(
            "    {:<11} {} ({} msgs){}",
            label.bold(),
            tokens,
            bucket.message_count,
            cost_text.green()
        );
    } else {
        println!(
            "    {:<11} {} ({} msgs){}",
            label, tokens, bucket.message_count, cost_text
        );
    }
}

/// Format a token count with thousands separators.
fn format_tokens(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::new();
    for (i, c) in digits.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out.chars().rev().collect()
}
