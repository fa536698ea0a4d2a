// Store status display: token counts and recent usage.

use anyhow::Result;
use colored::Colorize;
use std::sync::Arc;

use crate::config::Config;
use crate::db::Database;

/// Display store status to the terminal.
pub async fn show(db: &Arc<dyn Database>, config: &Config) -> Result<()> {
    let summary = db.summary().await?;

    println!(
        "Tokens: {} admin, {} regular",
        summary.admin_tokens, summary.regular_tokens
    );
    if summary.admin_tokens == 0 {
        println!(
            "  {}",
            "No admin token. One is minted on the next `imgmod serve`.".yellow()
        );
    }

    println!("Usage records: {}", summary.usage_records);
    let recent = db.recent_usage(5).await?;
    for usage in &recent {
        println!(
            "  {} {} by {}",
            usage.timestamp.format("%Y-%m-%d %H:%M:%S"),
            usage.endpoint,
            redact(&usage.token)
        );
    }

    if config.classifier_configured() {
        println!("Content Safety: {}", config.content_safety_endpoint);
    } else {
        println!("Content Safety: {}", "not configured".red());
    }

    Ok(())
}

/// Show only the first 8 characters of a token value.
pub fn redact(token: &str) -> String {
    let prefix: String = token.chars().take(8).collect();
    format!("{prefix}…")
}
