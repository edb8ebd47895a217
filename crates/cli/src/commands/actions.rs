//! `deskpilot actions` — List the registered actions and their gates.

use deskpilot_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let catalog = deskpilot_tools::default_catalog(&config)?;

    println!("🧰 Registered Actions");
    println!("──────────────────────────────────────────────────────────────────────");
    println!(
        "{:<14} {:<12} {:<9} {:<14} {:<8} Description",
        "Name", "Category", "Risk", "Tier", "Confirm"
    );
    println!(
        "{:<14} {:<12} {:<9} {:<14} {:<8} ───────────",
        "────", "────────", "────", "────", "───────"
    );

    let mut disabled = 0;
    for descriptor in catalog.descriptors() {
        let enabled = catalog
            .lookup(&descriptor.name)
            .map(|entry| entry.enabled)
            .unwrap_or(false);
        if !enabled {
            disabled += 1;
        }

        let confirm = if descriptor.requires_confirmation {
            "yes"
        } else {
            ""
        };
        let mark = if enabled { "" } else { " (disabled)" };
        println!(
            "{:<14} {:<12} {:<9} {:<14} {:<8} {}{}",
            descriptor.name,
            descriptor.category.as_str(),
            descriptor.risk.as_str(),
            descriptor.tier.as_str(),
            confirm,
            descriptor.description,
            mark
        );
    }

    println!();
    println!(
        "  {} actions registered, {} disabled",
        catalog.len(),
        disabled
    );
    println!("  Session tier: {}", config.runtime.session_tier);

    Ok(())
}
