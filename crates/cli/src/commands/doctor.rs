//! `deskpilot doctor` — Diagnose configuration and gateway health.

use deskpilot_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Deskpilot Doctor — System Diagnostics");
    println!("========================================\n");

    let mut issues = 0;

    // Check config
    let config_path = AppConfig::config_dir().join("config.toml");
    let config = if config_path.exists() {
        match AppConfig::load() {
            Ok(config) => {
                println!("  ✅ Config file valid");
                Some(config)
            }
            Err(e) => {
                println!("  ❌ Config file invalid: {e}");
                issues += 1;
                None
            }
        }
    } else {
        println!("  ✅ No config file — built-in defaults in effect");
        AppConfig::load().ok()
    };

    let Some(config) = config else {
        println!();
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
        return Ok(());
    };

    let base_url = config
        .provider
        .base_url
        .clone()
        .unwrap_or_else(|| deskpilot_providers::default_base_url(&config.provider.kind));
    println!();
    println!("  Provider:  {}", config.provider.kind);
    println!("  Model:     {}", config.provider.model);
    println!("  Base URL:  {base_url}");
    println!();

    // Check API key
    if config.provider.api_key.is_some() {
        println!("  ✅ API key configured");
    } else if config.provider.kind == "openai" {
        println!("  ⚠️  No API key — set DESKPILOT_API_KEY or add api_key to config.toml");
        issues += 1;
    } else {
        println!("  ✅ No API key needed for '{}'", config.provider.kind);
    }

    // Check gateway reachability
    match deskpilot_providers::compat_from_config(&config.provider) {
        Ok(gateway) => {
            use deskpilot_core::ModelGateway;

            match gateway.health_check().await {
                Ok(()) => {
                    println!("  ✅ Gateway reachable at {base_url}");

                    match gateway.list_models().await {
                        Ok(models) if models.is_empty() => {
                            println!("  ⚠️  Gateway lists no models");
                        }
                        Ok(models) => {
                            let shown = models.iter().take(5).cloned().collect::<Vec<_>>();
                            let more = models.len().saturating_sub(shown.len());
                            if more > 0 {
                                println!(
                                    "  ✅ Models served: {} (+{} more)",
                                    shown.join(", "),
                                    more
                                );
                            } else {
                                println!("  ✅ Models served: {}", shown.join(", "));
                            }

                            if !models.iter().any(|m| m == &config.provider.model) {
                                println!(
                                    "  ⚠️  Configured model '{}' is not in the served list",
                                    config.provider.model
                                );
                            }
                        }
                        Err(e) => {
                            println!("  ⚠️  Could not list models: {e}");
                        }
                    }
                }
                Err(e) => {
                    println!("  ❌ Gateway unreachable: {e}");
                    issues += 1;
                }
            }
        }
        Err(e) => {
            println!("  ❌ Gateway not configured: {e}");
            issues += 1;
        }
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
