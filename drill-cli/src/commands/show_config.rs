//! Print the effective configuration.

use drill_runner::Config;
use drill_types::RunMode;

/// Run the show-config command.
pub fn run(config: &Config) {
    let campaign = &config.campaign;
    let budget = campaign.budget();

    println!("=== stormdrill config ===");
    println!();
    println!("Campaign:");
    println!(
        "  Chaos level: {} (every {} min)",
        campaign.chaos_level.value(),
        campaign.chaos_level.frequency_minutes()
    );
    match budget.mode() {
        RunMode::OneShot => println!("  Run mode:    single fault cycle"),
        RunMode::Periodic { total_run, .. } => {
            println!("  Run mode:    periodic for {} min", total_run.as_secs() / 60)
        }
    }
    println!("  Fault:       {}", campaign.fault);
    println!("  Apps:        {}", campaign.apps.join(", "));
    println!("  Instances:   {}", campaign.scale_factor);
    println!();

    let retry = &config.retry;
    println!("Resize retry:");
    println!("  Budget:      {} min", retry.scale_timeout_mins);
    println!("  Interval:    {} min", retry.scale_interval_mins);
    println!("  Per call:    {} min", retry.scale_call_timeout_mins);
    println!();

    let recovery = &config.recovery;
    println!("Recovery:");
    println!("  Settle:           {}s", recovery.settle_secs);
    println!("  Node delete:      {}s", recovery.node_delete_timeout_secs);
    println!("  Storage recovery: {}s", recovery.storage_recovery_timeout_secs);
    println!("  Reboot ready:     {}s", recovery.reboot_ready_timeout_secs);
    println!(
        "  Leak cleanup:     {}",
        if recovery.wait_for_resource_leak_cleanup {
            "wait"
        } else {
            "skip"
        }
    );
    println!();

    println!("Docker:");
    println!("  Compose file: {}", config.docker.compose_file.display());
    println!("  Project:      {}", config.docker.project_name);
    println!("  Zone prefix:  {}", config.docker.zone_prefix);
    println!();

    println!("Mock:");
    println!(
        "  {} zones x {} nodes",
        config.mock.zones, config.mock.nodes_per_zone
    );
}
