use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;

use rangekeeper::engine::fleet::FleetManager;
use rangekeeper::providers::{
    AlertSink, LogAlertSink, SystemProbe, VBoxHypervisor, WebhookAlertSink,
};
use rangekeeper::types::Tier;
use rangekeeper::Config;

#[derive(Parser)]
#[command(name = "rangekeeper")]
#[command(about = "Disposable target VM fleet control", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Run {
        #[arg(long, help = "Exercise round identifier")]
        round: String,
        #[arg(
            long = "tier",
            required = true,
            help = "Tier to provision (tier1|tier2|tier3), repeatable"
        )]
        tiers: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { round, tiers } => run_round(&round, &tiers).await?,
    }

    Ok(())
}

async fn run_round(round_id: &str, tiers: &[String]) -> Result<()> {
    let config = Config::from_env();

    let hypervisor = Arc::new(VBoxHypervisor::new(config.vboxmanage_path.clone()));
    let probe = Arc::new(SystemProbe);
    let alerts: Arc<dyn AlertSink> = match &config.alert_webhook_url {
        Some(url) => Arc::new(WebhookAlertSink::new(url.clone())),
        None => Arc::new(LogAlertSink),
    };

    let fleet = FleetManager::new(hypervisor, probe, alerts, config);

    for name in tiers {
        let Some(tier) = Tier::parse(name) else {
            anyhow::bail!("unknown tier '{name}'");
        };
        let vm = fleet.provision(tier, round_id).await?;
        println!("provisioned {} at {}", vm.id, vm.ip);
    }

    println!(
        "\nRound {round_id} live with {} target(s); press Ctrl-C to tear down",
        fleet.list_by_round(round_id).len()
    );
    tokio::signal::ctrl_c().await?;

    let removed = fleet.delete_round(round_id).await?;
    println!("tore down {removed} target(s) for round {round_id}");

    Ok(())
}
