use anyhow::{Context, Result};
use clap::Parser;
use tbtc_cli::{
    cli::{Commands, InvokeCmd, TbtcCli},
    commands,
    config::CliConfig,
    observability::init_observability,
};
use tbtc_contracts::Chain;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = TbtcCli::parse();

    if let Commands::Methods { contract } = &cli.command {
        for line in commands::methods(contract)? {
            println!("{line}");
        }
        return Ok(());
    }
    // Validate the invocation before connecting anywhere.
    let invoke = match &cli.command {
        Commands::Invoke(words) => Some(InvokeCmd::parse_words(words).unwrap_or_else(|err| err.exit())),
        _ => None,
    };

    let config = CliConfig::load(&cli.config)?;
    let _guard = init_observability(&config.observability)?;
    tracing::debug!(
        "observability initialized with level: {}",
        config.observability.level()
    );

    let contracts: Vec<String> = config.ethereum.contract_addresses.keys().cloned().collect();
    let metrics_addr = config.metrics.socket_addr()?;
    let chain = Chain::connect(config.ethereum)
        .await
        .context("failed to connect to the ethereum chain")?;

    match (cli.command, invoke) {
        (_, Some(invoke)) => {
            let output = commands::invoke(&chain, &invoke).await?;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        (Commands::Events(cmd), _) => {
            for event in commands::events(&chain, &cmd).await? {
                println!("{}", serde_json::to_string(&event)?);
            }
        }
        (Commands::Watch, _) => commands::watch(&chain, &contracts, metrics_addr).await?,
        (Commands::Methods { .. } | Commands::Invoke(_), None) => {}
    }

    Ok(())
}
