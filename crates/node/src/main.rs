use chronicle_node::{cli::Command, inspect, scheduler, Cli, NodeConfig};
use chronicle_storage::BlockStore;
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = NodeConfig::load(&cli.config)?;
    chronicle_telemetry::init_tracing();

    match cli.command {
        Command::Run => scheduler::run(config).await,
        Command::ShowTip => {
            let store = BlockStore::open(config.data_dir.join("blocks.redb"))?;
            inspect::show_tip(&store)
        }
        Command::VerifyProof { block_id } => {
            let store = BlockStore::open(config.data_dir.join("blocks.redb"))?;
            inspect::verify_proof(&store, block_id)
        }
    }
}
