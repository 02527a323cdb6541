use std::sync::Arc;

use anyhow::Context;
use ceres_chain::client::RpcGateway;
use ceres_chain::ChainGateway;
use ceres_host::config::Config;
use ceres_host::native::{NativePorProver, NativeSpaceProver};
use ceres_host::signer::KeypairSigner;
use ceres_host::sink::PanicSink;
use ceres_host::supervisor::Supervisor;
use ceres_host::workspace::Workspace;
use ceres_host::{logging, reward, Node, NodeParts};
use ceres_lib::pois::RsaKey;
use ceres_lib::signer::Signer;
use ceres_tee::{GrpcVerifier, TeeRegistry};
use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(name = "ceres", version, about = "Challenge-response daemon for a content-addressed storage network")]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the miner daemon
    Run,
    /// Query reward information
    Reward,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = cli.config;
    config.merge_from_file().context("loading config file")?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Reward => reward_command(&config).await,
        Command::Run => run_command(config).await,
    }
}

async fn reward_command(config: &Config) -> anyhow::Result<()> {
    let chain = RpcGateway::new(config.rpc_endpoints.clone())?;
    let signer = signer_from(config)?;
    let reward_info = chain.query_reward(&signer.public_key()).await?;
    println!("{}", reward::render_table(&reward_info));
    Ok(())
}

async fn run_command(config: Config) -> anyhow::Result<()> {
    let workspace = Workspace::new(&config.workspace);
    workspace.init().context("initializing workspace")?;
    let _log_guards = logging::init(&workspace.log_dir(), &config.log_level);

    let panic_sink = Arc::new(PanicSink::new(&workspace.log_dir()));
    let chain: Arc<dyn ChainGateway> = Arc::new(RpcGateway::new(config.rpc_endpoints.clone())?);
    let registry = Arc::new(TeeRegistry::new(config.tee_endpoints.clone()));
    let signer = Arc::new(signer_from(&config)?);
    let pois_key = load_pois_key(&workspace)?;

    let node = Node::new(
        config,
        NodeParts {
            chain,
            verifier: Arc::new(GrpcVerifier),
            registry,
            signer,
            space_prover: Box::new(NativeSpaceProver::default()),
            por_prover: Arc::new(NativePorProver),
            pois_key,
        },
    )?;

    info!("node started; workspace at {}", node.workspace.root().display());
    Supervisor::new(node, panic_sink).run().await;
    Ok(())
}

fn signer_from(config: &Config) -> anyhow::Result<KeypairSigner> {
    let seed = config
        .signing_seed
        .as_deref()
        .context("no signing seed configured")?;
    Ok(KeypairSigner::from_seed_hex(seed)?)
}

/// RSA key material recorded at registration time, if the miner has any.
fn load_pois_key(workspace: &Workspace) -> anyhow::Result<RsaKey> {
    let path = workspace.root().join("pois_key");
    match std::fs::read(&path) {
        Ok(buf) => Ok(serde_json::from_slice(&buf).context("decoding pois_key")?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(RsaKey::default()),
        Err(e) => Err(e.into()),
    }
}
