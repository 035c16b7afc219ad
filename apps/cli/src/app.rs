//! Subcommand execution and output formatting.

use std::sync::Arc;

use anyhow::Context;
use photochain_api::{CandidateFile, PhotoApiClient, SessionStore};
use photochain_protocol::{Block, ChainSnapshot, MineAck};
use photochain_upload::{
    ChainViewPresenter, FileValidator, Node, NodeRegistry, PipelineState, UploadOrchestrator,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::Command;
use crate::config::ClientConfig;

/// Runs one subcommand against the configured backend.
pub async fn run(command: Command, config: ClientConfig) -> anyhow::Result<()> {
    let session_path = config.session_file()?;
    let session = SessionStore::open(session_path.clone())
        .with_context(|| format!("failed to open session {}", session_path.display()))?;
    let client = Arc::new(PhotoApiClient::with_timeout(
        config.api_url.as_str(),
        Arc::new(session),
        config.request_timeout(),
    )?);

    match command {
        Command::Register { username, password } => {
            let resp = client.register(&username, &password).await?;
            println!("{}", non_empty(&resp.message, "account created"));
        }
        Command::Login { username, password } => {
            let session = client.login(&username, &password).await?;
            println!("logged in as {}", session.username);
        }
        Command::Logout => {
            client.logout()?;
            println!("logged out");
        }
        Command::Whoami => match client.session().username() {
            Some(user) => println!("{user}"),
            None => println!("not logged in"),
        },
        Command::Upload { file } => {
            let candidate = CandidateFile::from_path(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            upload(client, &config, candidate).await?;
        }
        Command::Chain { watch } => {
            let presenter = Arc::new(ChainViewPresenter::new());
            if watch {
                watch_chain(client, &config, presenter).await?;
            } else {
                let snapshot = presenter.refresh(&*client).await?;
                print!("{}", format_chain(&snapshot));
            }
        }
        Command::Mine => {
            let ack = client.mine_block().await?;
            println!("{}", format_mine(&ack));
        }
        Command::Nodes => {
            let registry = NodeRegistry::new(config.nodes.clone());
            for node in registry.nodes() {
                println!("{}", format_node(node));
            }
        }
        Command::Simulate { node_id, kind } => {
            let mut registry = NodeRegistry::new(config.nodes.clone());
            let ack = registry
                .simulate_failure(&*client, node_id, kind)
                .await?;
            println!("{}", non_empty(&ack.message, "failure simulated"));
            if let Some(node) = registry.get(node_id) {
                println!("{}", format_node(node));
            }
        }
        Command::Image { id, out } => {
            let bytes = client.get_image(id).await?;
            tokio::fs::write(&out, &bytes)
                .await
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("saved {} bytes to {}", bytes.len(), out.display());
        }
    }
    Ok(())
}

/// Runs the pipeline, printing every state transition.
async fn upload(
    client: Arc<PhotoApiClient>,
    config: &ClientConfig,
    file: CandidateFile,
) -> anyhow::Result<()> {
    let presenter = Arc::new(ChainViewPresenter::new());
    let orchestrator = UploadOrchestrator::new(client)
        .with_validator(FileValidator::with_max_size(config.max_upload_bytes))
        .with_presenter(Arc::clone(&presenter));

    let mut states = orchestrator.observer().subscribe();
    let printer = tokio::spawn(async move {
        let mut last = None;
        while let Some(state) = states.next().await {
            let line = format_state(&state);
            if last.as_ref() != Some(&line) {
                println!("{line}");
                last = Some(line);
            }
        }
    });

    let result = orchestrator.run(file).await;
    // Dropping the orchestrator closes the subscription.
    drop(orchestrator);
    printer.await?;

    let outcome = result?;
    info!(run_id = %outcome.run_id, "upload finished");
    if let Some(id) = outcome.receipt.image_id {
        println!("image id: {id}");
    }
    if let Some(block) = presenter.snapshot().as_ref().and_then(ChainSnapshot::latest) {
        println!("latest block: {}", format_block(block));
    }
    Ok(())
}

/// Refreshes the chain periodically until Ctrl-C.
async fn watch_chain(
    client: Arc<PhotoApiClient>,
    config: &ClientConfig,
    presenter: Arc<ChainViewPresenter>,
) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let mut updates = presenter.watch();
    let refresher =
        presenter.spawn_periodic(client, config.chain_refresh_interval(), cancel.clone());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                if let Some(snapshot) = snapshot {
                    print!("{}", format_chain(&snapshot));
                    println!();
                }
            }
        }
    }

    cancel.cancel();
    refresher.await?;
    Ok(())
}

fn non_empty<'a>(message: &'a str, fallback: &'a str) -> &'a str {
    if message.trim().is_empty() {
        fallback
    } else {
        message
    }
}

fn short_hash(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}

fn format_state(state: &PipelineState) -> String {
    let status = if let Some(error) = &state.error {
        format!("error: {error}")
    } else if let Some(success) = &state.success {
        success.clone()
    } else if state.is_uploading {
        "uploading".to_string()
    } else {
        "idle".to_string()
    };
    format!("[{:>3}%] {status}", state.progress)
}

fn format_block(block: &Block) -> String {
    let created = block
        .created_at()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".into());
    format!(
        "#{} {} prev {} at {} | {} tx ({} images) | {} confirmations",
        block.index,
        short_hash(&block.hash),
        short_hash(&block.previous_hash),
        created,
        block.transactions.len(),
        block.image_count(),
        block.confirmations,
    )
}

fn format_chain(snapshot: &ChainSnapshot) -> String {
    let mut out = format!(
        "chain length {} ({} images)\n",
        snapshot.length,
        snapshot.image_count()
    );
    for block in &snapshot.chain {
        out.push_str(&format_block(block));
        out.push('\n');
    }

    let corrupted = snapshot.corrupted();
    let broken = snapshot.broken_links();
    if corrupted.is_empty() && broken.is_empty() {
        out.push_str("integrity: ok\n");
    }
    for tx in corrupted {
        out.push_str(&format!(
            "integrity: CRC mismatch in block {} transaction {}\n",
            tx.block_index, tx.position
        ));
    }
    for index in broken {
        out.push_str(&format!(
            "integrity: block {index} does not link to its predecessor\n"
        ));
    }
    out
}

fn format_mine(ack: &MineAck) -> String {
    let mut out = non_empty(&ack.message, "block mined").to_string();
    if let Some(block) = &ack.block {
        out.push_str(&format!(
            "\nblock #{} {} ({} transactions)",
            block.index,
            short_hash(&block.hash),
            block.transaction_count
        ));
    }
    if let Some(status) = &ack.chain_status {
        out.push_str(&format!("\nchain status: {status}"));
    }
    out
}

fn format_node(node: &Node) -> String {
    let status = if node.active { "active" } else { "down" };
    let failure = node
        .last_failure
        .map(|k| format!(" (last failure: {k})"))
        .unwrap_or_default();
    format!(
        "{:>3}  {:<8} {:<24} {status}{failure}",
        node.id, node.name, node.base_url
    )
}
