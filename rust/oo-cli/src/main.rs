use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use oo_client::Client;
use oo_credentials::KeyManager;
use oo_macaroon::Chain;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Command, Io, OoCli};

#[tokio::main]
pub async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = OoCli::parse();

    match &cli.command {
        Command::New { io, content_type } => {
            let client = Client::from_config(&cli.config(true)?);
            let plaintext = read_input(io.input.as_deref()).await?;
            let issued = client.issue(&plaintext, content_type.as_deref()).await?;
            write_chain(io.output.as_deref(), &issued.chain).await?;
        }

        Command::Fetch { io } => {
            let client = Client::from_config(&cli.config(true)?);
            let chain = read_chain(io.input.as_deref()).await?;
            let plaintext = client.resolve_and_fetch(&chain).await?;
            write_output(io.output.as_deref(), &plaintext).await?;
        }

        Command::Cond {
            io,
            location,
            key,
            condition,
        } => {
            let client = Client::from_config(&cli.config(false)?);
            let chain = read_chain(io.input.as_deref()).await?;
            let chain = client.attenuate(
                &chain,
                &condition.join(" "),
                location.as_deref(),
                key.as_ref(),
            )?;
            write_chain(io.output.as_deref(), &chain).await?;
        }

        Command::Delete { input } => {
            let client = Client::from_config(&cli.config(true)?);
            let chain = read_chain(input.as_deref()).await?;
            client.resolve_and_delete(&chain).await?;
        }

        Command::Init { overwrite } => {
            let key_pair = KeyManager::new(cli.home()?).create(*overwrite).await?;
            println!("{}", key_pair.public_key());
        }

        Command::Key => {
            let public_key = KeyManager::new(cli.home()?).public_key().await?;
            println!("{public_key}");
        }
    }

    Ok(())
}

async fn read_input(path: Option<&Path>) -> Result<Vec<u8>> {
    match path {
        Some(path) => tokio::fs::read(path)
            .await
            .with_context(|| format!("cannot open {path:?} for input")),
        None => {
            let mut buffer = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut buffer)
                .await
                .context("cannot read stdin")?;
            Ok(buffer)
        }
    }
}

async fn write_output(path: Option<&Path>, bytes: &[u8]) -> Result<()> {
    match path {
        Some(path) => tokio::fs::write(path, bytes)
            .await
            .with_context(|| format!("cannot create {path:?} for output")),
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(bytes).await?;
            stdout.flush().await?;
            Ok(())
        }
    }
}

async fn read_chain(path: Option<&Path>) -> Result<Chain> {
    let bytes = read_input(path).await?;
    Chain::parse(&bytes).context("input is not a capability")
}

async fn write_chain(path: Option<&Path>, chain: &Chain) -> Result<()> {
    let mut bytes = chain.to_bytes()?;
    bytes.push(b'\n');
    write_output(path, &bytes).await
}
