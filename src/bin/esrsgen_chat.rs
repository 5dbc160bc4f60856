

use std::path::PathBuf;

use anyhow::Context;
use esrsgen::{AdvisorConfig, EsrsAdvisor};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::from_default_env()
                .add_directive("esrsgen=info".parse()?)
                .add_directive("reqwest=warn".parse()?),
        )
        .init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = AdvisorConfig::load(config_path.as_deref()).context("loading configuration")?;
    let advisor = EsrsAdvisor::from_config(config)
        .await
        .context("starting the ESRS advisor")?;

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut session = None;

    stdout
        .write_all(b"Describe your company to get started (/reset, /quit).\n> ")
        .await?;
    stdout.flush().await?;

    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        match input {
            "" => {}
            "/quit" => break,
            "/reset" => {
                if let Some(id) = session {
                    advisor.reset_session(id).await?;
                }
                stdout.write_all(b"Conversation reset. Describe your company.\n").await?;
            }
            _ => match advisor.handle_message(session, input).await {
                Ok(reply) => {
                    session = Some(reply.session_id);
                    if let Some(meta) = &reply.classification {
                        if let Some(title) = &meta.title {
                            stdout.write_all(format!("## {title}\n").as_bytes()).await?;
                        }
                        stdout
                            .write_all(
                                format!(
                                    "[{} | {} | corpus {} with {} passages]\n",
                                    meta.taxonomy_code,
                                    meta.reporting_group,
                                    meta.corpus,
                                    meta.corpus_passages
                                )
                                .as_bytes(),
                            )
                            .await?;
                    }
                    if let Some(context) = &reply.context {
                        tracing::debug!("Context:\n{}", context);
                    }
                    stdout.write_all(format!("{}\n", reply.reply).as_bytes()).await?;
                }
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    tracing::error!("Request failed: {}", e);
                    stdout.write_all(format!("Error: {e}\n").as_bytes()).await?;
                }
            },
        }
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
    }

    Ok(())
}
