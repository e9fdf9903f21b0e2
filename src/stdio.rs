use crate::builder::{CommandBuilder, InboundEvent};
use crate::message::Message;
use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

/// Serves one JSON event per input line and writes one JSON message per output line.
pub async fn serve(builder: &CommandBuilder) -> Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    serve_lines(builder, stdin, stdout).await
}

pub async fn serve_lines<R, W>(builder: &CommandBuilder, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await.context("failed to read event")? {
        if line.trim().is_empty() {
            continue;
        }

        let message = respond(builder, &line).await;
        let mut encoded =
            serde_json::to_string(&message).context("failed to encode builder message")?;
        encoded.push('\n');
        writer
            .write_all(encoded.as_bytes())
            .await
            .context("failed to write builder message")?;
        writer.flush().await.context("failed to flush builder message")?;
    }
    Ok(())
}

async fn respond(builder: &CommandBuilder, line: &str) -> Message {
    let event = match serde_json::from_str::<InboundEvent>(line) {
        Ok(event) => event,
        Err(error) => {
            warn!(%error, "malformed builder event");
            return Message::plaintext(format!("malformed event: {error}"));
        }
    };

    if !CommandBuilder::should_handle(&event.command) {
        debug!(command = %event.command, "event is not addressed to the builder");
        return Message::plaintext(format!(
            "{:?} is not a builder command, send an empty command to start",
            event.command
        ));
    }

    match builder.handle(&event).await {
        Ok(message) => message,
        Err(error) => Message::plaintext(format!("{error:#}")),
    }
}
