//! Interactive loop: read a line, submit it, print the answer.

use crate::agent::session::AgentSession;
use crate::events::{render_event, AgentEvent};
use crate::types::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

pub const PROMPT: &str = "Enter your message (type 'exit' to quit): ";
pub const EXIT_KEYWORD: &str = "exit";

/// Run until EOF or the exit keyword.
///
/// With `events`, tool events are printed while the turn runs. A failed
/// submit prints `Error: ...` and the loop continues.
pub async fn run_repl<R, W>(
    session: &mut AgentSession,
    mut input: R,
    output: &mut W,
    mut events: Option<&mut mpsc::UnboundedReceiver<AgentEvent>>,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = String::new();
    loop {
        output.write_all(PROMPT.as_bytes()).await?;
        output.flush().await?;

        line.clear();
        if input.read_line(&mut line).await? == 0 {
            break;
        }
        let message = line.trim_end_matches(['\r', '\n']);
        if message.eq_ignore_ascii_case(EXIT_KEYWORD) {
            break;
        }
        if message.trim().is_empty() {
            continue;
        }

        output
            .write_all(format!("User: {}\n", message).as_bytes())
            .await?;

        let result = match events.as_deref_mut() {
            Some(rx) => submit_streaming(session, message, rx, output).await?,
            None => session.submit(message).await,
        };

        let reply = match result {
            Ok(answer) => format!("Agent: {}\n", answer),
            Err(e) => format!("Error: {}\n", e),
        };
        output.write_all(reply.as_bytes()).await?;
    }

    output.flush().await?;
    Ok(())
}

/// Submit while printing events as they arrive. The outer result carries
/// output failures; the inner one is the turn's own outcome.
async fn submit_streaming<W: AsyncWrite + Unpin>(
    session: &mut AgentSession,
    message: &str,
    events: &mut mpsc::UnboundedReceiver<AgentEvent>,
    output: &mut W,
) -> Result<Result<String>> {
    let submit = session.submit(message);
    tokio::pin!(submit);

    let result = loop {
        tokio::select! {
            biased;
            Some(event) = events.recv() => {
                output.write_all(format!("{}\n", render_event(&event)).as_bytes()).await?;
            }
            result = &mut submit => break result,
        }
    };

    while let Ok(event) = events.try_recv() {
        output
            .write_all(format!("{}\n", render_event(&event)).as_bytes())
            .await?;
    }
    Ok(result)
}
