//! Interactive read-eval-print loop over a session.

use std::io::Write;

use futures_util::StreamExt;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::error::LLMError;
use crate::session::{ChatSession, Reply};

/// Runs the chat loop until `input` reaches end of file.
///
/// Prints a banner, then repeatedly prompts with `USER: `, sends the line and
/// prints the reply prefixed by the provider name. Streamed replies are written
/// fragment by fragment. Blank lines are not sent.
///
/// # Errors
///
/// The first session or terminal error ends the loop and is returned.
pub async fn run_chat_loop<R, W>(
    session: &mut dyn ChatSession,
    mut input: R,
    output: &mut W,
) -> Result<(), LLMError>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let name = session.provider().display_name();
    writeln!(output, "Welcome to the {name} LLM chat loop!")?;

    loop {
        write!(output, "\nUSER: ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line).await? == 0 {
            writeln!(output)?;
            return Ok(());
        }
        let message = line.trim_end_matches(['\r', '\n']);
        if message.trim().is_empty() {
            continue;
        }

        let reply = session.send_message(message).await?;
        write!(output, "\n{}: ", name.to_uppercase())?;
        match reply {
            Reply::Text(text) => writeln!(output, "{text}")?,
            Reply::Json(value) => {
                let pretty = serde_json::to_string_pretty(&value)
                    .unwrap_or_else(|_| value.to_string());
                writeln!(output, "{pretty}")?;
            }
            Reply::Stream(mut fragments) => {
                while let Some(fragment) = fragments.next().await {
                    write!(output, "{}", fragment?)?;
                    output.flush()?;
                }
                writeln!(output)?;
            }
        }
    }
}
