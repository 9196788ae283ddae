//! Terminal credential input

use async_trait::async_trait;
use pollbot_core::providers::{CredentialInput, InputError, InputRequest};
use std::io::{self, BufRead, Write};
use tokio::sync::Mutex;

/// Reads login secrets from stdin.
///
/// Accounts log in concurrently, so prompts are serialized: one question is
/// on screen at a time.
pub struct TerminalInput {
    turn: Mutex<()>,
}

impl TerminalInput {
    pub fn new() -> Self {
        Self {
            turn: Mutex::new(()),
        }
    }
}

impl Default for TerminalInput {
    fn default() -> Self {
        Self::new()
    }
}

/// Print `prompt` and read one line from `reader`. EOF cancels.
fn read_answer<R: BufRead, W: Write>(
    prompt: &str,
    reader: &mut R,
    writer: &mut W,
) -> Result<String, InputError> {
    write!(writer, "{}", prompt)?;
    writer.flush()?;

    let mut buffer = String::new();
    if reader.read_line(&mut buffer)? == 0 {
        return Err(InputError::Cancelled);
    }
    Ok(buffer.trim().to_string())
}

#[async_trait]
impl CredentialInput for TerminalInput {
    async fn request(&self, request: InputRequest) -> Result<String, InputError> {
        let _turn = self.turn.lock().await;
        let prompt = request.prompt();
        tracing::debug!(request = %request, "Waiting for terminal input");

        tokio::task::spawn_blocking(move || {
            let stdin = io::stdin();
            let mut stdout = io::stdout();
            read_answer(&prompt, &mut stdin.lock(), &mut stdout)
        })
        .await
        .map_err(|e| InputError::Io(io::Error::new(io::ErrorKind::Other, e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_answer_trims_and_prints_prompt() {
        let mut reader = Cursor::new("  +15550100 \n");
        let mut out = Vec::new();
        let answer = read_answer("Phone: ", &mut reader, &mut out).unwrap();
        assert_eq!(answer, "+15550100");
        assert_eq!(String::from_utf8(out).unwrap(), "Phone: ");
    }

    #[test]
    fn test_eof_cancels() {
        let mut reader = Cursor::new("");
        let mut out = Vec::new();
        let result = read_answer("Code: ", &mut reader, &mut out);
        assert!(matches!(result, Err(InputError::Cancelled)));
    }

    #[test]
    fn test_blank_line_is_empty_answer() {
        let mut reader = Cursor::new("\n");
        let mut out = Vec::new();
        assert_eq!(read_answer("Code: ", &mut reader, &mut out).unwrap(), "");
    }
}
