use clipvault_core::{ClipboardSource, VaultError, VaultResult};
use std::io::{IsTerminal, Read};

/// Reads clipboard text piped into the process, e.g. `pbpaste | clipvault capture`.
pub struct StdinClipboard;

impl ClipboardSource for StdinClipboard {
    fn read_text(&self) -> VaultResult<String> {
        let mut stdin = std::io::stdin();
        if stdin.is_terminal() {
            return Err(VaultError::PermissionDenied(
                "no clipboard text piped on stdin".to_string(),
            ));
        }
        let mut text = String::new();
        stdin
            .read_to_string(&mut text)
            .map_err(|e| VaultError::Storage(format!("read stdin: {e}")))?;
        Ok(text)
    }
}
