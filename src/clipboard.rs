use crate::error::{Error, Result};
use std::{
    fs,
    io::Write,
    path::Path,
    process::{Command, Stdio},
};
use tracing::debug;

const NATIVE_BACKEND: &str = "arboard";

/// External copy tools tried when the native clipboard is unavailable.
const TOOLS: &[(&str, &[&str])] = &[
    ("pbcopy", &[]),
    ("wl-copy", &[]),
    ("xclip", &["-selection", "clipboard"]),
    ("xsel", &["-ib"]),
    ("clip.exe", &[]),
];

/// Copies the committed document to the system clipboard.
#[derive(Debug, Default)]
pub struct Clipboard {
    source: Option<&'static str>,
}

impl Clipboard {
    /// Creates a clipboard handle that has not copied anything yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { source: None }
    }

    /// Copies the contents of `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Clipboard`] if output went to stdout or no backend
    /// accepted the text, and an IO error if the file cannot be read.
    pub fn copy_file(&mut self, path: Option<&Path>) -> Result<()> {
        let path = path.ok_or_else(|| {
            Error::clipboard("clipboard copy is not supported with -o -; use -o <file>")
        })?;
        let data = fs::read(path).map_err(|e| Error::io(path, e))?;
        let text = String::from_utf8_lossy(&data);

        match arboard::Clipboard::new().and_then(|mut cb| cb.set_text(text.as_ref())) {
            Ok(()) => {
                self.source = Some(NATIVE_BACKEND);
                return Ok(());
            }
            Err(e) => debug!("Native clipboard unavailable: {}", e),
        }

        for (tool, args) in TOOLS {
            if copy_via_tool(tool, args, &data) {
                self.source = Some(*tool);
                return Ok(());
            }
        }

        Err(Error::clipboard("no clipboard backend available"))
    }

    /// Returns the backend that performed the last successful copy.
    #[must_use]
    pub fn source(&self) -> &'static str {
        self.source.unwrap_or("unknown")
    }
}

fn copy_via_tool(tool: &str, args: &[&str], data: &[u8]) -> bool {
    let mut child = match Command::new(tool)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => child,
        Err(_) => return false,
    };

    let written = child
        .stdin
        .take()
        .is_some_and(|mut stdin| stdin.write_all(data).is_ok());

    match child.wait() {
        Ok(status) if written && status.success() => true,
        Ok(_) | Err(_) => {
            debug!("Clipboard tool {} failed", tool);
            false
        }
    }
}
