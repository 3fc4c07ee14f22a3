//! # IPFS Store
//!
//! A [`ContentStore`] backed by a local IPFS node, driven through the `ipfs`
//! command-line client:
//!
//! - `put` pipes bytes into `ipfs add --quieter`
//! - `get` runs `ipfs cat <cid>`
//! - `publish` runs `ipfs name publish <cid>`
//! - `resolve` runs `ipfs name resolve`
//!
//! Addresses are whatever `ipfs add` prints. The node's own name record is the
//! mutable root pointer.

use std::io::Write;
use std::process::{Command, Stdio};
use tessera_core::{Cid, ContentStore, TesseraError};

/// Identity CID of empty data: what a fresh node's name resolves to.
const EMPTY_ROOT: &str = "/ipfs/bafkqaaa";

/// Content store that shells out to an `ipfs` binary.
#[derive(Debug, Clone)]
pub struct IpfsStore {
    binary: String,
}

impl IpfsStore {
    #[must_use]
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    #[must_use]
    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Run the client with `args`, feeding `input` on stdin.
    ///
    /// Returns stdout on success and the trimmed stderr on failure.
    fn run(&self, args: &[&str], input: Option<&[u8]>) -> Result<Result<Vec<u8>, String>, TesseraError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        tracing::debug!(binary = %self.binary, ?args, "running ipfs");
        let mut child = cmd.spawn().map_err(|e| {
            TesseraError::Store(format!("Cannot run '{}': {}", self.binary, e))
        })?;

        if let (Some(bytes), Some(mut stdin)) = (input, child.stdin.take()) {
            stdin
                .write_all(bytes)
                .map_err(|e| TesseraError::Store(format!("ipfs stdin: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| TesseraError::Store(format!("ipfs wait: {}", e)))?;

        if output.status.success() {
            Ok(Ok(output.stdout))
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::debug!(?args, status = %output.status, %stderr, "ipfs failed");
            Ok(Err(stderr))
        }
    }

    fn text(bytes: Vec<u8>) -> Result<String, TesseraError> {
        String::from_utf8(bytes)
            .map(|s| s.trim().to_string())
            .map_err(|e| TesseraError::Store(format!("ipfs printed non-UTF-8 output: {}", e)))
    }
}

/// Interpret the output of `ipfs name resolve`.
pub fn parse_resolved(output: &str) -> Result<Option<Cid>, TesseraError> {
    let output = output.trim();
    if output.is_empty() || output == EMPTY_ROOT {
        return Ok(None);
    }
    let cid = output.strip_prefix("/ipfs/").unwrap_or(output);
    Cid::parse(cid)
        .map(Some)
        .map_err(|e| TesseraError::Store(format!("Unexpected name resolution {:?}: {}", output, e)))
}

impl ContentStore for IpfsStore {
    fn put(&mut self, bytes: &[u8]) -> Result<Cid, TesseraError> {
        let stdout = self
            .run(&["add", "--quieter"], Some(bytes))?
            .map_err(|stderr| TesseraError::Store(format!("ipfs add failed: {}", stderr)))?;
        let cid = Cid::parse(Self::text(stdout)?)?;
        tracing::debug!(cid = %cid, size = bytes.len(), "ipfs add");
        Ok(cid)
    }

    fn get(&self, cid: &Cid) -> Result<Vec<u8>, TesseraError> {
        match self.run(&["cat", cid.as_str()], None)? {
            Ok(bytes) => Ok(bytes),
            Err(stderr) if stderr.contains("not found") => {
                Err(TesseraError::MissingObject(cid.clone()))
            }
            Err(stderr) => Err(TesseraError::Store(format!("ipfs cat {}: {}", cid, stderr))),
        }
    }

    fn publish(&mut self, cid: &Cid) -> Result<(), TesseraError> {
        let stdout = self
            .run(&["name", "publish", cid.as_str()], None)?
            .map_err(|stderr| TesseraError::Store(format!("ipfs name publish failed: {}", stderr)))?;
        tracing::info!(cid = %cid, response = %Self::text(stdout)?, "published ipfs name");
        Ok(())
    }

    fn resolve(&self) -> Result<Option<Cid>, TesseraError> {
        match self.run(&["name", "resolve"], None)? {
            Ok(stdout) => parse_resolved(&Self::text(stdout)?),
            // A node that never published has no record to resolve.
            Err(stderr) if stderr.contains("could not resolve") => Ok(None),
            Err(stderr) => Err(TesseraError::Store(format!("ipfs name resolve failed: {}", stderr))),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
