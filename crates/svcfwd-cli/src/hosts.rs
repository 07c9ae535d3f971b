//! Hosts-file editor.
//!
//! Manages a marked block inside the system hosts file, leaving everything
//! outside the block untouched. The original file is backed up next to
//! itself before the first write. Mutations flush immediately so names
//! resolve while forwards are live; `save` persists the final state after
//! the orchestrator's join barrier.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use svcfwd_core::hosts::HostsRegistry;
use svcfwd_core::{Error, Result};

const BLOCK_BEGIN: &str = "# svcfwd begin";
const BLOCK_END: &str = "# svcfwd end";

/// Editor for the system hosts file.
pub struct EtcHosts {
    inner: Mutex<Inner>,
}

struct Inner {
    path: PathBuf,
    /// File content as loaded, for the one-time backup.
    original: String,
    /// Lines outside the managed block, in file order.
    preserved: Vec<String>,
    aliases: BTreeMap<String, Ipv4Addr>,
    backed_up: bool,
    /// Something changed since load: an alias mutation, or a stale block
    /// stripped from the file. An untouched table is never rewritten.
    dirty: bool,
}

impl EtcHosts {
    /// Load the hosts file, dropping any stale managed block left behind by
    /// a previous run.
    pub fn load(path: &Path) -> Result<Self> {
        let original = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                return Err(Error::Hosts {
                    message: format!("cannot read {}: {e}", path.display()),
                });
            }
        };

        let mut preserved = Vec::new();
        let mut in_block = false;
        let mut saw_block = false;
        for line in original.lines() {
            match line.trim() {
                BLOCK_BEGIN => {
                    in_block = true;
                    saw_block = true;
                }
                BLOCK_END => in_block = false,
                _ if !in_block => preserved.push(line.to_string()),
                _ => {}
            }
        }

        Ok(Self {
            inner: Mutex::new(Inner {
                path: path.to_path_buf(),
                original,
                preserved,
                aliases: BTreeMap::new(),
                backed_up: false,
                dirty: saw_block,
            }),
        })
    }

    /// Path the backup is written to.
    pub fn backup_path(path: &Path) -> PathBuf {
        let mut name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "hosts".to_string());
        name.push_str(".svcfwd.bak");
        path.with_file_name(name)
    }
}

impl Inner {
    fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.preserved {
            out.push_str(line);
            out.push('\n');
        }
        if !self.aliases.is_empty() {
            out.push_str(BLOCK_BEGIN);
            out.push('\n');
            for (hostname, addr) in &self.aliases {
                out.push_str(&format!("{addr}\t{hostname}\n"));
            }
            out.push_str(BLOCK_END);
            out.push('\n');
        }
        out
    }

    async fn flush(&mut self) -> Result<()> {
        if !self.backed_up {
            let backup = EtcHosts::backup_path(&self.path);
            tokio::fs::write(&backup, &self.original)
                .await
                .map_err(|e| Error::Hosts {
                    message: format!("cannot back up hosts file to {}: {e}", backup.display()),
                })?;
            info!(backup = %backup.display(), "backed up hosts file");
            self.backed_up = true;
        }

        // Write-then-rename so a crash never leaves a torn hosts file.
        let tmp = self.path.with_file_name(".svcfwd.hosts.tmp");
        tokio::fs::write(&tmp, self.render())
            .await
            .map_err(|e| Error::Hosts {
                message: format!("cannot write {}: {e}", tmp.display()),
            })?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| Error::Hosts {
                message: format!("cannot replace {}: {e}", self.path.display()),
            })?;
        Ok(())
    }
}

#[async_trait]
impl HostsRegistry for EtcHosts {
    async fn add_alias(&self, hostname: &str, addr: Ipv4Addr) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.aliases.insert(hostname.to_string(), addr);
        inner.dirty = true;
        debug!(hostname, addr = %addr, "hosts alias added");
        inner.flush().await
    }

    async fn remove_alias(&self, hostname: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.aliases.remove(hostname).is_some() {
            inner.dirty = true;
            debug!(hostname, "hosts alias removed");
            inner.flush().await?;
        }
        Ok(())
    }

    async fn save(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if !inner.dirty {
            return Ok(());
        }
        inner.flush().await
    }
}
