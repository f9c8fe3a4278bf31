//! Daemon side of the protocol: accept loop plus a per-connection handler
//! that mirrors the client session command for command.
//!
//! Every accepted connection gets its own task and its own state; nothing is
//! shared between clients except the root path, the logger and the transfer
//! history, all of which are append-only from the handlers' point of view.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use uuid::Uuid;

use crate::codec;
use crate::error::{Error, Result as ProtoResult};
use crate::history::{Direction, TransferLog, TransferLogEntry, TransferStatus};
use crate::logger::Logger;
use crate::protocol::{Command, SizeResult};
use crate::transfer::{self, CancelFlag};

pub struct ServerContext {
    pub root: PathBuf,
    pub logger: Arc<dyn Logger>,
    pub history: Option<Arc<TransferLog>>,
}

/// Bind `bind` and serve forever.
pub async fn serve(bind: &str, ctx: ServerContext) -> Result<()> {
    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("bind {bind}"))?;
    serve_on(listener, ctx).await
}

/// Accept loop over an already-bound listener. Split out so tests can bind
/// port 0 and learn the address before connecting.
pub async fn serve_on(listener: TcpListener, ctx: ServerContext) -> Result<()> {
    let ctx = Arc::new(ctx);
    loop {
        let (stream, peer) = listener.accept().await?;
        stream.set_nodelay(true).ok();
        let session_id = Uuid::new_v4().to_string();
        ctx.logger.connected(peer, &session_id);
        let ctx = Arc::clone(&ctx);
        tokio::spawn(async move {
            if let Err(e) = handle_client(stream, &session_id, &ctx).await {
                ctx.logger.error(&session_id, "session", &e.to_string());
                eprintln!("session {session_id}: {e}");
            }
        });
    }
}

async fn handle_client(
    mut stream: TcpStream,
    session_id: &str,
    ctx: &ServerContext,
) -> ProtoResult<()> {
    loop {
        let cmd = match codec::read_command(&mut stream).await {
            Ok(cmd) => cmd,
            // Peer dropped the socket between commands without an EXIT
            // frame. Not clean, but nothing is in flight.
            Err(Error::ShortRead { got: 0, .. }) => {
                ctx.logger.disconnected(session_id);
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        match cmd {
            Command::List => handle_list(&mut stream, session_id, ctx).await?,
            Command::Download => handle_download(&mut stream, session_id, ctx).await?,
            Command::Upload => handle_upload(&mut stream, session_id, ctx).await?,
            Command::Exit => {
                let _marker = codec::read_string(&mut stream).await?;
                ctx.logger.disconnected(session_id);
                stream.shutdown().await.ok();
                return Ok(());
            }
        }
    }
}

async fn handle_list(
    stream: &mut TcpStream,
    session_id: &str,
    ctx: &ServerContext,
) -> ProtoResult<()> {
    let _marker = codec::read_string(stream).await?;
    let names = list_files(&ctx.root)?;
    codec::write_u32(stream, names.len() as u32).await?;
    for name in &names {
        codec::write_string(stream, name).await?;
    }
    ctx.logger.listed(session_id, names.len());
    Ok(())
}

async fn handle_download(
    stream: &mut TcpStream,
    session_id: &str,
    ctx: &ServerContext,
) -> ProtoResult<()> {
    let name = codec::read_string(stream).await?;
    let path = match sanitize_name(&name) {
        Ok(n) => ctx.root.join(n),
        Err(e) => {
            ctx.logger.rejected(session_id, &format!("download {name:?}: {e}"));
            codec::write_size_result(stream, SizeResult::NotFound).await?;
            return Ok(());
        }
    };

    // Open before announcing a size so a file that disappears in between
    // cannot leave the client waiting on a body that never comes.
    let (mut file, size) = match File::open(&path).await {
        Ok(f) => match f.metadata().await {
            Ok(m) if m.is_file() => {
                let len = m.len();
                (f, len)
            }
            _ => {
                ctx.logger.rejected(session_id, &format!("download {name:?}: not a file"));
                record(ctx, session_id, Direction::Download, &name, TransferStatus::Rejected, 0, Some("not found".into()));
                codec::write_size_result(stream, SizeResult::NotFound).await?;
                return Ok(());
            }
        },
        Err(_) => {
            ctx.logger.rejected(session_id, &format!("download {name:?}: not found"));
            record(ctx, session_id, Direction::Download, &name, TransferStatus::Rejected, 0, Some("not found".into()));
            codec::write_size_result(stream, SizeResult::NotFound).await?;
            return Ok(());
        }
    };

    codec::write_size_result(stream, SizeResult::Size(size as i64)).await?;
    let cancel = CancelFlag::new();
    match transfer::send_file(&mut file, stream, size, &cancel, |_| {}).await {
        Ok(sent) => {
            ctx.logger.download_done(session_id, &name, sent);
            record(ctx, session_id, Direction::Download, &name, TransferStatus::Completed, sent, None);
            Ok(())
        }
        Err(e) => {
            record(ctx, session_id, Direction::Download, &name, TransferStatus::Failed, 0, Some(e.to_string()));
            Err(e)
        }
    }
}

async fn handle_upload(
    stream: &mut TcpStream,
    session_id: &str,
    ctx: &ServerContext,
) -> ProtoResult<()> {
    let _marker = codec::read_string(stream).await?;
    let size = match codec::read_size_result(stream).await? {
        SizeResult::Size(n) => n as u64,
        // The client decided its local candidate was unusable; nothing
        // follows and no file is created on this side.
        SizeResult::Invalid | SizeResult::NotFound => {
            ctx.logger.rejected(session_id, "upload: client reported invalid file");
            record(ctx, session_id, Direction::Upload, "", TransferStatus::Rejected, 0, Some("invalid local file".into()));
            return Ok(());
        }
    };

    let name = codec::read_string(stream).await?;
    let safe = sanitize_name(&name)
        .map_err(|e| Error::BadFrame(format!("upload name {name:?}: {e}")))?;
    let path = ctx.root.join(safe);

    let cancel = CancelFlag::new();
    let mut file = match File::create(&path).await {
        Ok(f) => f,
        Err(e) => {
            // Local filesystem trouble must not desync the stream: the body
            // is coming regardless, so swallow it and stay in session.
            let mut sink = tokio::io::sink();
            transfer::receive_file(stream, &mut sink, size, &cancel, |_| {}).await?;
            ctx.logger.error(session_id, "upload", &e.to_string());
            record(ctx, session_id, Direction::Upload, &name, TransferStatus::Failed, 0, Some(e.to_string()));
            return Ok(());
        }
    };
    match transfer::receive_file(stream, &mut file, size, &cancel, |_| {}).await {
        Ok(received) => {
            file.flush().await?;
            ctx.logger.upload_done(session_id, &name, received);
            record(ctx, session_id, Direction::Upload, &name, TransferStatus::Completed, received, None);
            Ok(())
        }
        Err(e) => {
            drop(file);
            tokio::fs::remove_file(&path).await.ok();
            record(ctx, session_id, Direction::Upload, &name, TransferStatus::Failed, 0, Some(e.to_string()));
            Err(e)
        }
    }
}

fn record(
    ctx: &ServerContext,
    session_id: &str,
    direction: Direction,
    name: &str,
    status: TransferStatus,
    bytes: u64,
    error: Option<String>,
) {
    if let Some(history) = &ctx.history {
        let entry = TransferLogEntry::new(session_id, direction, name, status, bytes, error);
        if let Err(e) = history.add_entry(entry) {
            ctx.logger.error(session_id, "history", &e.to_string());
        }
    }
}

/// The protocol deals in bare file names only. Anything that could walk out
/// of the served root is refused before the filesystem is consulted.
fn sanitize_name(name: &str) -> std::result::Result<&str, &'static str> {
    if name.is_empty() {
        return Err("empty name");
    }
    if name.contains('\0') {
        return Err("name contains NUL byte");
    }
    if name.contains('/') || name.contains('\\') {
        return Err("name contains path separator");
    }
    if name == "." || name == ".." {
        return Err("name is a directory reference");
    }
    Ok(name)
}

/// Regular files directly under `root`, sorted so listings are stable.
fn list_files(root: &Path) -> ProtoResult<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
        if !is_file {
            continue;
        }
        if let Ok(name) = entry.file_name().into_string() {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn sanitize_rejects_traversal() {
        assert!(sanitize_name("../etc/passwd").is_err());
        assert!(sanitize_name("..").is_err());
        assert!(sanitize_name("dir/file.txt").is_err());
        assert!(sanitize_name("dir\\file.txt").is_err());
        assert!(sanitize_name("").is_err());
        assert!(sanitize_name("nul\0byte").is_err());
    }

    #[test]
    fn sanitize_accepts_bare_names() {
        assert_eq!(sanitize_name("a.txt"), Ok("a.txt"));
        assert_eq!(sanitize_name("archive.tar.gz"), Ok("archive.tar.gz"));
        assert_eq!(sanitize_name(".hidden"), Ok(".hidden"));
    }

    #[test]
    fn listing_is_sorted_and_skips_directories() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.bin"), b"b").unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();
        std::fs::create_dir(dir.path().join("subdir")).unwrap();

        let names = list_files(dir.path()).unwrap();
        assert_eq!(names, vec!["a.txt".to_string(), "b.bin".to_string()]);
    }

    #[test]
    fn empty_root_lists_nothing() {
        let dir = TempDir::new().unwrap();
        assert!(list_files(dir.path()).unwrap().is_empty());
    }
}
