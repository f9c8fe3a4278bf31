use anyhow::Result;
use chrono::Utc;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Mutex;

/// Server-side operational log. Default methods are no-ops so NoopLogger
/// costs nothing on the hot path.
pub trait Logger: Send + Sync {
    fn connected(&self, _peer: SocketAddr, _session: &str) {}
    fn listed(&self, _session: &str, _count: usize) {}
    fn download_done(&self, _session: &str, _name: &str, _bytes: u64) {}
    fn upload_done(&self, _session: &str, _name: &str, _bytes: u64) {}
    fn rejected(&self, _session: &str, _reason: &str) {}
    fn error(&self, _session: &str, _context: &str, _msg: &str) {}
    fn disconnected(&self, _session: &str) {}
}

pub struct NoopLogger;
impl Logger for NoopLogger {}

pub struct TextLogger {
    file: Mutex<File>,
}

impl TextLogger {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let f = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(f),
        })
    }

    fn line(&self, s: &str) {
        if let Ok(mut f) = self.file.lock() {
            let _ = writeln!(f, "[{}] {}", Utc::now().to_rfc3339(), s);
        }
    }
}

impl Logger for TextLogger {
    fn connected(&self, peer: SocketAddr, session: &str) {
        self.line(&format!("CONNECT session={session} peer={peer}"));
    }
    fn listed(&self, session: &str, count: usize) {
        self.line(&format!("LIST session={session} count={count}"));
    }
    fn download_done(&self, session: &str, name: &str, bytes: u64) {
        self.line(&format!("DOWNLOAD session={session} name={name} bytes={bytes}"));
    }
    fn upload_done(&self, session: &str, name: &str, bytes: u64) {
        self.line(&format!("UPLOAD session={session} name={name} bytes={bytes}"));
    }
    fn rejected(&self, session: &str, reason: &str) {
        self.line(&format!("REJECT session={session} reason={reason}"));
    }
    fn error(&self, session: &str, context: &str, msg: &str) {
        self.line(&format!("ERROR session={session} ctx={context} msg={msg}"));
    }
    fn disconnected(&self, session: &str) {
        self.line(&format!("EXIT session={session}"));
    }
}
