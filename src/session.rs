//! Client-side session controller.
//!
//! A [`Session`] exclusively owns the connection for its whole lifetime: one
//! TCP stream, opened once, closed exactly once by [`Session::exit`]. Each
//! operation is a complete request/response cycle; nothing is pipelined and
//! nothing is cached between calls.

use std::path::Path;

use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::codec;
use crate::error::{Error, Result};
use crate::protocol::{marker, Command, SizeResult};
use crate::transfer::{self, CancelFlag};

pub struct Session {
    stream: TcpStream,
    cancel: CancelFlag,
}

impl Session {
    /// Connect to `host:port`. The cancel flag is shared with the caller's
    /// interrupt handler so an in-flight transfer can be aborted cleanly.
    pub async fn connect(host: &str, port: u16, cancel: CancelFlag) -> Result<Self> {
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(true).ok();
        Ok(Session { stream, cancel })
    }

    /// Fetch a fresh listing of the files the server offers. The returned
    /// vector is owned by the caller; every call is a new round trip.
    pub async fn list(&mut self) -> Result<Vec<String>> {
        codec::write_command(&mut self.stream, Command::List).await?;
        codec::write_string(&mut self.stream, marker::LIST).await?;

        let count = codec::read_u32(&mut self.stream).await?;
        let mut names = Vec::with_capacity(count.min(1024) as usize);
        for _ in 0..count {
            names.push(codec::read_string(&mut self.stream).await?);
        }
        Ok(names)
    }

    /// Download `name` from the server into `dest`. On the not-found status
    /// no bytes follow and the local filesystem is left untouched. Returns
    /// the number of body bytes received.
    pub async fn download<F>(&mut self, name: &str, dest: &Path, progress: F) -> Result<u64>
    where
        F: FnMut(u64),
    {
        codec::write_command(&mut self.stream, Command::Download).await?;
        codec::write_string(&mut self.stream, name).await?;

        let size = match codec::read_size_result(&mut self.stream).await? {
            SizeResult::Size(n) => n as u64,
            SizeResult::NotFound => return Err(Error::NotFound(name.to_string())),
            SizeResult::Invalid => {
                return Err(Error::BadFrame("unexpected invalid status for download".into()))
            }
        };

        let mut file = match File::create(dest).await {
            Ok(f) => f,
            Err(e) => {
                // The body is already committed on the wire. Drain it so the
                // stream stays framed and the session survives the local
                // filesystem failure.
                let mut sink = tokio::io::sink();
                transfer::receive_file(&mut self.stream, &mut sink, size, &self.cancel, |_| {})
                    .await?;
                return Err(e.into());
            }
        };
        let received =
            transfer::receive_file(&mut self.stream, &mut file, size, &self.cancel, progress)
                .await;
        match received {
            Ok(n) => {
                file.flush().await?;
                Ok(n)
            }
            Err(e) => {
                // Do not leave a truncated download behind.
                drop(file);
                tokio::fs::remove_file(dest).await.ok();
                Err(e)
            }
        }
    }

    /// Upload the file at `path` under its own file name. An invalid local
    /// path is announced to the peer with the invalid status and surfaces as
    /// [`Error::InvalidLocalFile`]; the session stays usable.
    pub async fn upload<F>(&mut self, path: &Path, progress: F) -> Result<u64>
    where
        F: FnMut(u64),
    {
        codec::write_command(&mut self.stream, Command::Upload).await?;
        codec::write_string(&mut self.stream, marker::UPLOAD).await?;

        // Validate by opening before any size is committed to the wire, so a
        // file that vanishes between stat and open cannot desync the stream.
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n,
            None => {
                codec::write_size_result(&mut self.stream, SizeResult::Invalid).await?;
                return Err(Error::InvalidLocalFile(path.to_path_buf()));
            }
        };
        let (mut file, size) = match File::open(path).await {
            Ok(f) => match f.metadata().await {
                Ok(m) if m.is_file() => (f, m.len()),
                _ => {
                    codec::write_size_result(&mut self.stream, SizeResult::Invalid).await?;
                    return Err(Error::InvalidLocalFile(path.to_path_buf()));
                }
            },
            Err(_) => {
                codec::write_size_result(&mut self.stream, SizeResult::Invalid).await?;
                return Err(Error::InvalidLocalFile(path.to_path_buf()));
            }
        };

        codec::write_size_result(&mut self.stream, SizeResult::Size(size as i64)).await?;
        codec::write_string(&mut self.stream, name).await?;
        transfer::send_file(&mut file, &mut self.stream, size, &self.cancel, progress).await
    }

    /// Send the EXIT frame and close the connection. Terminal: the session
    /// is consumed and no further operations are possible.
    pub async fn exit(mut self) -> Result<()> {
        codec::write_command(&mut self.stream, Command::Exit).await?;
        codec::write_string(&mut self.stream, marker::EXIT).await?;
        self.stream.shutdown().await.ok();
        Ok(())
    }
}
