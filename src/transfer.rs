//! Chunked file-body transfer between a socket and a local file.
//!
//! Both directions move exactly `total_size` bytes in CHUNK_SIZE slices and
//! reconcile the count at the end. The receive side never requests more than
//! the bytes still owed, so a body read can never swallow the opening bytes
//! of the next frame. Neither function knows anything about commands or file
//! names.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};

use crate::codec;
use crate::error::{Error, Result};
use crate::protocol::CHUNK_SIZE;

/// Cooperative cancellation flag, checked between chunk iterations. Set from
/// the Ctrl-C handler thread; observed by whichever transfer is in flight.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Stream `total_size` bytes from `reader` onto `conn`. Calls `progress`
/// with the cumulative byte count after every chunk. Returns the bytes sent,
/// which on success always equals `total_size`.
pub async fn send_file<R, W, F>(
    reader: &mut R,
    conn: &mut W,
    total_size: u64,
    cancel: &CancelFlag,
    mut progress: F,
) -> Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    F: FnMut(u64),
{
    let mut buf = [0u8; CHUNK_SIZE];
    let mut sent: u64 = 0;
    while sent < total_size {
        if cancel.is_set() {
            return Err(Error::Cancelled);
        }
        let want = CHUNK_SIZE.min((total_size - sent) as usize);
        let n = reader.read(&mut buf[..want]).await?;
        if n == 0 {
            // Source file shrank underneath us; the announced size is a lie.
            return Err(Error::ShortRead {
                expected: total_size,
                got: sent,
            });
        }
        codec::write_all(conn, &buf[..n]).await?;
        sent += n as u64;
        progress(sent);
    }
    debug_assert_eq!(sent, total_size);
    Ok(sent)
}

/// Stream `total_size` bytes from `conn` into `writer`. Each iteration asks
/// for at most the bytes still remaining, and a zero-length read before the
/// count reconciles is a broken transfer, not an EOF.
pub async fn receive_file<R, W, F>(
    conn: &mut R,
    writer: &mut W,
    total_size: u64,
    cancel: &CancelFlag,
    mut progress: F,
) -> Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    F: FnMut(u64),
{
    let mut buf = [0u8; CHUNK_SIZE];
    let mut received: u64 = 0;
    while received < total_size {
        if cancel.is_set() {
            return Err(Error::Cancelled);
        }
        let want = CHUNK_SIZE.min((total_size - received) as usize);
        let n = match conn.read(&mut buf[..want]).await {
            Ok(n) => n,
            Err(e) if codec::is_disconnect(&e) => {
                return Err(Error::ConnectionBroken("read"));
            }
            Err(e) => return Err(e.into()),
        };
        if n == 0 {
            return Err(Error::ShortRead {
                expected: total_size,
                got: received,
            });
        }
        codec::write_all(writer, &buf[..n]).await?;
        received += n as u64;
        progress(received);
    }
    debug_assert_eq!(received, total_size);
    Ok(received)
}
