//! Frame primitives: fixed-width integers and length-prefixed strings.
//!
//! Symmetric encode/decode used by both the client session and the server
//! connection handler. Every read here is for an exact, predetermined byte
//! count; a stream that closes early surfaces `ShortRead` instead of
//! blocking or returning garbage.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};
use crate::protocol::{status, Command, SizeResult, MAX_NAME_LEN};

/// Read exactly `buf.len()` bytes, counting what actually arrived so a
/// truncated frame can report how far it got.
pub async fn read_exact<R>(stream: &mut R, buf: &mut [u8]) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0usize;
    while filled < buf.len() {
        let n = match stream.read(&mut buf[filled..]).await {
            Ok(n) => n,
            // A reset peer is a dead connection, not a local I/O problem.
            Err(e) if is_disconnect(&e) => {
                return Err(Error::ConnectionBroken("read"));
            }
            Err(e) => return Err(e.into()),
        };
        if n == 0 {
            return Err(Error::ShortRead {
                expected: buf.len() as u64,
                got: filled as u64,
            });
        }
        filled += n;
    }
    Ok(())
}

/// Write all of `buf`, treating a zero-byte write as a broken connection.
pub async fn write_all<W>(stream: &mut W, buf: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut sent = 0usize;
    while sent < buf.len() {
        let n = match stream.write(&buf[sent..]).await {
            Ok(n) => n,
            Err(e) if is_disconnect(&e) => {
                return Err(Error::ConnectionBroken("write"));
            }
            Err(e) => return Err(e.into()),
        };
        if n == 0 {
            return Err(if sent == 0 {
                Error::ConnectionBroken("zero-byte write")
            } else {
                Error::ShortWrite {
                    expected: buf.len() as u64,
                    wrote: sent as u64,
                }
            });
        }
        sent += n;
    }
    Ok(())
}

pub(crate) fn is_disconnect(e: &std::io::Error) -> bool {
    use std::io::ErrorKind::{BrokenPipe, ConnectionAborted, ConnectionReset, WriteZero};
    matches!(e.kind(), BrokenPipe | ConnectionReset | ConnectionAborted | WriteZero)
}

pub async fn write_u32<W: AsyncWrite + Unpin>(stream: &mut W, v: u32) -> Result<()> {
    write_all(stream, &v.to_le_bytes()).await
}

pub async fn read_u32<R: AsyncRead + Unpin>(stream: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    read_exact(stream, &mut buf).await?;
    Ok(u32::from_le_bytes(buf))
}

pub async fn write_i64<W: AsyncWrite + Unpin>(stream: &mut W, v: i64) -> Result<()> {
    write_all(stream, &v.to_le_bytes()).await
}

pub async fn read_i64<R: AsyncRead + Unpin>(stream: &mut R) -> Result<i64> {
    let mut buf = [0u8; 8];
    read_exact(stream, &mut buf).await?;
    Ok(i64::from_le_bytes(buf))
}

pub async fn write_command<W: AsyncWrite + Unpin>(stream: &mut W, cmd: Command) -> Result<()> {
    write_u32(stream, cmd.opcode()).await
}

pub async fn read_command<R: AsyncRead + Unpin>(stream: &mut R) -> Result<Command> {
    let op = read_u32(stream).await?;
    Command::from_opcode(op).ok_or_else(|| Error::BadFrame(format!("unknown opcode {op}")))
}

/// `[len:u32][utf8 bytes]`
pub async fn write_string<W: AsyncWrite + Unpin>(stream: &mut W, s: &str) -> Result<()> {
    if s.len() > MAX_NAME_LEN {
        return Err(Error::BadFrame(format!("string too long: {} bytes", s.len())));
    }
    write_u32(stream, s.len() as u32).await?;
    write_all(stream, s.as_bytes()).await
}

pub async fn read_string<R: AsyncRead + Unpin>(stream: &mut R) -> Result<String> {
    let len = read_u32(stream).await? as usize;
    if len > MAX_NAME_LEN {
        return Err(Error::BadFrame(format!("declared string length {len} exceeds limit")));
    }
    let mut buf = vec![0u8; len];
    read_exact(stream, &mut buf).await?;
    String::from_utf8(buf).map_err(|e| Error::BadFrame(format!("invalid utf-8 string: {e}")))
}

/// `[status:u8][size:i64]`. The size field is 0 and carries no meaning
/// unless the status byte is OK; the frame is nine bytes either way.
pub async fn write_size_result<W: AsyncWrite + Unpin>(
    stream: &mut W,
    result: SizeResult,
) -> Result<()> {
    let (st, size) = match result {
        SizeResult::Size(n) => (status::OK, n),
        SizeResult::NotFound => (status::NOT_FOUND, 0),
        SizeResult::Invalid => (status::INVALID, 0),
    };
    write_all(stream, &[st]).await?;
    write_i64(stream, size).await
}

pub async fn read_size_result<R: AsyncRead + Unpin>(stream: &mut R) -> Result<SizeResult> {
    let mut st = [0u8; 1];
    read_exact(stream, &mut st).await?;
    let size = read_i64(stream).await?;
    match st[0] {
        status::OK => {
            if size < 0 {
                return Err(Error::BadFrame(format!("negative file size {size}")));
            }
            Ok(SizeResult::Size(size))
        }
        status::NOT_FOUND => Ok(SizeResult::NotFound),
        status::INVALID => Ok(SizeResult::Invalid),
        other => Err(Error::BadFrame(format!("unknown size status {other}"))),
    }
}
