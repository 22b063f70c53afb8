//! # Transport
//!
//! One connection, one frame, maybe one reply, hang up. The overlay never
//! pools or reuses connections: every exchange dials a fresh TCP stream,
//! writes a single JSON object, optionally reads a single JSON object
//! back, and closes. Callers treat every failure — refused, reset, timed
//! out, garbled — identically, as "not delivered", and carry on. The
//! failure detector is the only component that *wants* to know about
//! timeouts, and even it only counts them.
//!
//! There is no length prefix on the wire. The reader accumulates bytes
//! until the buffer holds one complete JSON value (serde tells us whether
//! an error means "truncated" or "nonsense"), or until the 4 KiB frame cap
//! says the sender is not speaking this protocol.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::config::MAX_FRAME_BYTES;
use crate::endpoint::Endpoint;
use crate::wire::{self, WireError};

/// Errors on the transport path. All of them collapse to "not delivered"
/// at the protocol layer; the variants exist for logs and tests.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Socket-level failure: connect refused, reset, broken pipe.
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
    /// The whole exchange did not finish inside its deadline.
    #[error("exchange timed out")]
    TimedOut,
    /// The peer closed the connection before sending any bytes.
    #[error("connection closed without a reply")]
    NoReply,
    /// More than [`MAX_FRAME_BYTES`] arrived without completing one JSON
    /// object. Whatever is on the other end, it is not one of ours.
    #[error("frame exceeded {MAX_FRAME_BYTES} bytes")]
    FrameOverflow,
    /// The frame completed but did not decode as the expected shape.
    #[error(transparent)]
    Wire(#[from] WireError),
}

// ---------------------------------------------------------------------------
// Client Side
// ---------------------------------------------------------------------------

/// Dials `target`, sends one frame, and reads one typed reply.
///
/// `deadline` bounds the whole exchange — connect, write, and read
/// together. The ping path passes its tighter 3 s budget here; everything
/// else uses the regular exchange timeout.
pub async fn request<T, R>(
    target: &Endpoint,
    frame: &T,
    deadline: Duration,
) -> Result<R, TransportError>
where
    T: Serialize,
    R: DeserializeOwned,
{
    timeout(deadline, async {
        let mut stream = TcpStream::connect(target.as_dial_pair()).await?;
        write_frame(&mut stream, frame).await?;
        let bytes = read_frame(&mut stream).await?;
        Ok(wire::decode(&bytes)?)
    })
    .await
    .map_err(|_| TransportError::TimedOut)?
}

/// Dials `target`, sends one frame, and hangs up without waiting for an
/// answer. Used for every vote and gossip kind — the frames that *are*
/// their own acknowledgement.
pub async fn fire_and_forget<T>(
    target: &Endpoint,
    frame: &T,
    deadline: Duration,
) -> Result<(), TransportError>
where
    T: Serialize,
{
    timeout(deadline, async {
        let mut stream = TcpStream::connect(target.as_dial_pair()).await?;
        write_frame(&mut stream, frame).await?;
        Ok(())
    })
    .await
    .map_err(|_| TransportError::TimedOut)?
}

// ---------------------------------------------------------------------------
// Framing
// ---------------------------------------------------------------------------

/// Writes one frame to the stream.
pub async fn write_frame<S, T>(stream: &mut S, frame: &T) -> Result<(), TransportError>
where
    S: AsyncWrite + Unpin,
    T: Serialize,
{
    let bytes = wire::encode(frame)?;
    stream.write_all(&bytes).await?;
    stream.flush().await?;
    Ok(())
}

/// Reads until the buffer holds one terminal JSON frame.
///
/// Returns the raw bytes; decoding (and deciding what a malformed frame
/// costs the sender) is the caller's business. A clean EOF mid-object
/// returns whatever arrived, so the decode error points at the real
/// problem instead of a generic disconnect.
pub async fn read_frame<S>(stream: &mut S) -> Result<Vec<u8>, TransportError>
where
    S: AsyncRead + Unpin,
{
    let mut buf: Vec<u8> = Vec::with_capacity(512);
    let mut chunk = [0u8; 512];

    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            if buf.is_empty() {
                return Err(TransportError::NoReply);
            }
            return Ok(buf);
        }

        buf.extend_from_slice(&chunk[..n]);
        if buf.len() > MAX_FRAME_BYTES {
            return Err(TransportError::FrameOverflow);
        }
        if frame_is_terminal(&buf) {
            return Ok(buf);
        }
    }
}

/// True when the buffer can never become a longer valid frame: either it
/// already parses, or serde says the prefix is nonsense (as opposed to
/// merely truncated).
fn frame_is_terminal(bytes: &[u8]) -> bool {
    match serde_json::from_slice::<serde::de::IgnoredAny>(bytes) {
        Ok(_) => true,
        Err(e) => !e.is_eof(),
    }
}
