// SPDX-License-Identifier: Apache-2.0
//! sp_frame
//!
//! Layer: Infrastructure
//! Purpose:
//! - scalability-protocols (SP) over TCP, as spoken by the host's sockets
//!
//! Wire format:
//! ```text
//! handshake (each side, once):  00 'S' 'P' 00 | proto u16 BE | 00 00
//! message:                      len u64 BE | hops u32 BE | body
//! ```
//! Both channels are PAIR v1; `len` covers the hop header and the body.

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};

/// PAIR v1 protocol id (`NNI_PROTO(1, 1)`).
pub const PROTO_PAIR1: u16 = 0x11;

const SP_MAGIC: [u8; 4] = [0x00, b'S', b'P', 0x00];
const HOP_HEADER_LEN: usize = 4;
const MAX_HOPS: u32 = 0xff;

fn handshake_header(proto: u16) -> [u8; 8] {
    let p = proto.to_be_bytes();
    [SP_MAGIC[0], SP_MAGIC[1], SP_MAGIC[2], SP_MAGIC[3], p[0], p[1], 0, 0]
}

/// Exchange SP headers and check the peer speaks `proto`.
pub async fn handshake<S>(stream: &mut S, proto: u16) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(&handshake_header(proto)).await?;
    stream.flush().await?;

    let mut peer = [0u8; 8];
    stream.read_exact(&mut peer).await?;

    if peer[..4] != SP_MAGIC || peer[6..] != [0, 0] {
        return Err(Error::Handshake(format!("bad SP header {peer:02x?}")));
    }
    let peer_proto = u16::from_be_bytes([peer[4], peer[5]]);
    if peer_proto != proto {
        return Err(Error::Handshake(format!(
            "peer speaks protocol {peer_proto:#x}, expected {proto:#x}"
        )));
    }
    Ok(())
}

/// Write one PAIR v1 message.
pub async fn write_frame<W>(w: &mut W, body: &[u8], max_frame: usize) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let len = body.len() + HOP_HEADER_LEN;
    if len > max_frame {
        return Err(Error::FrameTooLarge {
            size: len,
            max: max_frame,
        });
    }

    let mut buf = BytesMut::with_capacity(8 + len);
    buf.put_u64(len as u64);
    buf.put_u32(1);
    buf.put_slice(body);

    w.write_all(&buf).await?;
    w.flush().await?;
    Ok(())
}

/// Read one PAIR v1 message and return its body.
pub async fn read_frame<R>(r: &mut R, max_frame: usize) -> Result<Bytes>
where
    R: AsyncRead + Unpin,
{
    let len = r.read_u64().await?;
    let len = usize::try_from(len)
        .ok()
        .filter(|len| *len <= max_frame)
        .ok_or(Error::FrameTooLarge {
            size: usize::try_from(len).unwrap_or(usize::MAX),
            max: max_frame,
        })?;
    if len < HOP_HEADER_LEN {
        return Err(Error::Frame(format!("{len}-byte message has no hop header")));
    }

    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf).await?;

    let hops = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
    if hops > MAX_HOPS {
        return Err(Error::Frame(format!("hop header {hops:#x} out of range")));
    }

    Ok(Bytes::from(buf).slice(HOP_HEADER_LEN..))
}
