//! Banner grabbing for open TCP connections.
//!
//! Optionally writes a trigger sequence, then reads whatever the service
//! sends within the banner timeout. Banners are kept as raw bytes; escaping
//! for display happens only at output time.

use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::trace;

/// Maximum bytes read for a banner.
pub const MAX_BANNER_SIZE: usize = 4096;

/// Maximum banner bytes rendered by `escape_banner`.
const DISPLAY_LIMIT: usize = 256;

/// Read a banner from a connected stream.
///
/// The trigger write and the single read share one deadline. Any failure
/// (timeout, reset, EOF) yields an empty banner.
pub async fn read_banner<S>(stream: &mut S, trigger: Option<&[u8]>, limit: Duration) -> Vec<u8>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let exchange = async {
        if let Some(trigger) = trigger {
            stream.write_all(trigger).await?;
        }
        let mut buffer = vec![0u8; MAX_BANNER_SIZE];
        let n = stream.read(&mut buffer).await?;
        buffer.truncate(n);
        Ok::<_, std::io::Error>(buffer)
    };

    match timeout(limit, exchange).await {
        Ok(Ok(banner)) => banner,
        Ok(Err(e)) => {
            trace!(error = %e, "banner read failed");
            Vec::new()
        }
        Err(_) => Vec::new(),
    }
}

/// Render banner bytes as a single printable line.
///
/// Printable ASCII passes through; `\r`, `\n`, `\t` and backslash are escaped
/// and other bytes become `\xNN`. Output is cut after `DISPLAY_LIMIT` bytes.
pub fn escape_banner(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len().min(DISPLAY_LIMIT));
    for &b in data.iter().take(DISPLAY_LIMIT) {
        match b {
            b'\r' => out.push_str("\\r"),
            b'\n' => out.push_str("\\n"),
            b'\t' => out.push_str("\\t"),
            b'\\' => out.push_str("\\\\"),
            b if b.is_ascii_graphic() || b == b' ' => out.push(b as char),
            b => out.push_str(&format!("\\x{:02x}", b)),
        }
    }
    if data.len() > DISPLAY_LIMIT {
        out.push_str("...");
    }
    out
}

/// Parse a trigger given on the command line, honouring C-style escapes.
pub fn parse_trigger(s: &str) -> Result<Vec<u8>, String> {
    let mut out = Vec::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        match chars.next() {
            Some('r') => out.push(b'\r'),
            Some('n') => out.push(b'\n'),
            Some('t') => out.push(b'\t'),
            Some('0') => out.push(0),
            Some('\\') => out.push(b'\\'),
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                let byte = u8::from_str_radix(&hex, 16)
                    .map_err(|_| format!("invalid hex escape '\\x{}'", hex))?;
                out.push(byte);
            }
            Some(other) => return Err(format!("unknown escape '\\{}'", other)),
            None => return Err("trailing backslash".to_string()),
        }
    }
    Ok(out)
}
