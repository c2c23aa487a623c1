//! Line codec for the stdio wire protocol.
//!
//! One JSON-RPC message per line, UTF-8, terminated by `\n` (a trailing `\r`
//! is tolerated). Lines longer than the configured cap are discarded and
//! reported instead of buffered.

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// One inbound line.
#[derive(Debug, PartialEq, Eq)]
pub enum Inbound {
    Line(Vec<u8>),
    /// Line exceeded the cap; holds the number of bytes skipped.
    Oversized(usize),
}

/// Read one line from the stream. Returns `None` on clean EOF.
pub async fn read_line<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    max_line_bytes: usize,
) -> std::io::Result<Option<Inbound>> {
    let mut buf = Vec::new();
    let limit = max_line_bytes as u64 + 1;
    let n = (&mut *reader).take(limit).read_until(b'\n', &mut buf).await?;
    if n == 0 {
        return Ok(None);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
        return Ok(Some(Inbound::Line(buf)));
    }

    // No newline: either EOF on a final unterminated line or the cap was hit.
    if buf.len() <= max_line_bytes {
        return Ok(Some(Inbound::Line(buf)));
    }
    let skipped = buf.len() + discard_line(reader).await?;
    Ok(Some(Inbound::Oversized(skipped)))
}

async fn discard_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> std::io::Result<usize> {
    let mut total = 0;
    loop {
        let (used, done) = {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                return Ok(total);
            }
            match available.iter().position(|b| *b == b'\n') {
                Some(i) => (i + 1, true),
                None => (available.len(), false),
            }
        };
        reader.consume(used);
        total += used;
        if done {
            return Ok(total);
        }
    }
}

/// Write one message followed by a newline, then flush.
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    message: &Value,
) -> std::io::Result<()> {
    let mut bytes = serde_json::to_vec(message)?;
    bytes.push(b'\n');
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn test_reads_lines_until_eof() {
        let data: &[u8] = b"{\"a\":1}\r\n{\"b\":2}\nlast";
        let mut reader = BufReader::new(data);
        assert_eq!(
            read_line(&mut reader, 64).await.unwrap(),
            Some(Inbound::Line(b"{\"a\":1}".to_vec()))
        );
        assert_eq!(
            read_line(&mut reader, 64).await.unwrap(),
            Some(Inbound::Line(b"{\"b\":2}".to_vec()))
        );
        assert_eq!(
            read_line(&mut reader, 64).await.unwrap(),
            Some(Inbound::Line(b"last".to_vec()))
        );
        assert_eq!(read_line(&mut reader, 64).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_oversized_line_skipped() {
        let data: &[u8] = b"0123456789abcdef\nok\n";
        let mut reader = BufReader::with_capacity(4, data);
        assert_eq!(
            read_line(&mut reader, 8).await.unwrap(),
            Some(Inbound::Oversized(17))
        );
        assert_eq!(
            read_line(&mut reader, 8).await.unwrap(),
            Some(Inbound::Line(b"ok".to_vec()))
        );
    }

    #[tokio::test]
    async fn test_line_at_cap_accepted() {
        let data: &[u8] = b"12345678\n";
        let mut reader = BufReader::new(data);
        assert_eq!(
            read_line(&mut reader, 8).await.unwrap(),
            Some(Inbound::Line(b"12345678".to_vec()))
        );
    }

    #[tokio::test]
    async fn test_write_message_appends_newline() {
        let mut out = Vec::new();
        write_message(&mut out, &json!({"jsonrpc": "2.0"})).await.unwrap();
        assert_eq!(out, b"{\"jsonrpc\":\"2.0\"}\n");
    }
}
