use super::*;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Words longer than this are rejected instead of allocated.
const MAX_WORD_LEN: usize = 16 * 1024 * 1024;

/// One reply sentence from the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `!re`: a data row.
    Re(Record),
    /// `!done`: end of the reply. Login challenges arrive here as `ret`.
    Done(Record),
    /// `!trap`: the command failed.
    Trap(Record),
    /// `!fatal`: the device is closing the connection.
    Fatal(String),
    /// `!empty` (RouterOS 7.18+): no rows, a `!done` follows.
    Empty,
}

/// Encodes a word length using the RouterOS variable-length scheme.
pub fn encode_length(len: usize) -> Vec<u8> {
    let len = len as u32;
    if len < 0x80 {
        vec![len as u8]
    } else if len < 0x4000 {
        let v = len | 0x8000;
        vec![(v >> 8) as u8, v as u8]
    } else if len < 0x20_0000 {
        let v = len | 0xC0_0000;
        vec![(v >> 16) as u8, (v >> 8) as u8, v as u8]
    } else if len < 0x1000_0000 {
        let v = len | 0xE000_0000;
        vec![(v >> 24) as u8, (v >> 16) as u8, (v >> 8) as u8, v as u8]
    } else {
        vec![
            0xF0,
            (len >> 24) as u8,
            (len >> 16) as u8,
            (len >> 8) as u8,
            len as u8,
        ]
    }
}

/// Reads one encoded word length.
pub(super) async fn read_length<R>(reader: &mut R) -> Result<usize, RouterError>
where
    R: AsyncRead + Unpin,
{
    let first = reader.read_u8().await?;
    let (extra, initial) = if first & 0x80 == 0x00 {
        (0, u32::from(first))
    } else if first & 0xC0 == 0x80 {
        (1, u32::from(first & 0x3F))
    } else if first & 0xE0 == 0xC0 {
        (2, u32::from(first & 0x1F))
    } else if first & 0xF0 == 0xE0 {
        (3, u32::from(first & 0x0F))
    } else if first == 0xF0 {
        (4, 0)
    } else {
        return Err(RouterError::Protocol(format!(
            "reserved length control byte 0x{first:02x}"
        )));
    };

    let mut len = initial;
    for _ in 0..extra {
        len = (len << 8) | u32::from(reader.read_u8().await?);
    }
    Ok(len as usize)
}

pub(super) async fn write_sentence<W, S>(writer: &mut W, words: &[S]) -> Result<(), RouterError>
where
    W: AsyncWrite + Unpin,
    S: AsRef<str>,
{
    let mut buf = Vec::new();
    for word in words {
        let bytes = word.as_ref().as_bytes();
        buf.extend_from_slice(&encode_length(bytes.len()));
        buf.extend_from_slice(bytes);
    }
    // zero length word terminates the sentence
    buf.push(0);
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

async fn read_word<R>(reader: &mut R) -> Result<String, RouterError>
where
    R: AsyncRead + Unpin,
{
    let len = read_length(reader).await?;
    if len == 0 {
        return Ok(String::new());
    }
    if len > MAX_WORD_LEN {
        return Err(RouterError::Protocol(format!("word length {len} too large")));
    }
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Reads words until the terminating empty word.
pub(super) async fn read_sentence<R>(reader: &mut R) -> Result<Vec<String>, RouterError>
where
    R: AsyncRead + Unpin,
{
    let mut words = Vec::new();
    loop {
        let word = read_word(reader).await?;
        if word.is_empty() {
            if words.is_empty() {
                continue;
            }
            return Ok(words);
        }
        trace!("<<< {}", word);
        words.push(word);
    }
}

/// Splits `=key=value` into its parts. Values may contain `=`.
fn attribute(word: &str) -> Option<(&str, &str)> {
    let rest = word.strip_prefix('=')?;
    match rest.split_once('=') {
        Some((k, v)) => Some((k, v)),
        None => Some((rest, "")),
    }
}

/// Classifies a reply sentence.
pub(super) fn parse_reply(words: &[String]) -> Result<Reply, RouterError> {
    let (head, rest) = words
        .split_first()
        .ok_or_else(|| RouterError::Protocol("empty sentence".to_string()))?;

    if head == "!fatal" {
        return Ok(Reply::Fatal(rest.join(" ")));
    }

    // `.tag=` and other API words are not part of the row
    let record: Record = rest.iter().filter_map(|w| attribute(w)).collect();
    match head.as_str() {
        "!re" => Ok(Reply::Re(record)),
        "!done" => Ok(Reply::Done(record)),
        "!trap" => Ok(Reply::Trap(record)),
        "!empty" => Ok(Reply::Empty),
        other => Err(RouterError::Protocol(format!("unexpected reply word {other}"))),
    }
}
