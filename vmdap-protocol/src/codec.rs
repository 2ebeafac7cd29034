//! Content-Length フレーミング
//!
//! DAP のメッセージは HTTP 風のヘッダで区切られる:
//!
//! ```text
//! Content-Length: 123\r\n
//! \r\n
//! { ...json... }
//! ```

use crate::{MAX_HEADER_LINE_BYTES, MAX_MESSAGE_BYTES};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{self, BufRead, Write};

/// 不正なフレームを警告して入出力エラーにする
fn rejected(message: String) -> io::Error {
    tracing::warn!("rejecting frame: {}", message);
    io::Error::new(io::ErrorKind::InvalidData, message)
}

/// 上限付きで 1 行を読み込む（改行を含む）
fn read_header_line<R: BufRead>(reader: &mut R) -> io::Result<Option<String>> {
    let mut buf = Vec::new();
    loop {
        let available = reader.fill_buf()?;
        if available.is_empty() {
            if buf.is_empty() {
                return Ok(None);
            }
            break;
        }

        let newline = available.iter().position(|&b| b == b'\n');
        let take = newline.map(|pos| pos + 1).unwrap_or(available.len());
        if buf.len() + take > MAX_HEADER_LINE_BYTES {
            return Err(rejected(format!(
                "header line exceeds {MAX_HEADER_LINE_BYTES} bytes"
            )));
        }

        buf.extend_from_slice(&available[..take]);
        reader.consume(take);
        if newline.is_some() {
            break;
        }
    }

    String::from_utf8(buf)
        .map(Some)
        .map_err(|_| rejected("header line is not UTF-8".to_string()))
}

/// フレーム 1 つ分のペイロードを読み込む
///
/// ヘッダを読む前に EOF に達した場合は `None` を返す。
pub fn read_raw_message<R: BufRead>(reader: &mut R) -> io::Result<Option<Vec<u8>>> {
    let mut content_length = None;
    let mut saw_header = false;

    loop {
        let Some(line) = read_header_line(reader)? else {
            if !saw_header {
                return Ok(None);
            }
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "EOF while reading headers",
            ));
        };
        saw_header = true;

        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            break;
        }

        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("Content-Length") {
                let value = value.trim();
                let length = value
                    .parse::<usize>()
                    .map_err(|err| rejected(format!("invalid Content-Length {value:?}: {err}")))?;
                content_length = Some(length);
            }
        }
    }

    let Some(content_length) = content_length else {
        return Err(rejected("missing Content-Length header".to_string()));
    };

    if content_length > MAX_MESSAGE_BYTES {
        return Err(rejected(format!(
            "Content-Length {content_length} exceeds {MAX_MESSAGE_BYTES} bytes"
        )));
    }

    let mut buf = vec![0u8; content_length];
    reader.read_exact(&mut buf)?;
    Ok(Some(buf))
}

/// ペイロードをフレーミングして書き込む
pub fn write_raw_message<W: Write>(writer: &mut W, payload: &[u8]) -> io::Result<()> {
    write!(writer, "Content-Length: {}\r\n\r\n", payload.len())?;
    writer.write_all(payload)?;
    writer.flush()
}

/// JSON メッセージを 1 つ読み込む
pub fn read_json_message<R: BufRead, T: DeserializeOwned>(reader: &mut R) -> io::Result<Option<T>> {
    let Some(bytes) = read_raw_message(reader)? else {
        return Ok(None);
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
}

/// JSON メッセージを 1 つ書き込む
pub fn write_json_message<W: Write, T: Serialize>(writer: &mut W, message: &T) -> io::Result<()> {
    let bytes = serde_json::to_vec(message)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
    write_raw_message(writer, &bytes)
}
