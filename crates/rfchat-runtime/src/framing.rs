//! Message framing over an established channel
//!
//! `Framing::Raw` keeps the link's historical contract: whatever one read
//! returns is one message, and a send writes the bare UTF-8 bytes. Nothing on
//! the wire marks message boundaries, so a long message can arrive split over
//! several reads, or two quick sends can arrive as one. `Framing::LengthDelimited`
//! prefixes each message with its length so boundaries survive; both peers
//! must agree on the mode.

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use rfchat_core::{BoxChannel, Framing, LinkConfig, TransportError};
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};

// ----------------------------------------------------------------------------
// Channel Split
// ----------------------------------------------------------------------------

/// Split a channel into independently owned message reader and writer
pub fn split_channel(channel: BoxChannel, config: &LinkConfig) -> (FrameReader, FrameWriter) {
    let (reader, writer) = tokio::io::split(channel);
    match config.framing {
        Framing::Raw => (
            FrameReader::Raw {
                reader,
                buf: vec![0u8; config.read_buffer_size],
            },
            FrameWriter::Raw(writer),
        ),
        Framing::LengthDelimited => {
            let codec = || {
                LengthDelimitedCodec::builder()
                    .max_frame_length(config.max_frame_length)
                    .new_codec()
            };
            (
                FrameReader::LengthDelimited(FramedRead::new(reader, codec())),
                FrameWriter::LengthDelimited(FramedWrite::new(writer, codec())),
            )
        }
    }
}

// ----------------------------------------------------------------------------
// Reader
// ----------------------------------------------------------------------------

/// Read side of an established channel
pub enum FrameReader {
    Raw {
        reader: ReadHalf<BoxChannel>,
        buf: Vec<u8>,
    },
    LengthDelimited(FramedRead<ReadHalf<BoxChannel>, LengthDelimitedCodec>),
}

impl FrameReader {
    /// Wait for the next non-empty message
    ///
    /// Returns `Ok(None)` once the peer has closed the stream. Text is
    /// decoded lossily: invalid UTF-8, including a multi-byte character
    /// split across two raw reads, becomes U+FFFD. Cancel-safe.
    pub async fn next_message(&mut self) -> Result<Option<String>, TransportError> {
        match self {
            FrameReader::Raw { reader, buf } => {
                let n = reader.read(buf).await?;
                if n == 0 {
                    return Ok(None);
                }
                Ok(Some(String::from_utf8_lossy(&buf[..n]).into_owned()))
            }
            FrameReader::LengthDelimited(framed) => loop {
                match framed.next().await {
                    Some(Ok(frame)) if frame.is_empty() => continue,
                    Some(Ok(frame)) => {
                        return Ok(Some(String::from_utf8_lossy(&frame).into_owned()))
                    }
                    Some(Err(e)) => return Err(e.into()),
                    None => return Ok(None),
                }
            },
        }
    }
}

// ----------------------------------------------------------------------------
// Writer
// ----------------------------------------------------------------------------

/// Write side of an established channel
pub enum FrameWriter {
    Raw(WriteHalf<BoxChannel>),
    LengthDelimited(FramedWrite<WriteHalf<BoxChannel>, LengthDelimitedCodec>),
}

impl FrameWriter {
    /// Write one message and flush it
    pub async fn write_message(&mut self, text: &str) -> Result<(), TransportError> {
        match self {
            FrameWriter::Raw(writer) => {
                writer.write_all(text.as_bytes()).await?;
                writer.flush().await?;
            }
            FrameWriter::LengthDelimited(framed) => {
                framed.send(Bytes::copy_from_slice(text.as_bytes())).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    fn raw_config(buffer: usize) -> LinkConfig {
        LinkConfig::new().with_read_buffer_size(buffer)
    }

    #[tokio::test]
    async fn test_raw_one_read_is_one_message() {
        let mock = Builder::new().read(b"hello").read(b"world").build();
        let (mut reader, _writer) = split_channel(Box::new(mock), &raw_config(1024));

        assert_eq!(reader.next_message().await.unwrap().as_deref(), Some("hello"));
        assert_eq!(reader.next_message().await.unwrap().as_deref(), Some("world"));
        assert_eq!(reader.next_message().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_raw_message_larger_than_buffer_is_split() {
        let mock = Builder::new().read(b"abcdef").build();
        let (mut reader, _writer) = split_channel(Box::new(mock), &raw_config(4));

        assert_eq!(reader.next_message().await.unwrap().as_deref(), Some("abcd"));
        assert_eq!(reader.next_message().await.unwrap().as_deref(), Some("ef"));
    }

    #[tokio::test]
    async fn test_raw_invalid_utf8_is_replaced() {
        let mock = Builder::new().read(&[b'o', b'k', 0xff]).build();
        let (mut reader, _writer) = split_channel(Box::new(mock), &raw_config(16));

        assert_eq!(
            reader.next_message().await.unwrap().as_deref(),
            Some("ok\u{FFFD}")
        );
    }

    #[tokio::test]
    async fn test_raw_write_sends_bare_bytes() {
        let mock = Builder::new().write(b"hello").build();
        let (_reader, mut writer) = split_channel(Box::new(mock), &raw_config(16));

        writer.write_message("hello").await.unwrap();
    }

    #[tokio::test]
    async fn test_read_error_is_reported() {
        let mock = Builder::new()
            .read_error(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "peer reset",
            ))
            .build();
        let (mut reader, _writer) = split_channel(Box::new(mock), &raw_config(16));

        assert!(matches!(
            reader.next_message().await,
            Err(TransportError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_length_delimited_reassembles_split_frames() {
        let config = LinkConfig::new().with_framing(Framing::LengthDelimited);
        let mock = Builder::new()
            .read(&[0, 0, 0, 5, b'h', b'e'])
            .read(&[b'l', b'l', b'o', 0, 0, 0, 2, b'h', b'i'])
            .build();
        let (mut reader, _writer) = split_channel(Box::new(mock), &config);

        assert_eq!(reader.next_message().await.unwrap().as_deref(), Some("hello"));
        assert_eq!(reader.next_message().await.unwrap().as_deref(), Some("hi"));
        assert_eq!(reader.next_message().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_length_delimited_write_prefixes_length() {
        let config = LinkConfig::new().with_framing(Framing::LengthDelimited);
        let mock = Builder::new().write(&[0, 0, 0, 3, b'a', b'b', b'c']).build();
        let (_reader, mut writer) = split_channel(Box::new(mock), &config);

        writer.write_message("abc").await.unwrap();
    }
}
