//! Record stream I/O.
//!
//! Subcommands read JSONL or CSV record streams and JSON or TOML config
//! files, and write JSONL or CSV streams back out. Formats are detected
//! rather than declared: from the file extension when we have one, and
//! otherwise by peeking at the first byte, since pipelines usually feed us
//! through stdin. The async plumbing needed for that peek lives here so the
//! rest of the crate can stay oblivious to it.

use std::{pin::Pin, sync::Arc, task::Context};

use futures::{TryStreamExt, pin_mut, stream::StreamExt as _};
use peekable::tokio::AsyncPeekable;
use serde_json::Map;
use tokio::{
    fs::File,
    io::{
        AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt as _, AsyncWrite,
        AsyncWriteExt as _, BufReader, BufWriter, ReadBuf,
    },
};
use tokio_stream::wrappers::LinesStream;

use crate::{
    prelude::*,
    ui::{ProgressConfig, Ui},
};

use super::{BoxedStream, size_hint::KnownLenStreamExt};

/// An async reader that knows whether its input looks like JSON.
///
/// JSON and JSONL inputs start with `{`; everything else is treated as CSV
/// or TOML depending on context. When reading from a pipe we peek one byte
/// to decide, then hand back a reader that still yields the full input.
pub struct SniffingReader {
    /// Does the input look like JSON or JSONL?
    is_json_like: bool,

    /// Where the input came from, for error messages.
    source: String,

    /// The underlying reader. Pinned and boxed because peeking may have
    /// layered an [`AsyncPeekable`] underneath, and async readers must not
    /// move while polled.
    reader: Pin<Box<dyn AsyncBufRead + Unpin + Send + Sync + 'static>>,
}

impl SniffingReader {
    /// Wrap an existing reader, peeking one byte to sniff the format.
    pub async fn new_from_reader(
        source: String,
        reader: impl AsyncRead + Unpin + Send + Sync + 'static,
    ) -> Result<Self> {
        let reader = BufReader::new(reader);
        let mut peekable = AsyncPeekable::new(Box::new(reader));
        let mut first_byte = vec![0; 1];
        peekable.peek_exact(&mut first_byte).await?;
        Ok(Self {
            is_json_like: first_byte[0] == b'{',
            source,
            reader: Box::pin(BufReader::new(peekable)),
        })
    }

    /// Open a file, sniffing the format from its extension.
    pub async fn new_from_path(path: &Path) -> Result<Self> {
        let ext = path.extension().unwrap_or_default();
        let file = File::open(path)
            .await
            .with_context(|| format!("Failed to open file at path: {:?}", path))?;
        Ok(Self {
            is_json_like: ext == "json" || ext == "jsonl",
            source: path.to_string_lossy().into_owned(),
            reader: Box::pin(BufReader::new(file)),
        })
    }

    /// Open a file, or wrap standard input when no path is given.
    pub async fn new_from_path_or_stdin(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::new_from_path(path).await,
            None => Self::new_from_reader("stdin".to_owned(), tokio::io::stdin()).await,
        }
    }

    /// Does our input look like JSON or JSONL?
    pub fn is_json_like(&self) -> bool {
        self.is_json_like
    }
}

impl AsyncRead for SniffingReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        Pin::get_mut(self).reader.as_mut().poll_read(cx, buf)
    }
}

impl AsyncBufRead for SniffingReader {
    fn poll_fill_buf(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> std::task::Poll<std::io::Result<&[u8]>> {
        Pin::get_mut(self).reader.as_mut().poll_fill_buf(cx)
    }

    fn consume(self: Pin<&mut Self>, amt: usize) {
        Pin::get_mut(self).reader.as_mut().consume(amt)
    }
}

/// Read a JSON or TOML config file into any deserializable type.
pub async fn read_json_or_toml<T>(path: &Path) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let mut reader = SniffingReader::new_from_path(path).await?;
    // Read all at once because our parsing libraries don't do async I/O.
    let mut data = String::new();
    reader
        .read_to_string(&mut data)
        .await
        .with_context(|| format!("Failed to read file at path: {:?}", path))?;
    if reader.is_json_like() {
        serde_json::from_str(&data).with_context(|| {
            format!("Failed to parse JSON from file at path: {:?}", path)
        })
    } else {
        toml::from_str(&data).with_context(|| {
            format!("Failed to parse TOML from file at path: {:?}", path)
        })
    }
}

/// Count the records in a JSONL or CSV file, for progress reporting.
///
/// Returns a stream size hint. Inputs we can't count, like named pipes, get
/// an unbounded hint.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn count_jsonl_or_csv_records(
    ui: &Ui,
    path: &Path,
) -> Result<(usize, Option<usize>)> {
    if !path.is_file() {
        return Ok((0, None));
    }

    let spinner = ui.new_spinner(&ProgressConfig {
        emoji: "🧮",
        msg: "Counting input records",
        done_msg: "Counted input records",
    });

    let reader = SniffingReader::new_from_path_or_stdin(Some(path)).await?;
    let count = if reader.is_json_like() {
        LinesStream::new(reader.lines())
            .try_fold(0, |acc, _line| async move { Ok(acc + 1) })
            .await?
    } else {
        csv_async::AsyncReaderBuilder::new()
            .create_reader(reader)
            .into_byte_records()
            .try_fold(0, |acc, _record| async move { Ok(acc + 1) })
            .await?
    };
    spinner.finish_with_message(format!("Found {count} records"));
    Ok((count, Some(count)))
}

/// A stream of [`serde_json::Value`] values.
pub type JsonStream = BoxedStream<Result<Value>>;

/// Read JSONL or CSV records from a file or stdin, as a stream of JSON
/// values. CSV rows become objects keyed by the header row, with every cell
/// as a string; downstream parsing is expected to coerce them.
pub async fn read_jsonl_or_csv(ui: Ui, path: Option<&Path>) -> Result<JsonStream> {
    let len_hint = match path {
        Some(path) => count_jsonl_or_csv_records(&ui, path).await?,
        None => (0, None),
    };

    let reader = SniffingReader::new_from_path_or_stdin(path).await?;
    if reader.is_json_like() {
        read_jsonl_records(reader, len_hint)
    } else {
        read_csv_records(reader, len_hint).await
    }
}

/// Parse each line of the input as one JSON record.
fn read_jsonl_records(
    reader: SniffingReader,
    len_hint: (usize, Option<usize>),
) -> Result<JsonStream> {
    let source = Arc::new(reader.source.clone());
    let lines = LinesStream::new(reader.lines()).with_len_hint(len_hint);
    Ok(Box::pin(lines.then(move |line| {
        let source = source.clone();
        async move {
            let line = line?;
            serde_json::from_str(&line).with_context(|| {
                format!("Failed to parse JSON from line in {:?}: {:?}", source, line)
            })
        }
    })))
}

/// Parse the input as CSV with a header row.
async fn read_csv_records(
    reader: SniffingReader,
    len_hint: (usize, Option<usize>),
) -> Result<JsonStream> {
    let source = Arc::new(reader.source.clone());
    let mut reader = csv_async::AsyncReaderBuilder::new().create_reader(reader);
    let headers = Arc::new(
        reader
            .headers()
            .await
            .with_context(|| format!("Failed to read CSV headers from {:?}", source))?
            .to_owned(),
    );
    Ok(Box::pin(reader.into_records().with_len_hint(len_hint).then(
        move |record| {
            let source = source.clone();
            let headers = headers.clone();
            async move {
                let record = record.with_context(|| {
                    format!("Failed to read CSV record from {:?}", source)
                })?;
                let map: Map<String, Value> = headers
                    .iter()
                    .zip(record.iter())
                    .map(|(header, cell)| {
                        (header.to_owned(), Value::String(cell.to_owned()))
                    })
                    .collect();
                Ok(Value::Object(map))
            }
        },
    )))
}

/// Create an [`AsyncWrite`] for a file, or stdout when no path is given.
pub async fn create_writer(
    path: Option<&Path>,
) -> Result<Box<dyn AsyncWrite + Unpin + Send + Sync + 'static>> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .await
                .with_context(|| format!("Failed to create file at path: {:?}", path))?;
            Ok(Box::new(file))
        }
        None => Ok(Box::new(tokio::io::stdout())),
    }
}

/// Write a stream of JSON values as JSONL, to a file or stdout.
pub async fn write_output(path: Option<&Path>, stream: JsonStream) -> Result<()> {
    let mut writer = BufWriter::new(create_writer(path).await?);
    pin_mut!(stream);
    while let Some(record) = stream.next().await {
        let record = record?;
        let json = serde_json::to_string(&record).with_context(|| {
            format!("Failed to serialize JSON from record: {:?}", record)
        })?;
        writer
            .write_all(json.as_bytes())
            .await
            .context("Failed to write JSON to output")?;
        writer
            .write_all(b"\n")
            .await
            .context("Failed to write newline to output")?;
    }
    writer.flush().await.context("Failed to flush output")?;
    Ok(())
}

/// Write a stream of records as CSV, to a file or stdout.
pub async fn write_output_csv<T>(
    path: Option<&Path>,
    stream: BoxedStream<Result<T>>,
) -> Result<()>
where
    T: Serialize + Send + 'static,
{
    let mut writer = csv_async::AsyncSerializer::from_writer(create_writer(path).await?);
    pin_mut!(stream);
    while let Some(record) = stream.next().await {
        let record = record?;
        writer
            .serialize(&record)
            .await
            .context("Failed to write CSV record to output")?;
    }
    writer.flush().await.context("Failed to flush output")?;
    Ok(())
}
