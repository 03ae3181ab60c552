use crate::Record;
use eyre::{
    eyre,
    Result,
};
use futures::{
    stream::{
        self,
        BoxStream,
    },
    StreamExt as _,
};
use std::{
    future::Future,
    path::Path,
    pin::Pin,
};
use tokio::{
    fs::{
        File,
        OpenOptions,
    },
    io::{
        AsyncWrite,
        AsyncWriteExt as _,
        BufWriter,
        Stdout,
    },
    sync::mpsc,
};

/// Downstream consumer of records. Delivery is at most once, a failed publish is not retried.
pub trait Sink: Send {
    fn publish(&mut self, record: Record) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    fn close(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Writes one JSON document per line.
pub struct JsonLinesSink<W> {
    writer: BufWriter<W>,
}

impl<W: AsyncWrite + Unpin + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
        }
    }
}

impl JsonLinesSink<Stdout> {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl JsonLinesSink<File> {
    /// Appends to `path`, creating it if needed.
    pub async fn append_to(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|err| eyre!("failed to open {}: {err}", path.display()))?;
        Ok(Self::new(file))
    }
}

impl<W: AsyncWrite + Unpin + Send> Sink for JsonLinesSink<W> {
    fn publish(&mut self, record: Record) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let mut line = serde_json::to_vec(&record)?;
            line.push(b'\n');
            self.writer.write_all(&line).await?;
            self.writer.flush().await?;
            Ok(())
        })
    }

    fn close(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.writer.flush().await?;
            Ok(())
        })
    }
}

/// Forwards records to an in-process receiver.
pub struct ChannelSink {
    tx: Option<mpsc::UnboundedSender<Record>>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Record>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }
}

impl Sink for ChannelSink {
    fn publish(&mut self, record: Record) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let sent = match &self.tx {
            Some(tx) => tx.send(record).map_err(|_| eyre!("record receiver is gone")),
            None => Err(eyre!("sink is closed")),
        };
        Box::pin(async move { sent })
    }

    /// Drops the sender so the receiver sees the end of the stream.
    fn close(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        self.tx = None;
        Box::pin(async { Ok(()) })
    }
}

/// Merges all worker streams into `sink` until every stream is closed. Returns the number of published records.
pub async fn publish_all(sink: &mut dyn Sink, receivers: Vec<mpsc::Receiver<Record>>) -> u64 {
    let streams: Vec<BoxStream<'static, Record>> = receivers
        .into_iter()
        .map(|rx| stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|record| (record, rx)) }).boxed())
        .collect();
    let mut merged = stream::select_all(streams);

    let mut published = 0;
    while let Some(record) = merged.next().await {
        match sink.publish(record).await {
            Ok(()) => published += 1,
            Err(err) => error!("failed to publish record: {err}"),
        }
    }
    published
}
