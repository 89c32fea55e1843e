use std::net::SocketAddr;
use std::sync::Arc;

use artisan_engine::Reply;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::bytes::BytesMut;
use tokio_util::codec::{Decoder, FramedRead, LinesCodec, LinesCodecError};

use crate::commands::{Dispatcher, Request};

/// Longest request line accepted, newline excluded.
pub const MAX_REQUEST_BYTES: usize = 64 * 1024;

/// Requests read ahead of the reply writer on one connection.
const MAX_IN_FLIGHT: usize = 32;

/// Newline-delimited JSON: one `Request` per line in, one `Reply` per line out.
pub async fn serve(addr: SocketAddr, dispatcher: Arc<Dispatcher>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening for commands");
    run(listener, dispatcher).await
}

pub async fn run(listener: TcpListener, dispatcher: Arc<Dispatcher>) -> anyhow::Result<()> {
    loop {
        let (socket, peer) = listener.accept().await?;
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_conn(socket, dispatcher).await {
                tracing::debug!(%peer, error = ?err, "connection closed");
            }
        });
    }
}

enum Frame {
    Line(String),
    TooLong,
}

/// `LinesCodec` that reports an over-long line as a frame, so the
/// connection keeps going once the rest of that line is discarded.
struct RequestLines(LinesCodec);

impl RequestLines {
    fn new() -> Self {
        Self(LinesCodec::new_with_max_length(MAX_REQUEST_BYTES))
    }

    fn frame(decoded: Result<Option<String>, LinesCodecError>) -> Result<Option<Frame>, LinesCodecError> {
        match decoded {
            Ok(line) => Ok(line.map(Frame::Line)),
            Err(LinesCodecError::MaxLineLengthExceeded) => Ok(Some(Frame::TooLong)),
            Err(e) => Err(e),
        }
    }
}

impl Decoder for RequestLines {
    type Item = Frame;
    type Error = LinesCodecError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, LinesCodecError> {
        Self::frame(self.0.decode(buf))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, LinesCodecError> {
        Self::frame(self.0.decode_eof(buf))
    }
}

/// Each request runs in its own task. Replies are written in request order.
async fn handle_conn(socket: TcpStream, dispatcher: Arc<Dispatcher>) -> anyhow::Result<()> {
    let (read, write) = socket.into_split();
    let (pending, replies) = mpsc::channel(MAX_IN_FLIGHT);
    let writer = tokio::spawn(write_replies(write, replies));

    let mut frames = FramedRead::new(read, RequestLines::new());
    let mut read_result = Ok(());
    while let Some(frame) = frames.next().await {
        let task = match frame {
            Ok(Frame::Line(line)) if line.trim().is_empty() => continue,
            Ok(Frame::Line(line)) => {
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move { answer(&dispatcher, &line).await })
            }
            Ok(Frame::TooLong) => tokio::spawn(std::future::ready(Reply::ephemeral(format!(
                "Request too long: limit is {MAX_REQUEST_BYTES} bytes"
            )))),
            Err(e) => {
                read_result = Err(e);
                break;
            }
        };
        if pending.send(task).await.is_err() {
            break;
        }
    }
    drop(pending);

    writer.await??;
    Ok(read_result?)
}

async fn answer(dispatcher: &Dispatcher, line: &str) -> Reply {
    match serde_json::from_str::<Request>(line) {
        Ok(request) => dispatcher.handle(request).await,
        Err(e) => Reply::ephemeral(format!("Malformed request: {e}")),
    }
}

async fn write_replies(
    mut write: OwnedWriteHalf,
    mut replies: mpsc::Receiver<JoinHandle<Reply>>,
) -> anyhow::Result<()> {
    while let Some(task) = replies.recv().await {
        let reply = match task.await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(error = %e, "request task failed");
                Reply::ephemeral("An error occurred while processing your command.")
            }
        };
        let mut out = serde_json::to_vec(&reply)?;
        out.push(b'\n');
        write.write_all(&out).await?;
    }
    Ok(())
}
