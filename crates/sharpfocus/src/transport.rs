//! The stdio transport: reader and writer threads around the LSP framing.
//!
//! Logging must only ever write to stderr; stdout carries the protocol.

use std::io::{self, BufRead, Read, Write};
use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};
use lsp_server::{Connection, Message};

/// Flags for recording and replaying the server's input stream, handy when
/// reproducing protocol-level bugs from an editor session.
#[derive(Debug, Clone, Default, clap::Parser)]
pub struct MirrorArgs {
    /// Record the input stream to a file while serving.
    #[clap(long, default_value = "", value_name = "FILE")]
    pub mirror: String,
    /// Serve from a previously recorded input stream instead of stdin.
    #[clap(long, default_value = "", value_name = "FILE")]
    pub replay: String,
}

/// Runs `f` over a connection backed by stdin and stdout, then waits for the
/// writer to drain.
pub fn with_stdio_transport(
    args: MirrorArgs,
    f: impl FnOnce(Connection) -> anyhow::Result<()>,
) -> anyhow::Result<()> {
    let input = move || -> io::Result<Box<dyn BufRead>> {
        if !args.replay.is_empty() {
            let file = std::fs::File::open(&args.replay)?;
            return Ok(Box::new(io::BufReader::new(file)));
        }
        if args.mirror.is_empty() {
            return Ok(Box::new(io::stdin().lock()));
        }
        let file = std::fs::File::create(&args.mirror)?;
        Ok(Box::new(MirrorWriter(
            io::stdin().lock(),
            file,
            std::sync::Once::new(),
        )))
    };
    let output = || io::stdout().lock();

    let (sender, receiver, io_threads) = io_transport(input, output)?;
    let connection = Connection { sender, receiver };

    f(connection)?;

    io_threads.join_write()?;
    Ok(())
}

/// Spawns the reader and writer threads over arbitrary byte streams.
pub fn io_transport<I: BufRead, O: Write>(
    input: impl FnOnce() -> io::Result<I> + Send + 'static,
    output: impl FnOnce() -> O + Send + 'static,
) -> anyhow::Result<(Sender<Message>, Receiver<Message>, IoThreads)> {
    let (writer_sender, writer_receiver) = bounded::<Message>(0);
    let writer = thread::spawn(move || {
        let mut output = output();
        let res = writer_receiver
            .into_iter()
            .try_for_each(|message| message.write(&mut output));
        log::info!("writer thread finished");
        res
    });

    let (reader_sender, reader_receiver) = bounded::<Message>(0);
    let reader = thread::spawn(move || {
        let mut input = input()?;
        while let Some(message) = Message::read(&mut input)? {
            let is_exit = matches!(&message, Message::Notification(n) if n.method == "exit");
            if reader_sender.send(message).is_err() {
                break;
            }
            if is_exit {
                break;
            }
        }
        log::info!("reader thread finished");
        Ok(())
    });

    let threads = IoThreads { reader, writer };
    Ok((writer_sender, reader_receiver, threads))
}

/// The transport's reader and writer threads.
pub struct IoThreads {
    reader: thread::JoinHandle<io::Result<()>>,
    writer: thread::JoinHandle<io::Result<()>>,
}

impl IoThreads {
    /// Waits for both threads to finish.
    pub fn join(self) -> io::Result<()> {
        match self.reader.join() {
            Ok(res) => res?,
            Err(payload) => std::panic::panic_any(payload),
        }
        match self.writer.join() {
            Ok(res) => res,
            Err(payload) => std::panic::panic_any(payload),
        }
    }

    /// Waits for the writer only; the reader may be blocked on a closed
    /// stdin and is left to the process teardown.
    pub fn join_write(self) -> io::Result<()> {
        match self.writer.join() {
            Ok(res) => res,
            Err(payload) => std::panic::panic_any(payload),
        }
    }
}

struct MirrorWriter<R: Read, W: Write>(R, W, std::sync::Once);

impl<R: Read, W: Write> Read for MirrorWriter<R, W> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.0.read(buf)?;
        if let Err(err) = self.1.write_all(&buf[..read]) {
            self.2.call_once(|| log::warn!("failed to write mirror: {err}"));
        }
        Ok(read)
    }
}

impl<R: BufRead, W: Write> BufRead for MirrorWriter<R, W> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.0.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        if let Ok(buf) = self.0.fill_buf() {
            let taken = amt.min(buf.len());
            if let Err(err) = self.1.write_all(&buf[..taken]) {
                self.2.call_once(|| log::warn!("failed to write mirror: {err}"));
            }
        }
        self.0.consume(amt);
    }
}
