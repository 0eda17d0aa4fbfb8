//! Non-blocking writer backed by a dedicated worker thread
//!
//! Formatted records are handed to the worker over a bounded channel so the
//! emitting thread never waits on file I/O. The [`WorkerGuard`] returned with
//! the writer owns the thread: dropping it drains the queue, flushes the
//! underlying writer, and joins the thread.

use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{
    bounded, Receiver, RecvError, SendTimeoutError, Sender, TryRecvError, TrySendError,
};
use tracing_subscriber::fmt::MakeWriter;

/// Default number of records the queue holds before writers block (or drop)
pub const DEFAULT_BUFFERED_LINES_LIMIT: usize = 128_000;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug)]
enum Message {
    Record(Vec<u8>),
    Shutdown,
}

/// Writer handle that enqueues records for the worker thread
#[derive(Debug, Clone)]
pub struct NonBlocking {
    sender: Sender<Message>,
    dropped: Arc<AtomicUsize>,
    lossy: bool,
}

impl NonBlocking {
    /// Records discarded because the queue was full (lossy mode only)
    pub fn dropped_lines(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

fn worker_gone() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "log writer thread has shut down")
}

impl Write for NonBlocking {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let message = Message::Record(buf.to_vec());
        if self.lossy {
            match self.sender.try_send(message) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                }
                Err(TrySendError::Disconnected(_)) => return Err(worker_gone()),
            }
        } else {
            self.sender.send(message).map_err(|_| worker_gone())?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for NonBlocking {
    type Writer = NonBlocking;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Configures and spawns a [`NonBlocking`] writer
#[derive(Debug)]
pub struct NonBlockingBuilder {
    buffered_lines_limit: usize,
    lossy: bool,
    thread_name: String,
}

impl Default for NonBlockingBuilder {
    fn default() -> Self {
        Self {
            buffered_lines_limit: DEFAULT_BUFFERED_LINES_LIMIT,
            lossy: false,
            thread_name: "valuecell-log-writer".to_string(),
        }
    }
}

impl NonBlockingBuilder {
    /// Capacity of the record queue
    pub fn buffered_lines_limit(mut self, limit: usize) -> Self {
        self.buffered_lines_limit = limit;
        self
    }

    /// Drop records instead of blocking when the queue is full
    pub fn lossy(mut self, lossy: bool) -> Self {
        self.lossy = lossy;
        self
    }

    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Spawn the worker thread that owns `writer`
    pub fn finish<T: Write + Send + 'static>(
        self,
        writer: T,
    ) -> io::Result<(NonBlocking, WorkerGuard)> {
        let (sender, receiver) = bounded(self.buffered_lines_limit);
        let worker = Worker { writer, receiver };
        let handle = worker.spawn(self.thread_name)?;

        let non_blocking = NonBlocking {
            sender: sender.clone(),
            dropped: Arc::new(AtomicUsize::new(0)),
            lossy: self.lossy,
        };
        let guard = WorkerGuard {
            handle: Some(handle),
            sender,
        };
        Ok((non_blocking, guard))
    }
}

/// Flushes and stops the worker thread when dropped
#[derive(Debug)]
pub struct WorkerGuard {
    handle: Option<JoinHandle<()>>,
    sender: Sender<Message>,
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        match self.sender.send_timeout(Message::Shutdown, SHUTDOWN_TIMEOUT) {
            Ok(()) => {
                if let Some(handle) = self.handle.take() {
                    if handle.join().is_err() {
                        eprintln!("log writer thread panicked during shutdown");
                    }
                }
            }
            Err(SendTimeoutError::Disconnected(_)) => {}
            Err(SendTimeoutError::Timeout(_)) => {
                eprintln!("timed out sending shutdown signal to log writer thread");
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerState {
    Empty,
    Disconnected,
    Continue,
    Shutdown,
}

struct Worker<T: Write + Send + 'static> {
    writer: T,
    receiver: Receiver<Message>,
}

impl<T: Write + Send + 'static> Worker<T> {
    fn handle(&mut self, message: Message) -> io::Result<WorkerState> {
        match message {
            Message::Record(record) => {
                self.writer.write_all(&record)?;
                Ok(WorkerState::Continue)
            }
            Message::Shutdown => Ok(WorkerState::Shutdown),
        }
    }

    /// Block for one record, then drain whatever else is queued
    fn work(&mut self) -> io::Result<WorkerState> {
        let mut state = match self.receiver.recv() {
            Ok(message) => self.handle(message)?,
            Err(RecvError) => WorkerState::Disconnected,
        };

        while state == WorkerState::Continue {
            state = match self.receiver.try_recv() {
                Ok(message) => self.handle(message)?,
                Err(TryRecvError::Empty) => WorkerState::Empty,
                Err(TryRecvError::Disconnected) => WorkerState::Disconnected,
            };
        }

        self.writer.flush()?;
        Ok(state)
    }

    fn spawn(mut self, name: String) -> io::Result<JoinHandle<()>> {
        std::thread::Builder::new().name(name).spawn(move || {
            loop {
                match self.work() {
                    Ok(WorkerState::Continue) | Ok(WorkerState::Empty) => {}
                    Ok(WorkerState::Shutdown) | Ok(WorkerState::Disconnected) => break,
                    Err(err) => eprintln!("failed to write log record: {err}"),
                }
            }
            if let Err(err) = self.writer.flush() {
                eprintln!("failed to flush log writer: {err}");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[test]
    fn test_guard_drop_flushes_all_records() {
        let buffer = SharedBuffer::default();
        let (mut writer, guard) = NonBlockingBuilder::default()
            .finish(buffer.clone())
            .unwrap();

        for i in 0..500 {
            writeln!(writer, "record {}", i).unwrap();
        }
        drop(guard);

        let contents = buffer.contents();
        assert_eq!(contents.lines().count(), 500);
        assert!(contents.starts_with("record 0\n"));
        assert!(contents.ends_with("record 499\n"));
    }

    #[test]
    fn test_write_after_shutdown_fails() {
        let (mut writer, guard) = NonBlockingBuilder::default()
            .finish(SharedBuffer::default())
            .unwrap();
        drop(guard);

        let err = writer.write_all(b"too late\n").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_worker_thread_is_named() {
        struct ThreadName(Arc<Mutex<Option<String>>>);

        impl Write for ThreadName {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                *self.0.lock().unwrap() = std::thread::current().name().map(str::to_string);
                Ok(buf.len())
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let seen = Arc::new(Mutex::new(None));
        let (mut writer, guard) = NonBlockingBuilder::default()
            .thread_name("valuecell-log-test")
            .finish(ThreadName(Arc::clone(&seen)))
            .unwrap();
        writer.write_all(b"x").unwrap();
        drop(guard);

        assert_eq!(seen.lock().unwrap().as_deref(), Some("valuecell-log-test"));
    }

    #[test]
    fn test_make_writer_shares_queue() {
        let buffer = SharedBuffer::default();
        let (writer, guard) = NonBlockingBuilder::default()
            .lossy(true)
            .finish(buffer.clone())
            .unwrap();

        writer.make_writer().write_all(b"one\n").unwrap();
        writer.make_writer().write_all(b"two\n").unwrap();
        drop(guard);

        assert_eq!(buffer.contents(), "one\ntwo\n");
        assert_eq!(writer.dropped_lines(), 0);
    }
}
