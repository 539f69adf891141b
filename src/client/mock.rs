//! In-memory stream for exercising the client without a server

use std::{
    collections::VecDeque,
    io::{self, Cursor, Read, Write},
    sync::{Arc, Mutex, MutexGuard},
};

/// Data waiting to be read, one segment per server write
type Segments = VecDeque<Cursor<Vec<u8>>>;

/// A stream reading scripted server replies and recording client writes
///
/// A single read never crosses from one segment into the next, the way a
/// server's separate writes would arrive in separate reads. Clones share their
/// buffers, so a test can keep a handle on what the connection wrote after
/// giving it a clone.
#[derive(Clone, Debug, Default)]
pub struct MockStream {
    reader: Arc<Mutex<Segments>>,
    writer: Arc<Mutex<Vec<u8>>>,
}

impl MockStream {
    /// An empty stream
    pub fn new() -> MockStream {
        MockStream::default()
    }

    /// A stream that will read `vec`, possibly all at once
    pub fn with_vec(vec: Vec<u8>) -> MockStream {
        MockStream::with_replies([vec])
    }

    /// A stream that will read each reply in its own segment
    pub fn with_replies<I>(replies: I) -> MockStream
    where
        I: IntoIterator,
        I::Item: Into<Vec<u8>>,
    {
        let segments = replies
            .into_iter()
            .map(|reply| Cursor::new(reply.into()))
            .collect();
        MockStream {
            reader: Arc::new(Mutex::new(segments)),
            writer: Arc::default(),
        }
    }

    /// Takes everything written so far
    pub fn take_vec(&mut self) -> Vec<u8> {
        std::mem::take(&mut *lock(&self.writer))
    }

    /// Replaces the data left to read
    pub fn next_vec(&mut self, vec: &[u8]) {
        let mut segments = lock(&self.reader);
        segments.clear();
        segments.push_back(Cursor::new(vec.to_vec()));
    }
}

// A poisoned buffer is still a valid buffer
fn lock<T>(buffer: &Mutex<T>) -> MutexGuard<'_, T> {
    buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Write for MockStream {
    fn write(&mut self, msg: &[u8]) -> io::Result<usize> {
        lock(&self.writer).write(msg)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut segments = lock(&self.reader);
        while let Some(segment) = segments.front_mut() {
            let read = segment.read(buf)?;
            if read > 0 || buf.is_empty() {
                return Ok(read);
            }
            segments.pop_front();
        }
        Ok(0)
    }
}
