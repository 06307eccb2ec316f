//! Single-threaded async file I/O worker: every blocking `pread`/`pwrite`
//! call goes through one dedicated OS thread so the caller's executor
//! threads never block on disk I/O, grounded on
//! `original_source/include/voxen/common/async_file_io.hpp`.
//!
//! Requests are queued as closures; results come back over a `oneshot`
//! channel the caller awaits. A single worker (rather than `spawn_blocking`'s
//! unbounded pool) matches the original's design of serializing disk access
//! through one queue to keep seek patterns predictable.

use crate::os::file::File;
use crate::util::error::IoError;
use crossbeam_channel::{Receiver, Sender};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::oneshot;

type Job = Box<dyn FnOnce() + Send>;

/// Owns the worker thread. Dropping the last handle stops the worker once
/// its queue drains.
pub struct AsyncFileIo {
    jobs: Sender<Job>,
    _worker: std::thread::JoinHandle<()>,
}

impl AsyncFileIo {
    pub fn new() -> Arc<Self> {
        let (jobs, receiver): (Sender<Job>, Receiver<Job>) = crossbeam_channel::unbounded();
        let worker = std::thread::Builder::new()
            .name("async-file-io".into())
            .spawn(move || {
                for job in receiver {
                    job();
                }
            })
            .expect("failed to spawn async file I/O worker thread");
        Arc::new(Self { jobs, _worker: worker })
    }

    fn submit<T, F>(&self, f: F) -> oneshot::Receiver<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (reply, receiver) = oneshot::channel();
        let job: Job = Box::new(move || {
            let _ = reply.send(f());
        });
        // An error here means the worker thread died; the caller observes
        // it as a dropped oneshot sender below.
        let _ = self.jobs.send(job);
        receiver
    }

    pub async fn open(self: &Arc<Self>, path: PathBuf, flags: crate::os::file::OpenFlags) -> Result<File, IoError> {
        let receiver = self.submit(move || File::open(&path, flags));
        receiver.await.map_err(|_| IoError::Unknown("async file I/O worker terminated".into()))?
    }

    pub async fn pread(self: &Arc<Self>, file: Arc<File>, offset: u64, len: usize) -> Result<Vec<u8>, IoError> {
        let receiver = self.submit(move || {
            let mut buf = vec![0u8; len];
            let n = file.pread(&mut buf, offset)?;
            buf.truncate(n);
            Ok(buf)
        });
        receiver.await.map_err(|_| IoError::Unknown("async file I/O worker terminated".into()))?
    }

    pub async fn pwrite(self: &Arc<Self>, file: Arc<File>, offset: u64, data: Vec<u8>) -> Result<usize, IoError> {
        let receiver = self.submit(move || file.pwrite(&data, offset));
        receiver.await.map_err(|_| IoError::Unknown("async file I/O worker terminated".into()))?
    }
}
