//! Periodic workers used to drive the interpreter at a fixed rate.
use std::{
    sync::{
        mpsc::{self, RecvTimeoutError, SyncSender},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

/// Something that calls a callback over and over again, with the given
/// interval in between.
pub trait TimedWorker {
    fn new() -> Self;

    /// Will start calling the callback every `interval`, a running worker
    /// is stopped first.
    fn start<T>(&mut self, callback: T, interval: Duration)
    where
        T: Send + FnMut() + 'static;

    fn stop(&mut self);

    fn is_alive(&self) -> bool;
}

/// Is the internal worker, that exists on the
/// second thread.
#[derive(Debug)]
pub struct Worker {
    /// Contains the actuall thread, that is running.
    thread: Option<JoinHandle<()>>,
    /// Contains the sync sender used to gracefull shutdown the thread.
    shutdown: Option<SyncSender<()>>,
    /// Counts the actuall threads used (this is never more then 2, but
    /// is simple to use.) It uses an ```()``` so that it doesn't use
    /// up too much memory.
    alive: Arc<()>,
}

impl TimedWorker for Worker {
    /// Will initialize the new worker.
    fn new() -> Self {
        Self {
            thread: None,
            shutdown: None,
            alive: Arc::new(()),
        }
    }

    /// Will start the worker that will run the callback function
    /// all duration.
    /// Attention the timer assumes the callback will finish
    /// calculation faster then the interval.
    fn start<T>(&mut self, mut callback: T, interval: Duration)
    where
        T: Send + FnMut() + 'static,
    {
        self.stop();

        let (send, recv) = mpsc::sync_channel::<()>(1);
        let alive = self.alive.clone();
        let thread = thread::spawn(move || {
            // only held to count the running threads
            let _alive = alive;
            let mut timeout = interval;
            loop {
                match recv.recv_timeout(timeout) {
                    Err(RecvTimeoutError::Timeout) => {
                        let start = Instant::now();

                        callback();

                        // make sure there the system will at most wait the interval
                        timeout = interval.saturating_sub(start.elapsed());
                    }
                    Ok(_) | Err(_) => break, // shutdown
                }
            }
        });

        log::debug!("Started a worker with an interval of {:?}", interval);

        self.thread = Some(thread);
        self.shutdown = Some(send);
    }

    /// Will stop the worker.
    fn stop(&mut self) {
        // Will stop the worker, in two steps one by sending an empty message
        // and second by droping the only sender for the given receiver.
        if let Some(sender) = self.shutdown.take() {
            // a failed send means the thread is already gone
            let _ = sender.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("The worker thread panicked");
            }
        }
    }

    /// Checks if the thread is alive.
    fn is_alive(&self) -> bool {
        Arc::strong_count(&self.alive) > 1
    }
}

impl Drop for Worker {
    /// Will drop the worker
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_worker() {
        let counter = Arc::new(AtomicUsize::new(0));
        let ccounter = counter.clone();

        let mut worker = Worker::new();
        assert!(!worker.is_alive());

        worker.start(
            move || {
                ccounter.fetch_add(1, Ordering::SeqCst);
            },
            Duration::from_millis(5),
        );
        assert!(worker.is_alive());

        std::thread::sleep(Duration::from_millis(200));
        worker.stop();
        assert!(!worker.is_alive());

        let count = counter.load(Ordering::SeqCst);
        assert!(count > 0);

        // nothing runs after the stop
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(counter.load(Ordering::SeqCst), count);
    }

    #[test]
    fn test_restart_replaces_the_thread() {
        let counter = Arc::new(AtomicUsize::new(0));

        let mut worker = Worker::new();
        for _ in 0..2 {
            let ccounter = counter.clone();
            worker.start(
                move || {
                    ccounter.fetch_add(1, Ordering::SeqCst);
                },
                Duration::from_millis(5),
            );
        }

        // only a single thread holds the marker
        assert_eq!(Arc::strong_count(&worker.alive), 2);
        worker.stop();
        assert!(!worker.is_alive());
    }

    #[test]
    fn test_stop_without_start() {
        let mut worker = Worker::new();
        worker.stop();
        assert!(!worker.is_alive());
    }
}
