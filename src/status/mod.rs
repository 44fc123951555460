use owo_colors::OwoColorize;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Progress and status reporting for batch operations
pub trait ProgressSink: Send + Sync {
    /// Start a new progress run with `total` expected ticks
    fn begin(&self, total: usize);

    fn log(&self, message: &str, level: LogLevel);

    /// One unit of work finished
    fn tick(&self);
}

/// Status line on stderr
pub struct ConsoleStatus {
    total: AtomicUsize,
    done: AtomicUsize,
    use_colors: bool,
}

impl ConsoleStatus {
    pub fn new(use_colors: bool) -> Self {
        Self {
            total: AtomicUsize::new(0),
            done: AtomicUsize::new(0),
            use_colors,
        }
    }

    pub fn completed(&self) -> usize {
        self.done.load(Ordering::SeqCst)
    }
}

impl ProgressSink for ConsoleStatus {
    fn begin(&self, total: usize) {
        self.total.store(total, Ordering::SeqCst);
        self.done.store(0, Ordering::SeqCst);
    }

    fn log(&self, message: &str, level: LogLevel) {
        if !self.use_colors {
            eprintln!("{}", message);
            return;
        }
        match level {
            LogLevel::Info => eprintln!("{}", message),
            LogLevel::Success => eprintln!("{}", message.green()),
            LogLevel::Warning => eprintln!("{}", message.yellow()),
            LogLevel::Error => eprintln!("{}", message.red()),
        }
    }

    fn tick(&self) {
        let done = self.done.fetch_add(1, Ordering::SeqCst) + 1;
        let total = self.total.load(Ordering::SeqCst);
        let line = format!("[{}/{}]", done, total);
        if self.use_colors {
            eprintln!("{}", line.dimmed());
        } else {
            eprintln!("{}", line);
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Sink that records everything it is told
    #[derive(Default)]
    pub struct RecordingSink {
        pub total: AtomicUsize,
        pub ticks: AtomicUsize,
        pub messages: Mutex<Vec<(String, LogLevel)>>,
    }

    impl RecordingSink {
        pub fn ticks(&self) -> usize {
            self.ticks.load(Ordering::SeqCst)
        }

        pub fn total(&self) -> usize {
            self.total.load(Ordering::SeqCst)
        }

        pub fn messages_at(&self, level: LogLevel) -> Vec<String> {
            self.messages
                .lock()
                .unwrap()
                .iter()
                .filter(|(_, l)| *l == level)
                .map(|(m, _)| m.clone())
                .collect()
        }
    }

    impl ProgressSink for RecordingSink {
        fn begin(&self, total: usize) {
            self.total.store(total, Ordering::SeqCst);
            self.ticks.store(0, Ordering::SeqCst);
        }

        fn log(&self, message: &str, level: LogLevel) {
            self.messages.lock().unwrap().push((message.to_string(), level));
        }

        fn tick(&self) {
            self.ticks.fetch_add(1, Ordering::SeqCst);
        }
    }
}
