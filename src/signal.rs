//! Cooperative stop signal for capture sessions.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub trait ShutdownCheck {
    fn should_stop(&self) -> bool;
}

/// Set once by Ctrl+C (or by hand); checked between frames.
#[derive(Debug, Clone)]
pub struct ShutdownFlag {
    flag: Arc<AtomicBool>,
}

impl ShutdownFlag {
    /// Creates the flag and installs a SIGINT handler that sets it.
    ///
    /// A second registration fails inside `ctrlc`; the flag still works
    /// through [`ShutdownFlag::trigger`].
    pub fn with_ctrlc() -> Self {
        let shutdown = Self::manual();
        let flag = shutdown.flag.clone();
        if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
            log::warn!("could not install Ctrl+C handler: {e}");
        }
        shutdown
    }

    pub fn manual() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }
}

impl ShutdownCheck for ShutdownFlag {
    fn should_stop(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Never asks to stop.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverShutdown;

impl ShutdownCheck for NeverShutdown {
    fn should_stop(&self) -> bool {
        false
    }
}
