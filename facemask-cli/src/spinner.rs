//! Terminal progress spinner.
//!
//! Runs on its own thread and redraws on stderr so piped stdout stays clean.
//! The handle stops the spinner on drop, clearing the line it occupied.

use std::io::{self, Write};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

const FRAMES: [char; 10] = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];
const FRAME_INTERVAL: Duration = Duration::from_millis(100);

/// A running spinner; dropping it stops the animation.
pub struct Spinner {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Spinner {
    /// Start spinning with `message` next to the animation frame.
    pub fn start(message: &str) -> Self {
        let message = message.to_owned();
        let (stop, stopped) = mpsc::channel::<()>();

        let handle = std::thread::spawn(move || {
            let mut frames = FRAMES.iter().cycle();
            loop {
                match stopped.recv_timeout(FRAME_INTERVAL) {
                    Err(RecvTimeoutError::Timeout) => {
                        let frame = frames.next().unwrap_or(&FRAMES[0]);
                        eprint!("\r{frame} {message}");
                        let _ = io::stderr().flush();
                    }
                    // Stop requested or the handle went away.
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            // Clear the spinner line.
            eprint!("\r{}\r", " ".repeat(message.chars().count() + 2));
            let _ = io::stderr().flush();
        });

        Self {
            stop: Some(stop),
            handle: Some(handle),
        }
    }

    /// Stop the animation and wait for the line to be cleared.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_joins_the_worker() {
        let spinner = Spinner::start("working");
        std::thread::sleep(Duration::from_millis(250));
        spinner.stop();
    }

    #[test]
    fn drop_is_equivalent_to_stop() {
        {
            let _spinner = Spinner::start("working");
            std::thread::sleep(Duration::from_millis(50));
        }
    }
}
