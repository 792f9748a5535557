//! The process-wide console channel.
//!
//! Guest output (`print`, `println`) goes to whatever the channel points
//! at: the real stdout, or a capture buffer while a [`CaptureGuard`] is
//! alive. Dropping the guard puts the previous channel back, whether the
//! execution succeeded, failed or unwound.
//!
//! A capture is exclusive for the whole process: a second thread calling
//! [`capture`] blocks until the first guard drops. Captures on the same
//! thread nest.

use std::cell::Cell;
use std::io::Write;
use std::sync::{Mutex, MutexGuard, PoisonError};

enum Sink {
    Stdout,
    Buffer(String),
}

static CONSOLE: Mutex<Sink> = Mutex::new(Sink::Stdout);

/// Held by the outermost capture for its whole lifetime.
static EXCLUSIVE: Mutex<()> = Mutex::new(());

thread_local! {
    /// Captures held by the current thread.
    static DEPTH: Cell<usize> = const { Cell::new(0) };
}

fn console() -> MutexGuard<'static, Sink> {
    CONSOLE.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Write `text` to the current channel.
pub fn write(text: &str) {
    match &mut *console() {
        Sink::Stdout => {
            let mut out = std::io::stdout().lock();
            // Nothing sensible to do when the real stdout is gone.
            let _ = out.write_all(text.as_bytes());
            let _ = out.flush();
        }
        Sink::Buffer(buffer) => buffer.push_str(text),
    }
}

/// Whether the calling thread holds a capture.
pub fn is_captured() -> bool {
    DEPTH.with(|depth| depth.get() > 0)
}

/// Redirect the channel into a fresh buffer until the guard drops.
///
/// Blocks while another thread holds a capture.
pub fn capture() -> CaptureGuard {
    let exclusive = if is_captured() {
        None
    } else {
        Some(EXCLUSIVE.lock().unwrap_or_else(PoisonError::into_inner))
    };
    let previous = std::mem::replace(&mut *console(), Sink::Buffer(String::new()));
    DEPTH.with(|depth| depth.set(depth.get() + 1));
    CaptureGuard {
        previous: Some(previous),
        _exclusive: exclusive,
    }
}

/// Restores the previous channel on drop.
#[must_use = "output is only captured while the guard is alive"]
pub struct CaptureGuard {
    previous: Option<Sink>,
    // Released after `drop` has restored the channel.
    _exclusive: Option<MutexGuard<'static, ()>>,
}

impl CaptureGuard {
    /// Text captured so far.
    pub fn contents(&self) -> String {
        match &*console() {
            Sink::Buffer(buffer) => buffer.clone(),
            Sink::Stdout => String::new(),
        }
    }

    /// Stop capturing and return everything captured.
    pub fn finish(self) -> String {
        let captured = self.contents();
        drop(self);
        captured
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            *console() = previous;
        }
        DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel_is_stdout() -> bool {
        let _exclusive = EXCLUSIVE.lock().unwrap_or_else(PoisonError::into_inner);
        matches!(&*console(), Sink::Stdout)
    }

    #[test]
    fn test_capture_lifecycle() {
        let guard = capture();
        assert!(is_captured());
        write("hello ");
        write("world");
        assert_eq!(guard.contents(), "hello world");
        assert_eq!(guard.finish(), "hello world");
        assert!(!is_captured());

        let outer = capture();
        write("a");
        {
            let inner = capture();
            write("b");
            assert_eq!(inner.contents(), "b");
        }
        assert!(is_captured());
        write("c");
        assert_eq!(outer.finish(), "ac");
        assert!(!is_captured());

        let result = std::panic::catch_unwind(|| {
            let _guard = capture();
            panic!("boom");
        });
        assert!(result.is_err());
        assert!(!is_captured());
        assert!(channel_is_stdout());
    }

    #[test]
    fn test_concurrent_captures_keep_their_own_output() {
        for _ in 0..20 {
            let handles: Vec<_> = (0..4)
                .map(|digit| {
                    std::thread::spawn(move || {
                        let guard = capture();
                        let text = digit.to_string();
                        for _ in 0..200 {
                            write(&text);
                        }
                        (text.repeat(200), guard.finish())
                    })
                })
                .collect();
            for handle in handles {
                let (expected, captured) = handle.join().unwrap();
                assert_eq!(captured, expected);
            }
        }
        assert!(channel_is_stdout());
    }
}
