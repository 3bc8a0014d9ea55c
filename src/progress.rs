//! One-way progress reporting for the build pipeline.
//!
//! Callbacks observe the build; nothing they do feeds back into it.

/// Receiver of build status updates.
pub trait Progress {
    /// A new build stage started.
    fn update_status(&self, status: &str);

    /// Fractional progress within a stage.
    fn update_progress(&self, title: &str, value: usize, total: usize) {
        let _ = (title, value, total);
    }
}

/// Discards all updates.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn update_status(&self, _status: &str) {}
}

/// Forwards updates to the `log` facade at `info` level.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogProgress;

impl Progress for LogProgress {
    fn update_status(&self, status: &str) {
        log::info!("{status}");
    }

    fn update_progress(&self, title: &str, value: usize, total: usize) {
        let percent = if total == 0 { 100 } else { value * 100 / total };
        log::info!("{title} {percent}%");
    }
}

impl<F: Fn(&str)> Progress for F {
    fn update_status(&self, status: &str) {
        self(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn closures_receive_status() {
        let seen = RefCell::new(Vec::new());
        let p = |s: &str| seen.borrow_mut().push(s.to_owned());
        p.update_status("a");
        p.update_progress("ignored", 1, 2);
        p.update_status("b");
        assert_eq!(*seen.borrow(), vec!["a", "b"]);
    }
}
