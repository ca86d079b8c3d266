//! Process-wide count of open channels.
//!
//! Every channel registers its kind when it opens and unregisters when it
//! closes (explicitly or on drop). [`shutdown_report`] lists whatever is
//! still open, which is useful as a leak check before process exit.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::kind::ChannelKind;

static OPEN: [AtomicUsize; ChannelKind::ALL.len()] =
    [const { AtomicUsize::new(0) }; ChannelKind::ALL.len()];

pub(crate) fn register(kind: ChannelKind) {
    OPEN[kind.index()].fetch_add(1, Ordering::Relaxed);
    tracing::debug!(%kind, "channel opened");
}

pub(crate) fn unregister(kind: ChannelKind) {
    OPEN[kind.index()].fetch_sub(1, Ordering::Relaxed);
    tracing::debug!(%kind, "channel closed");
}

/// Number of channels of `kind` currently open in this process.
pub fn open_channels(kind: ChannelKind) -> usize {
    OPEN[kind.index()].load(Ordering::Relaxed)
}

/// Channels still open when [`shutdown_report`] was called.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Open channel count per kind, omitting kinds with none open.
    pub survivors: Vec<(ChannelKind, usize)>,
}

impl ShutdownReport {
    /// Whether every channel has been closed.
    pub fn is_clean(&self) -> bool {
        self.survivors.is_empty()
    }

    /// Total number of open channels.
    pub fn total(&self) -> usize {
        self.survivors.iter().map(|&(_, n)| n).sum()
    }
}

impl fmt::Display for ShutdownReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_clean() {
            return write!(f, "no open channels");
        }
        write!(f, "{} open channel(s):", self.total())?;
        for (kind, n) in &self.survivors {
            write!(f, " {kind}={n}")?;
        }
        Ok(())
    }
}

/// Snapshot the registry, logging a warning if anything is still open.
pub fn shutdown_report() -> ShutdownReport {
    let survivors: Vec<_> = ChannelKind::ALL
        .into_iter()
        .map(|kind| (kind, open_channels(kind)))
        .filter(|&(_, n)| n > 0)
        .collect();
    let report = ShutdownReport { survivors };
    if !report.is_clean() {
        tracing::warn!(%report, "channels left open at shutdown");
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_formatting() {
        assert_eq!(ShutdownReport::default().to_string(), "no open channels");
        let report = ShutdownReport {
            survivors: vec![(ChannelKind::Disk, 2), (ChannelKind::Dock, 1)],
        };
        assert_eq!(report.total(), 3);
        assert_eq!(report.to_string(), "3 open channel(s): disk=2 dock=1");
    }

    #[test]
    fn undefined_kind_is_never_registered() {
        assert_eq!(open_channels(ChannelKind::Undefined), 0);
    }
}
