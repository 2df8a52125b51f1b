//! One poll cycle: fetch, parse, reassign slots, translate.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, error, instrument, warn};

use crate::error::StatusError;
use crate::fetcher::StatusCommand;
use crate::identity::{self, IdentityMap};
use crate::status::{self, Snapshot};
use crate::translate::{translate, Measurement, UP};

/// Outcome of [`Collector::poll`].
#[derive(Debug)]
pub struct Poll {
    /// Always starts with `passenger_up`. A failed poll carries nothing else.
    pub measurements: Vec<Measurement>,
    pub error: Option<StatusError>,
    pub duration: Duration,
    /// Processes seen in the snapshot, zero on failure.
    pub processes: usize,
    /// Slots assigned outside `[0, max_process_count)` by this poll.
    pub overflow: usize,
    /// The decoded document, kept for callers that want to show more than
    /// the measurements.
    pub snapshot: Option<Snapshot>,
}

impl Poll {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Owns the status command and the slot assignment that persists between
/// polls.
pub struct Collector {
    command: StatusCommand,
    identities: Mutex<IdentityMap>,
}

impl Collector {
    pub fn new(command: StatusCommand) -> Self {
        Self {
            command,
            identities: Mutex::new(IdentityMap::new()),
        }
    }

    pub fn command(&self) -> &StatusCommand {
        &self.command
    }

    /// Copy of the current slot assignment.
    pub async fn identities(&self) -> IdentityMap {
        self.identities.lock().await.clone()
    }

    /// Runs one poll. Polls are serialised on the slot assignment, which is
    /// only replaced when the status document was fetched and parsed.
    #[instrument(skip(self), fields(program = %self.command.program()))]
    pub async fn poll(&self) -> Poll {
        let mut identities = self.identities.lock().await;
        let start = Instant::now();

        let snapshot = match self.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("Status poll failed: {}", e);
                return Poll {
                    measurements: vec![Measurement::new(&UP, 0.0, vec![])],
                    error: Some(e),
                    duration: start.elapsed(),
                    processes: 0,
                    overflow: 0,
                    snapshot: None,
                };
            }
        };

        let capacity = usize::try_from(snapshot.max_process_count).unwrap_or(usize::MAX);
        let pids = snapshot.processes().map(|p| p.pid.as_str());
        let updated = identity::update(&identities, pids, capacity);

        let overflow = updated.overflow_count(capacity);
        if overflow > 0 {
            warn!(
                "{} process(es) assigned slots beyond max {}",
                overflow, capacity
            );
        }
        *identities = updated;

        let mut measurements = vec![Measurement::new(&UP, 1.0, vec![])];
        measurements.extend(translate(&snapshot, &identities));

        let processes = snapshot.processes().count();
        debug!(
            "Poll finished: version={} groups={} processes={} slots={}",
            snapshot.version,
            snapshot.groups.len(),
            processes,
            identities.len()
        );

        Poll {
            measurements,
            error: None,
            duration: start.elapsed(),
            processes,
            overflow,
            snapshot: Some(snapshot),
        }
    }

    /// Fetches and parses one status document without touching the slot
    /// assignment.
    pub async fn snapshot(&self) -> Result<Snapshot, StatusError> {
        let raw = self.command.fetch().await?;
        Ok(status::parse(&raw)?)
    }
}
