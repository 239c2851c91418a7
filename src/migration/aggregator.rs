//! Folding the engine's event stream into a single [`StackState`].
//!
//! The stream must end with an explicit completion marker. Any diagnostic,
//! whatever its severity, fails the run and nothing is persisted.

use crate::error::{EnginePhase, MigrateError, ProtocolError, Result, SnapshotMap};
use crate::migration::engine::EventStream;
use crate::types::{AppliedChange, MigrationEvent, StackState, StreamFrame};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What to do when a later event writes a key an earlier event already wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateKeyPolicy {
    /// Last write wins.
    #[default]
    Overwrite,
    /// Fail the run with a protocol error.
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatorState {
    Open,
    Closed(Outcome),
}

/// Folds the engine's event stream into a [`StackState`].
///
/// The snapshot under construction is owned here and dropped the moment the
/// run fails, so a failed run can never hand out partial state.
#[derive(Debug)]
pub struct EventAggregator {
    policy: DuplicateKeyPolicy,
    state: AggregatorState,
    snapshot: Option<StackState>,
    events_applied: usize,
}

impl EventAggregator {
    pub fn new(policy: DuplicateKeyPolicy) -> Self {
        Self {
            policy,
            state: AggregatorState::Open,
            snapshot: Some(StackState::empty()),
            events_applied: 0,
        }
    }

    pub fn state(&self) -> AggregatorState {
        self.state
    }

    pub fn events_applied(&self) -> usize {
        self.events_applied
    }

    /// Apply one frame. Any error closes the aggregator as failed.
    pub fn apply(&mut self, frame: StreamFrame) -> Result<()> {
        if self.state != AggregatorState::Open {
            return Err(self.fail(ProtocolError::EventAfterClose.into()));
        }

        match frame {
            StreamFrame::Event(MigrationEvent::AppliedChange(change)) => {
                if let Err(e) = self.apply_change(change) {
                    return Err(self.fail(e));
                }
                self.events_applied += 1;
                Ok(())
            }
            StreamFrame::Event(MigrationEvent::Diagnostic(diagnostic)) => {
                Err(self.fail(
                    ProtocolError::Diagnostic {
                        detail: diagnostic.to_string(),
                    }
                    .into(),
                ))
            }
            StreamFrame::Unrecognized { kind } => {
                Err(self.fail(ProtocolError::UnrecognizedEvent { kind }.into()))
            }
            StreamFrame::Complete => {
                self.state = AggregatorState::Closed(Outcome::Success);
                Ok(())
            }
        }
    }

    fn apply_change(&mut self, change: AppliedChange) -> Result<()> {
        let policy = self.policy;
        let snapshot = self
            .snapshot
            .as_mut()
            .ok_or(MigrateError::Protocol(ProtocolError::EventAfterClose))?;

        if policy == DuplicateKeyPolicy::Reject {
            // Checked against earlier events only, before anything is written.
            if let Some(entry) = change
                .raw
                .iter()
                .find(|entry| snapshot.raw.contains_key(&entry.key))
            {
                return Err(ProtocolError::DuplicateKey {
                    map: SnapshotMap::Raw,
                    key: entry.key.clone(),
                }
                .into());
            }
            if let Some(description) = change
                .descriptions
                .iter()
                .find(|description| snapshot.descriptions.contains_key(&description.key))
            {
                return Err(ProtocolError::DuplicateKey {
                    map: SnapshotMap::Description,
                    key: description.key.clone(),
                }
                .into());
            }
        }

        for entry in change.raw {
            if snapshot.raw.insert(entry.key.clone(), entry.value).is_some() {
                debug!("Overwrote raw entry {}", entry.key);
            }
        }
        for description in change.descriptions {
            let key = description.key.clone();
            if snapshot.descriptions.insert(key, description).is_some() {
                debug!("Overwrote description entry");
            }
        }

        Ok(())
    }

    fn fail(&mut self, error: MigrateError) -> MigrateError {
        self.state = AggregatorState::Closed(Outcome::Failure);
        self.snapshot = None;
        error
    }

    /// The finished snapshot, available only after a successful close.
    ///
    /// An aggregator that is still open reports truncation; one that already
    /// failed has discarded its snapshot.
    pub fn finish(mut self) -> Result<StackState> {
        match (self.state, self.snapshot.take()) {
            (AggregatorState::Closed(Outcome::Success), Some(snapshot)) => Ok(snapshot),
            (AggregatorState::Open, _) => Err(ProtocolError::StreamTruncated.into()),
            (AggregatorState::Closed(_), _) => Err(ProtocolError::AlreadyFailed.into()),
        }
    }

    /// Drain `stream` until its completion marker, the first failure, or
    /// cancellation.
    pub async fn drain(
        mut self,
        mut stream: EventStream,
        cancel: &CancellationToken,
    ) -> Result<StackState> {
        while self.state == AggregatorState::Open {
            let item = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!("Event stream cancelled after {} events", self.events_applied);
                    return Err(self.fail(MigrateError::Cancelled {
                        reason: "event stream consumption was cancelled".to_string(),
                    }));
                }
                item = stream.next() => item,
            };

            match item {
                Some(Ok(frame)) => self.apply(frame)?,
                Some(Err(e)) => {
                    return Err(self.fail(MigrateError::engine(EnginePhase::Receive, format!("{e:#}"))));
                }
                None => return Err(self.fail(ProtocolError::StreamTruncated.into())),
            }
        }

        info!("Event stream completed after {} events", self.events_applied);
        self.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChangeDescription, ChangeKind, Diagnostic, RawEntry, Severity};

    fn change(raw: &[(&str, &str)], descriptions: &[&str]) -> StreamFrame {
        StreamFrame::Event(MigrationEvent::AppliedChange(AppliedChange {
            raw: raw
                .iter()
                .map(|(key, value)| RawEntry::new(*key, "type.test/Raw", value.as_bytes().to_vec()))
                .collect(),
            descriptions: descriptions
                .iter()
                .map(|key| ChangeDescription::new(*key, ChangeKind::ResourceInstance, *key))
                .collect(),
        }))
    }

    fn diagnostic() -> StreamFrame {
        StreamFrame::Event(MigrationEvent::Diagnostic(Diagnostic {
            severity: Severity::Error,
            summary: "Resource not mapped".to_string(),
            detail: "aws_instance.a has no target".to_string(),
        }))
    }

    #[test]
    fn test_later_write_wins() {
        let mut aggregator = EventAggregator::new(DuplicateKeyPolicy::Overwrite);
        aggregator.apply(change(&[("K", "first"), ("other", "x")], &[])).unwrap();
        aggregator.apply(change(&[("K", "second")], &[])).unwrap();
        aggregator.apply(StreamFrame::Complete).unwrap();

        let snapshot = aggregator.finish().unwrap();
        assert_eq!(snapshot.raw["K"].value, b"second".to_vec());
        assert_eq!(snapshot.raw["other"].value, b"x".to_vec());
        assert_eq!(snapshot.raw.len(), 2);
    }

    #[test]
    fn test_reject_policy_fails_on_cross_event_duplicate() {
        let mut aggregator = EventAggregator::new(DuplicateKeyPolicy::Reject);
        aggregator.apply(change(&[], &["D"])).unwrap();

        let err = aggregator.apply(change(&[], &["D"])).unwrap_err();
        assert!(matches!(
            err,
            MigrateError::Protocol(ProtocolError::DuplicateKey {
                map: SnapshotMap::Description,
                ..
            })
        ));
        assert_eq!(aggregator.state(), AggregatorState::Closed(Outcome::Failure));
    }

    #[test]
    fn test_reject_policy_allows_repeat_within_one_event() {
        let mut aggregator = EventAggregator::new(DuplicateKeyPolicy::Reject);
        aggregator.apply(change(&[("K", "a"), ("K", "b")], &[])).unwrap();
        aggregator.apply(StreamFrame::Complete).unwrap();
        assert_eq!(aggregator.finish().unwrap().raw["K"].value, b"b".to_vec());
    }

    #[test]
    fn test_diagnostic_closes_as_failure() {
        let mut aggregator = EventAggregator::new(DuplicateKeyPolicy::Overwrite);
        aggregator.apply(change(&[("A", "1")], &[])).unwrap();

        let err = aggregator.apply(diagnostic()).unwrap_err();
        assert!(err.to_string().contains("Resource not mapped"));
        assert_eq!(aggregator.state(), AggregatorState::Closed(Outcome::Failure));

        // Closed is terminal
        assert!(matches!(
            aggregator.apply(change(&[("B", "2")], &[])).unwrap_err(),
            MigrateError::Protocol(ProtocolError::EventAfterClose)
        ));
        assert!(matches!(
            aggregator.finish().unwrap_err(),
            MigrateError::Protocol(ProtocolError::AlreadyFailed)
        ));
    }

    #[test]
    fn test_warning_diagnostic_still_fails_the_run() {
        let mut aggregator = EventAggregator::new(DuplicateKeyPolicy::Overwrite);
        aggregator.apply(change(&[("A", "1")], &[])).unwrap();

        let err = aggregator
            .apply(StreamFrame::Event(MigrationEvent::Diagnostic(Diagnostic {
                severity: Severity::Warning,
                summary: "Deprecated attribute".to_string(),
                detail: String::new(),
            })))
            .unwrap_err();

        match err {
            MigrateError::Protocol(ProtocolError::Diagnostic { detail }) => {
                assert!(detail.starts_with("warning: Deprecated attribute"))
            }
            other => panic!("expected diagnostic error, got {other}"),
        }
        assert_eq!(aggregator.state(), AggregatorState::Closed(Outcome::Failure));
        assert!(aggregator.finish().is_err());
    }

    #[test]
    fn test_unrecognized_event_is_protocol_error() {
        let mut aggregator = EventAggregator::new(DuplicateKeyPolicy::Overwrite);
        let err = aggregator
            .apply(StreamFrame::Unrecognized {
                kind: "ProgressReport".to_string(),
            })
            .unwrap_err();
        assert!(matches!(
            err,
            MigrateError::Protocol(ProtocolError::UnrecognizedEvent { .. })
        ));
    }

    #[test]
    fn test_finish_while_open_is_truncation() {
        let aggregator = EventAggregator::new(DuplicateKeyPolicy::Overwrite);
        assert!(matches!(
            aggregator.finish().unwrap_err(),
            MigrateError::Protocol(ProtocolError::StreamTruncated)
        ));
    }

    #[tokio::test]
    async fn test_drain_stops_at_first_diagnostic() {
        let stream = EventStream::from_frames(vec![
            change(&[("A", "1")], &[]),
            diagnostic(),
            change(&[("TRAILING", "2")], &[]),
            StreamFrame::Complete,
        ]);

        let err = EventAggregator::new(DuplicateKeyPolicy::Overwrite)
            .drain(stream, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MigrateError::Protocol(ProtocolError::Diagnostic { .. })
        ));
    }

    #[tokio::test]
    async fn test_drain_empty_successful_stream() {
        let stream = EventStream::from_frames(vec![StreamFrame::Complete]);
        let snapshot = EventAggregator::new(DuplicateKeyPolicy::Overwrite)
            .drain(stream, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(snapshot, StackState::empty());
    }

    #[tokio::test]
    async fn test_drain_without_marker_is_truncated() {
        let stream = EventStream::from_frames(vec![change(&[("A", "1")], &[])]);
        let err = EventAggregator::new(DuplicateKeyPolicy::Overwrite)
            .drain(stream, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MigrateError::Protocol(ProtocolError::StreamTruncated)
        ));
    }

    #[tokio::test]
    async fn test_drain_surfaces_stream_errors() {
        let stream = EventStream::new(futures::stream::iter(vec![Err::<StreamFrame, _>(
            anyhow::anyhow!("transport closed"),
        )]));
        let err = EventAggregator::new(DuplicateKeyPolicy::Overwrite)
            .drain(stream, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MigrateError::Engine {
                phase: EnginePhase::Receive,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_drain_honours_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let stream = EventStream::new(futures::stream::pending::<anyhow::Result<StreamFrame>>());
        let err = EventAggregator::new(DuplicateKeyPolicy::Overwrite)
            .drain(stream, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, MigrateError::Cancelled { .. }));
    }
}
