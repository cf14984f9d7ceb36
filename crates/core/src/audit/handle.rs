use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::error;

use super::AuditEvent;

/// A timestamped event on its way to the journal writer.
#[derive(Debug, Clone)]
pub struct AuditEventEnvelope {
    pub timestamp: DateTime<Utc>,
    pub event: AuditEvent,
}

impl AuditEventEnvelope {
    fn now(event: AuditEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
        }
    }
}

/// Cheaply cloneable emitter shared by the orchestrator and recipes.
///
/// Events flow through a bounded channel to the writer task. The journal
/// is strictly best-effort: emitting never fails the caller.
#[derive(Clone)]
pub struct AuditHandle {
    tx: mpsc::Sender<AuditEventEnvelope>,
}

impl AuditHandle {
    pub fn new(tx: mpsc::Sender<AuditEventEnvelope>) -> Self {
        Self { tx }
    }

    /// Queue an event for the journal.
    ///
    /// Waits for buffer space but never for the write itself. A closed
    /// channel is logged and swallowed; processing never stalls on the
    /// journal.
    pub async fn emit(&self, event: AuditEvent) {
        let event_type = event.event_type();
        if self.tx.send(AuditEventEnvelope::now(event)).await.is_err() {
            error!(event_type, "Audit channel closed, event dropped");
        }
    }

    /// Queue an event without waiting; `false` when the buffer is full or
    /// the channel is closed.
    pub fn try_emit(&self, event: AuditEvent) -> bool {
        let event_type = event.event_type();
        match self.tx.try_send(AuditEventEnvelope::now(event)) {
            Ok(()) => true,
            Err(e) => {
                error!(event_type, "Failed to queue audit event: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_event() {
        let (tx, mut rx) = mpsc::channel(10);
        let handle = AuditHandle::new(tx);

        handle
            .emit(AuditEvent::ServiceStarted {
                version: "0.1.0".to_string(),
                config_hash: "abc123".to_string(),
            })
            .await;

        let envelope = rx.recv().await.expect("Should receive event");
        assert!(matches!(envelope.event, AuditEvent::ServiceStarted { .. }));
    }

    #[tokio::test]
    async fn test_multiple_handles_same_channel() {
        let (tx, mut rx) = mpsc::channel(10);
        let handle1 = AuditHandle::new(tx.clone());
        let handle2 = AuditHandle::new(tx);

        handle1
            .emit(AuditEvent::CycleStarted {
                cycle_id: "c-1".to_string(),
            })
            .await;

        handle2
            .emit(AuditEvent::ServiceStopped {
                reason: "test".to_string(),
            })
            .await;

        let e1 = rx.recv().await.expect("Should receive first event");
        let e2 = rx.recv().await.expect("Should receive second event");

        assert!(matches!(e1.event, AuditEvent::CycleStarted { .. }));
        assert!(matches!(e2.event, AuditEvent::ServiceStopped { .. }));
    }

    #[test]
    fn test_try_emit_full_channel() {
        let (tx, _rx) = mpsc::channel(1);
        let handle = AuditHandle::new(tx);

        let result1 = handle.try_emit(AuditEvent::CycleStarted {
            cycle_id: "c-1".to_string(),
        });
        assert!(result1);

        // Channel full now.
        let result2 = handle.try_emit(AuditEvent::ServiceStopped {
            reason: "test".to_string(),
        });
        assert!(!result2);
    }

    #[tokio::test]
    async fn test_emit_closed_channel_does_not_panic() {
        let (tx, rx) = mpsc::channel::<AuditEventEnvelope>(10);
        let handle = AuditHandle::new(tx);
        drop(rx);

        handle
            .emit(AuditEvent::ServiceStopped {
                reason: "test".to_string(),
            })
            .await;
    }

    #[test]
    fn test_envelope_has_timestamp() {
        let (tx, mut rx) = mpsc::channel(10);
        let handle = AuditHandle::new(tx);

        let before = Utc::now();
        handle.try_emit(AuditEvent::CycleStarted {
            cycle_id: "c-1".to_string(),
        });
        let after = Utc::now();

        let envelope = rx.try_recv().expect("Should receive event");
        assert!(envelope.timestamp >= before);
        assert!(envelope.timestamp <= after);
    }
}
