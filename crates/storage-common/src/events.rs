//! Kubernetes Events emitted by the storage operator
//!
//! Publishing never fails the caller: a rejected Event is logged and dropped.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::Client;
use tracing::warn;

/// Something worth an Event on the operator's own objects
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OperatorEvent {
    /// A CSI driver's controller bundle was started
    DriverControllerStarted {
        /// CSI driver name
        driver: String,
    },
}

impl OperatorEvent {
    /// Machine-readable reason
    pub fn reason(&self) -> &'static str {
        match self {
            Self::DriverControllerStarted { .. } => "CSIDriverControllerStarted",
        }
    }

    /// Action the operator took
    pub fn action(&self) -> &'static str {
        match self {
            Self::DriverControllerStarted { .. } => "Start",
        }
    }

    /// Human-readable note
    pub fn note(&self) -> String {
        match self {
            Self::DriverControllerStarted { driver } => {
                format!("Started controllers for CSI driver {}", driver)
            }
        }
    }

    fn to_event(&self) -> Event {
        Event {
            type_: EventType::Normal,
            reason: self.reason().to_string(),
            note: Some(self.note()),
            action: self.action().to_string(),
            secondary: None,
        }
    }
}

/// Publishes Events about an object
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish `event` regarding `object`. Never fails.
    async fn publish(&self, object: &ObjectReference, event: OperatorEvent);
}

/// Publisher backed by the events.k8s.io API
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    /// `component` is shown as the Event's reporting controller
    pub fn new(client: Client, component: &str) -> Self {
        let reporter = Reporter {
            controller: component.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(&self, object: &ObjectReference, event: OperatorEvent) {
        if let Err(e) = self.recorder.publish(&event.to_event(), object).await {
            warn!(reason = event.reason(), error = %e, "Failed to publish event");
        }
    }
}

/// Drops every Event
pub struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn publish(&self, _object: &ObjectReference, _event: OperatorEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_started_event() {
        let event = OperatorEvent::DriverControllerStarted {
            driver: "ebs.csi.aws.com".to_string(),
        }
        .to_event();

        assert!(matches!(event.type_, EventType::Normal));
        assert_eq!(event.reason, "CSIDriverControllerStarted");
        assert_eq!(event.action, "Start");
        assert_eq!(
            event.note.as_deref(),
            Some("Started controllers for CSI driver ebs.csi.aws.com")
        );
    }

    #[tokio::test]
    async fn noop_publisher_accepts_events() {
        NoopEventPublisher
            .publish(
                &ObjectReference::default(),
                OperatorEvent::DriverControllerStarted {
                    driver: "x".to_string(),
                },
            )
            .await;
    }
}
