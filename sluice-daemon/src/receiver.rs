//! UDP event receiver.
//!
//! Each datagram carries one JSON [`IngestEvent`] tagged with
//! `"kind": "dns" | "l7"`. The receiver decodes it and hands it to the
//! matching reporter. Undecodable datagrams and events the aggregators
//! reject are logged at `debug!` and counted; they never stop the loop.
//!
//! ```text
//! UDP datagram -> serde_json -> IngestEvent -+-> DNS reporter.ingest()
//!                                            +-> L7 reporter.ingest()  (after service inference)
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use serde::Deserialize;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use sluice_aggregator::dns::{DnsLog, DnsUpdate};
use sluice_aggregator::l7::{
    L7Log, L7Update, address_and_port, extract_k8s_service_name_and_namespace,
};
use sluice_aggregator::{AggregatorError, Reporter};
use sluice_core::config::ReceiverConfig;
use sluice_core::error::{PipelineError, SluiceError};
use sluice_core::metrics as m;
use sluice_core::pipeline::{HealthStatus, Pipeline};

/// Reporter handling DNS updates.
pub type DnsReporter = Reporter<DnsUpdate, DnsLog>;

/// Reporter handling L7 updates.
pub type L7Reporter = Reporter<L7Update, L7Log>;

/// One decoded datagram.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum IngestEvent {
    Dns(DnsUpdate),
    L7(L7Update),
}

impl IngestEvent {
    /// Metric label for this event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Dns(_) => "dns",
            Self::L7(_) => "l7",
        }
    }
}

/// Fill in the destination service from the request domain when the
/// producer did not supply one.
///
/// The port suffix is stripped first. If the remaining host is not a
/// Kubernetes service name the update is left untouched. Name and namespace
/// are both taken from the host, so `<svc>.svc` leaves the namespace empty.
pub fn infer_service(update: &mut L7Update) {
    if !update.service_name.is_empty() {
        return;
    }

    let (host, _port) = address_and_port(&update.domain);
    if let Some((name, namespace)) = extract_k8s_service_name_and_namespace(&host) {
        update.service_name = name;
        update.service_namespace = namespace;
    }
}

/// Hand one event to the reporter for its kind.
///
/// Events for a disabled kind are ignored.
pub fn route(
    event: IngestEvent,
    dns: Option<&DnsReporter>,
    l7: Option<&L7Reporter>,
) -> Result<(), AggregatorError> {
    match event {
        IngestEvent::Dns(update) => match dns {
            Some(reporter) => reporter.ingest(&update),
            None => {
                tracing::trace!("dns event received while dns aggregation is disabled");
                Ok(())
            }
        },
        IngestEvent::L7(mut update) => match l7 {
            Some(reporter) => {
                infer_service(&mut update);
                reporter.ingest(&update)
            }
            None => {
                tracing::trace!("l7 event received while l7 aggregation is disabled");
                Ok(())
            }
        },
    }
}

/// Decode and route one datagram.
fn handle_datagram(
    payload: &[u8],
    peer: SocketAddr,
    dns: Option<&DnsReporter>,
    l7: Option<&L7Reporter>,
) {
    let event: IngestEvent = match serde_json::from_slice(payload) {
        Ok(event) => event,
        Err(e) => {
            tracing::debug!(peer = %peer, bytes = payload.len(), error = %e, "undecodable datagram");
            metrics::counter!(m::RECEIVER_DECODE_ERRORS_TOTAL).increment(1);
            return;
        }
    };

    let kind = event.kind();
    metrics::counter!(m::RECEIVER_DATAGRAMS_TOTAL, m::LABEL_KIND => kind).increment(1);

    if let Err(e) = route(event, dns, l7) {
        tracing::debug!(peer = %peer, kind, error = %e, "event rejected");
    }
}

/// Receiver run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReceiverState {
    Initialized,
    Running,
    Stopped,
}

/// UDP receiver feeding the DNS and L7 reporters.
pub struct EventReceiver {
    config: ReceiverConfig,
    dns: Option<Arc<DnsReporter>>,
    l7: Option<Arc<L7Reporter>>,
    state: ReceiverState,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl EventReceiver {
    pub fn new(
        config: ReceiverConfig,
        dns: Option<Arc<DnsReporter>>,
        l7: Option<Arc<L7Reporter>>,
    ) -> Self {
        Self {
            config,
            dns,
            l7,
            state: ReceiverState::Initialized,
            cancel: CancellationToken::new(),
            task: None,
            local_addr: None,
        }
    }

    /// Bound address once started (useful with port 0).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Whether the receive loop is running.
    pub fn is_running(&self) -> bool {
        self.state == ReceiverState::Running
    }

    /// Current state name.
    pub fn state_name(&self) -> &'static str {
        match self.state {
            ReceiverState::Initialized => "initialized",
            ReceiverState::Running => "running",
            ReceiverState::Stopped => "stopped",
        }
    }
}

async fn receive_loop(
    socket: UdpSocket,
    max_message_size: usize,
    dns: Option<Arc<DnsReporter>>,
    l7: Option<Arc<L7Reporter>>,
    cancel: CancellationToken,
) {
    let mut buf = vec![0u8; max_message_size];
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("receiver loop cancelled");
                break;
            }
            result = socket.recv_from(&mut buf) => match result {
                Ok((len, peer)) => {
                    handle_datagram(&buf[..len], peer, dns.as_deref(), l7.as_deref());
                }
                Err(e) => tracing::warn!(error = %e, "udp receive failed"),
            }
        }
    }
}

impl Pipeline for EventReceiver {
    async fn start(&mut self) -> Result<(), SluiceError> {
        if self.state == ReceiverState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        let socket = UdpSocket::bind(&self.config.bind_addr).await?;
        let local_addr = socket.local_addr()?;

        self.cancel = CancellationToken::new();
        self.task = Some(tokio::spawn(receive_loop(
            socket,
            self.config.max_message_size,
            self.dns.clone(),
            self.l7.clone(),
            self.cancel.clone(),
        )));
        self.local_addr = Some(local_addr);
        self.state = ReceiverState::Running;

        tracing::info!(bind_addr = %local_addr, "event receiver started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), SluiceError> {
        if self.state != ReceiverState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "receiver task failed");
            }
        }

        self.state = ReceiverState::Stopped;
        tracing::info!("event receiver stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            ReceiverState::Running => HealthStatus::Healthy,
            ReceiverState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            ReceiverState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::types::EndpointMetadata;

    fn l7(domain: &str) -> L7Update {
        L7Update {
            domain: domain.to_owned(),
            dst: EndpointMetadata {
                namespace: "dst-ns".to_owned(),
                ..EndpointMetadata::default()
            },
            ..L7Update::default()
        }
    }

    #[test]
    fn decodes_tagged_l7_event() {
        let event: IngestEvent = serde_json::from_str(
            r#"{"kind": "l7", "domain": "web.shop:8080", "path": "/", "type": "http/1.1"}"#,
        )
        .unwrap();
        match event {
            IngestEvent::L7(update) => {
                assert_eq!(update.domain, "web.shop:8080");
                assert_eq!(update.protocol, "http/1.1");
                assert_eq!(update.count, 1);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn unknown_kind_fails_to_decode() {
        assert!(serde_json::from_str::<IngestEvent>(r#"{"kind": "tcp"}"#).is_err());
    }

    #[test]
    fn infers_service_from_cluster_domain() {
        let mut update = l7("my-svc.svc-namespace.svc.cluster.local:80");
        infer_service(&mut update);
        assert_eq!(update.service_name, "my-svc");
        assert_eq!(update.service_namespace, "svc-namespace");
    }

    #[test]
    fn inferred_service_without_namespace_leaves_it_empty() {
        let mut update = L7Update {
            service_namespace: "stale".to_owned(),
            ..l7("my-svc.svc.cluster.local")
        };
        infer_service(&mut update);
        assert_eq!(update.service_name, "my-svc");
        assert_eq!(update.service_namespace, "");
    }

    #[test]
    fn external_domain_is_not_a_service() {
        let mut update = l7("www.example.com");
        infer_service(&mut update);
        assert!(update.service_name.is_empty());
    }

    #[test]
    fn explicit_service_is_kept() {
        let mut update = L7Update {
            service_name: "given".to_owned(),
            ..l7("my-svc.other")
        };
        infer_service(&mut update);
        assert_eq!(update.service_name, "given");
    }

    #[test]
    fn disabled_kind_is_ignored() {
        let event = IngestEvent::L7(l7("a.b"));
        assert!(route(event, None, None).is_ok());
    }

    #[tokio::test]
    async fn lifecycle_binds_and_stops() {
        let config = ReceiverConfig {
            bind_addr: "127.0.0.1:0".to_owned(),
            ..ReceiverConfig::default()
        };
        let mut receiver = EventReceiver::new(config, None, None);
        assert!(receiver.health_check().await.is_unhealthy());

        receiver.start().await.unwrap();
        assert!(receiver.is_running());
        assert!(receiver.local_addr().is_some());
        assert!(receiver.health_check().await.is_healthy());
        assert!(receiver.start().await.is_err());

        receiver.stop().await.unwrap();
        assert_eq!(receiver.state_name(), "stopped");
        assert!(!receiver.is_running());
        assert!(receiver.stop().await.is_err());
    }
}
