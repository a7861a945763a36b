//! Snapshot assembly from the discovery backend.

use crate::discovery::Discovery;
use crate::priority;
use crate::types::{
    ConfigSnapshot, INTERFACE_ANNOTATION, TRACK_INTERFACE_ANNOTATION, VIP_ANNOTATION,
    VRID_ANNOTATION,
};
use common::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Assembles one configuration snapshot per reconciliation tick.
///
/// Purely read-only against the backend; the snapshot it returns is the
/// only thing that leaves this type.
pub struct ConfigFetcher {
    discovery: Arc<dyn Discovery>,
    service: String,
    instance: String,
}

impl ConfigFetcher {
    /// Create a fetcher for one service/instance pair.
    pub fn new(
        discovery: Arc<dyn Discovery>,
        service: impl Into<String>,
        instance: impl Into<String>,
    ) -> Self {
        Self {
            discovery,
            service: service.into(),
            instance: instance.into(),
        }
    }

    /// Query the backend and build a snapshot.
    ///
    /// The four keepalived annotations are required configuration, not
    /// defaulted; the first absent one fails the tick, naming the key.
    pub async fn fetch(&self) -> Result<ConfigSnapshot> {
        let service = self.discovery.service(&self.service).await?;

        let vip = required(&service.annotations, VIP_ANNOTATION)?;
        let vrid = required(&service.annotations, VRID_ANNOTATION)?;
        let interface = required(&service.annotations, INTERFACE_ANNOTATION)?;
        let track_interface = required(&service.annotations, TRACK_INTERFACE_ANNOTATION)?;

        let virtual_router_id: u8 = vrid.parse().map_err(|_| {
            Error::config(format!(
                "annotation {VRID_ANNOTATION} must be an integer in 1-255, got {vrid:?}"
            ))
        })?;

        let peers = service.members();
        let self_address = self.discovery.self_address(&self.instance).await?;
        let derivation = priority::derive(&self_address, &peers);

        debug!(
            service = %self.service,
            self_address = %self_address,
            peers = peers.len(),
            priority = derivation.priority,
            "assembled configuration snapshot"
        );

        Ok(ConfigSnapshot {
            interface,
            track_interface,
            self_address,
            vip,
            virtual_router_id,
            neighbors: derivation.neighbors,
            priority: derivation.priority,
        })
    }
}

fn required(annotations: &HashMap<String, String>, key: &str) -> Result<String> {
    match annotations.get(key) {
        Some(value) if !value.is_empty() => Ok(value.clone()),
        _ => Err(Error::missing_annotation(key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{MockDiscovery, ServiceInfo};

    fn annotations() -> HashMap<String, String> {
        HashMap::from([
            (VIP_ANNOTATION.to_string(), "10.0.0.100".to_string()),
            (VRID_ANNOTATION.to_string(), "50".to_string()),
            (INTERFACE_ANNOTATION.to_string(), "eth0".to_string()),
            (TRACK_INTERFACE_ANNOTATION.to_string(), "eth1".to_string()),
        ])
    }

    fn backend(info: ServiceInfo, self_address: &str) -> MockDiscovery {
        let self_address = self_address.to_string();
        let mut mock = MockDiscovery::new();
        mock.expect_service().returning(move |_| Ok(info.clone()));
        mock.expect_self_address()
            .returning(move |_| Ok(self_address.clone()));
        mock
    }

    #[tokio::test]
    async fn test_fetch_builds_populated_snapshot() {
        let info = ServiceInfo {
            annotations: annotations(),
            ready: vec!["10.0.0.3".into(), "10.0.0.2".into()],
            not_ready: vec!["10.0.0.1".into()],
        };
        let fetcher = ConfigFetcher::new(Arc::new(backend(info, "10.0.0.2")), "vip", "replica-0");

        let snapshot = fetcher.fetch().await.unwrap();

        assert_eq!(snapshot.vip, "10.0.0.100");
        assert_eq!(snapshot.virtual_router_id, 50);
        assert_eq!(snapshot.interface, "eth0");
        assert_eq!(snapshot.track_interface, "eth1");
        assert_eq!(snapshot.self_address, "10.0.0.2");
        assert_eq!(
            snapshot.neighbors,
            vec!["10.0.0.1".to_string(), "10.0.0.3".to_string()]
        );
        assert_eq!(snapshot.priority, priority::PRIORITY_BASE + 1);
    }

    #[tokio::test]
    async fn test_fetch_fails_naming_each_missing_annotation() {
        for key in [
            VIP_ANNOTATION,
            VRID_ANNOTATION,
            INTERFACE_ANNOTATION,
            TRACK_INTERFACE_ANNOTATION,
        ] {
            let mut partial = annotations();
            partial.remove(key);
            let info = ServiceInfo {
                annotations: partial,
                ready: vec!["10.0.0.1".into()],
                not_ready: vec![],
            };
            let fetcher =
                ConfigFetcher::new(Arc::new(backend(info, "10.0.0.1")), "vip", "replica-0");

            match fetcher.fetch().await {
                Err(Error::MissingAnnotation(named)) => assert_eq!(named, key),
                other => panic!("expected MissingAnnotation({key}), got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_fetch_rejects_empty_annotation_value() {
        let mut values = annotations();
        values.insert(VIP_ANNOTATION.to_string(), String::new());
        let info = ServiceInfo {
            annotations: values,
            ready: vec![],
            not_ready: vec![],
        };
        let fetcher = ConfigFetcher::new(Arc::new(backend(info, "10.0.0.1")), "vip", "replica-0");

        match fetcher.fetch().await {
            Err(Error::MissingAnnotation(named)) => assert_eq!(named, VIP_ANNOTATION),
            other => panic!("expected MissingAnnotation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_rejects_non_numeric_vrid() {
        let mut values = annotations();
        values.insert(VRID_ANNOTATION.to_string(), "fifty".to_string());
        let info = ServiceInfo {
            annotations: values,
            ready: vec![],
            not_ready: vec![],
        };
        let fetcher = ConfigFetcher::new(Arc::new(backend(info, "10.0.0.1")), "vip", "replica-0");

        match fetcher.fetch().await {
            Err(Error::Config(msg)) => assert!(msg.contains(VRID_ANNOTATION)),
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_tolerates_self_missing_from_membership() {
        let info = ServiceInfo {
            annotations: annotations(),
            ready: vec!["10.0.0.2".into(), "10.0.0.3".into()],
            not_ready: vec![],
        };
        let fetcher = ConfigFetcher::new(Arc::new(backend(info, "10.0.0.1")), "vip", "replica-0");

        let snapshot = fetcher.fetch().await.unwrap();

        assert_eq!(
            snapshot.neighbors,
            vec!["10.0.0.2".to_string(), "10.0.0.3".to_string()]
        );
        assert_eq!(snapshot.priority, priority::PRIORITY_BASE);
    }

    #[tokio::test]
    async fn test_fetch_propagates_backend_failure() {
        let mut mock = MockDiscovery::new();
        mock.expect_service()
            .returning(|_| Err(Error::backend("connection refused")));
        let fetcher = ConfigFetcher::new(Arc::new(mock), "vip", "replica-0");

        assert!(matches!(fetcher.fetch().await, Err(Error::Backend(_))));
    }
}
