//! Tests for [`QueueName`] and [`QueuedDelivery`].

use super::*;
use bytes::Bytes;

mod queue_name_tests {
    use super::*;

    #[test]
    fn test_accepts_typical_names() {
        assert!(QueueName::new("eval-gate-deliveries").is_ok());
        assert!(QueueName::new("queue_01").is_ok());
    }

    #[test]
    fn test_rejects_empty_and_overlong() {
        assert!(QueueName::new("").is_err());
        assert!(QueueName::new("x".repeat(81)).is_err());
    }

    #[test]
    fn test_rejects_invalid_characters() {
        assert!(QueueName::new("has space").is_err());
        assert!(QueueName::new("has/slash").is_err());
    }
}

mod queued_delivery_tests {
    use super::*;

    fn delivery() -> Delivery {
        Delivery::new(
            DeliveryId::new("delivery-7").unwrap(),
            "workflow_run",
            Bytes::from_static(b"{\"action\":\"completed\"}"),
        )
        .with_source_addr("192.30.252.1".parse().unwrap())
        .with_signature("sha256=deadbeef")
    }

    /// Queue capture, JSON wire form, and reconstruction preserve every
    /// carried field.
    #[test]
    fn test_wire_round_trip() {
        let original = delivery();
        let queued = QueuedDelivery::from_delivery(&original);

        let json = queued.to_json().unwrap();
        let restored = QueuedDelivery::from_json(&json).unwrap().into_delivery().unwrap();

        assert_eq!(restored.id, original.id);
        assert_eq!(restored.event_type, original.event_type);
        assert_eq!(restored.body, original.body);
        assert_eq!(restored.received_at, original.received_at);
        assert_eq!(restored.source_addr, original.source_addr);
    }

    /// The verified signature is not carried onto the queue.
    #[test]
    fn test_signature_not_carried() {
        let queued = QueuedDelivery::from_delivery(&delivery());
        let restored = queued.into_delivery().unwrap();

        assert_eq!(restored.signature, None);
    }

    /// A corrupted wire body fails to deserialize with a permanent error.
    #[test]
    fn test_malformed_wire_body_rejected() {
        let err = QueuedDelivery::from_json("{not json").unwrap_err();
        assert!(matches!(err, QueueError::Serialization { .. }));
        assert!(!err.is_transient());
    }
}
