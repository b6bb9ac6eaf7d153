//! Tests for the domain identifier and error types.

use super::*;

// ============================================================================
// DeliveryId tests
// ============================================================================

mod delivery_id_tests {
    use super::*;

    #[test]
    fn test_accepts_typical_identifiers() {
        assert!(DeliveryId::new("72d3162e-cc78-11e3-81ab-4c9367dc0958").is_ok());
        assert!(DeliveryId::new("simple-id").is_ok());
    }

    #[test]
    fn test_rejects_empty() {
        assert!(matches!(
            DeliveryId::new(""),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_rejects_overlong() {
        assert!(matches!(
            DeliveryId::new("x".repeat(129)),
            Err(ValidationError::TooLong { .. })
        ));
    }

    #[test]
    fn test_rejects_whitespace_and_control_characters() {
        assert!(DeliveryId::new("has space").is_err());
        assert!(DeliveryId::new("has\nnewline").is_err());
        assert!(DeliveryId::new("has\u{0}nul").is_err());
    }

    #[test]
    fn test_from_str_round_trip() {
        let id: DeliveryId = "abc-123".parse().unwrap();
        assert_eq!(id.as_str(), "abc-123");
        assert_eq!(id.to_string(), "abc-123");
    }
}

// ============================================================================
// CommitSha tests
// ============================================================================

mod commit_sha_tests {
    use super::*;

    const SHA: &str = "a94a8fe5ccb19ba61c4c0873d391e987982fbbd3";

    #[test]
    fn test_accepts_forty_hex_characters() {
        let sha = CommitSha::new(SHA).unwrap();
        assert_eq!(sha.as_str(), SHA);
    }

    #[test]
    fn test_normalizes_to_lowercase() {
        let sha = CommitSha::new(SHA.to_uppercase()).unwrap();
        assert_eq!(sha.as_str(), SHA);
    }

    #[test]
    fn test_rejects_wrong_length() {
        assert!(CommitSha::new("abc123").is_err());
        assert!(CommitSha::new("a".repeat(41)).is_err());
    }

    #[test]
    fn test_rejects_non_hex() {
        assert!(CommitSha::new("g".repeat(40)).is_err());
    }

    #[test]
    fn test_short_form() {
        let sha = CommitSha::new(SHA).unwrap();
        assert_eq!(sha.short(), "a94a8fe5ccb1");
    }

    /// Case-variant SHAs compare equal after normalization; per-SHA state
    /// keying depends on this.
    #[test]
    fn test_case_variants_are_equal() {
        assert_eq!(
            CommitSha::new(SHA).unwrap(),
            CommitSha::new(SHA.to_uppercase()).unwrap()
        );
    }
}

// ============================================================================
// Timestamp tests
// ============================================================================

mod timestamp_tests {
    use super::*;

    #[test]
    fn test_rfc3339_round_trip() {
        let ts = Timestamp::from_rfc3339("2026-08-23T10:30:00Z").unwrap();
        assert!(ts.to_rfc3339().starts_with("2026-08-23T10:30:00"));
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(Timestamp::from_rfc3339("yesterday").is_err());
    }

    #[test]
    fn test_ordering_and_duration() {
        let earlier = Timestamp::from_rfc3339("2026-08-23T10:00:00Z").unwrap();
        let later = Timestamp::from_rfc3339("2026-08-23T10:00:30Z").unwrap();

        assert!(earlier < later);
        assert_eq!(later.duration_since(earlier), Duration::from_secs(30));
        // Negative spans clamp to zero instead of panicking.
        assert_eq!(earlier.duration_since(later), Duration::ZERO);
    }
}

// ============================================================================
// GateError tests
// ============================================================================

mod gate_error_tests {
    use super::*;

    #[test]
    fn test_admission_errors_are_security_category() {
        let err = GateError::Admission(pipeline::AdmissionError::SignatureInvalid);
        assert_eq!(err.error_category(), ErrorCategory::Security);
        assert!(!err.is_transient());
    }

    #[test]
    fn test_validation_errors_are_permanent() {
        let err = GateError::Validation(ValidationError::Required {
            field: "x".to_string(),
        });
        assert_eq!(err.error_category(), ErrorCategory::Permanent);
        assert!(!err.is_transient());
    }

    #[test]
    fn test_external_service_errors_are_transient() {
        let err = GateError::ExternalService {
            service: "queue".to_string(),
            message: "timeout".to_string(),
        };
        assert!(err.is_transient());
        assert_eq!(err.error_category(), ErrorCategory::Transient);
    }

    #[test]
    fn test_transient_check_run_error_classified() {
        let err = GateError::CheckRun(check_run::CheckRunError::Api {
            message: "503".to_string(),
            transient: true,
        });
        assert!(err.is_transient());
        assert_eq!(err.error_category(), ErrorCategory::Transient);
    }
}
