//! # Counter Exhaustion
//!
//! ## Attack Vectors
//!
//! 1. Drive a connection until its send counter would wrap, hoping for
//!    nonce reuse under the same key.
//!
//! ## Defenses
//!
//! - `u64::MAX` is never handed out; the session is retired instead
//! - The host sees a distinct status and must re-attest and re-key

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use ae_audit::{AuditEvent, AuditFilter, AuditTopic};
    use ae_crypto::{Encryption, SecretKey};
    use ae_runtime::{TEE_ERROR_SECURITY, TEE_SUCCESS};

    /// Attack: exhaust the button → LED counter
    #[test]
    fn test_exhausted_session_is_retired() {
        let mut demo = Demo::new();
        demo.deploy();
        let mut sessions = demo.audit(AuditFilter::topics(vec![AuditTopic::Session]));

        demo.button
            .runtime_mut()
            .fast_forward_send(LED, u64::MAX)
            .unwrap();
        assert_eq!(demo.press(&MAGIC.to_le_bytes()), TEE_ERROR_SECURITY);

        assert_eq!(
            sessions.drain(),
            vec![AuditEvent::SessionRetired {
                module: BUTTON,
                peer: LED
            }]
        );
        assert!(!demo.button.runtime().sessions().contains(LED));

        // The sm3 connection is independent and still delivered.
        assert_eq!(demo.settle(), (0, 1));
        assert_eq!(*demo.sm3_values.lock(), vec![(SM3_INPUT, MAGIC)]);

        // Further presses only reach sm3 until the deployer re-keys.
        assert_eq!(demo.press(&MAGIC.to_le_bytes()), TEE_SUCCESS);
        assert_eq!(demo.settle(), (0, 1));
    }

    /// Test: re-attest and re-key restores the connection
    #[test]
    fn test_recovery_after_exhaustion() {
        let mut demo = Demo::new();
        demo.deploy();
        demo.button
            .runtime_mut()
            .fast_forward_send(LED, u64::MAX)
            .unwrap();
        assert_eq!(demo.press(&[1]), TEE_ERROR_SECURITY);
        demo.settle();

        let challenge = random_bytes(32);
        let (status, tag) = tz_attest(&mut demo.button, demo.button_session, &challenge);
        assert_eq!(status, TEE_SUCCESS);
        assert!(demo.deployer.verify(BUTTON, &challenge, &tag));

        demo.connect_button_led(SecretKey::generate(Encryption::Aes128Gcm));
        assert_eq!(
            demo.button.runtime().sessions().get(LED).unwrap().send_sequence(),
            0
        );

        assert_eq!(demo.press(&[2]), TEE_SUCCESS);
        assert_eq!(demo.settle(), (1, 1));
        assert_eq!(*demo.toggles.lock(), vec![vec![2]]);
    }
}
