//! # Replay Attacks
//!
//! ## Attack Vectors
//!
//! 1. Capture an event on the wire and deliver it again.
//! 2. Deliver captured events out of order, or long after the fact.
//! 3. Re-send a captured `SetKey` to roll a session back to an old key.
//!
//! ## Defenses
//!
//! - Per-session sliding replay window (default 64)
//! - Deployer nonce carried in every `SetKey`

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use ae_audit::{AuditEvent, AuditFilter, AuditTopic};
    use ae_crypto::{Encryption, SecretKey};
    use ae_runtime::{HostBackend, TEE_ERROR_BAD_PARAMETERS, TEE_SUCCESS};
    use ae_types::{EventMessage, Rejection};

    fn capture(demo: &mut Demo, presses: usize) -> Vec<EventMessage> {
        for _ in 0..presses {
            assert_eq!(demo.press(&MAGIC.to_le_bytes()), TEE_SUCCESS);
        }
        let mut captured = Vec::new();
        while let Some(message) = demo.led_inbox.try_recv() {
            captured.push(message);
        }
        assert_eq!(captured.len(), presses);
        captured
    }

    fn deliver(demo: &mut Demo, message: &EventMessage) {
        let status = demo.led.deliver(&message.encode().unwrap());
        // Fail-silent: the host never learns whether the event was accepted.
        assert!(demo.led.is_success(status));
    }

    /// Attack: deliver the same event twice
    #[test]
    fn test_replayed_event_is_dropped() {
        let mut demo = Demo::new();
        demo.deploy();
        let mut rejections = demo.audit(AuditFilter::topics(vec![AuditTopic::Rejection]));

        let captured = capture(&mut demo, 1);
        deliver(&mut demo, &captured[0]);
        deliver(&mut demo, &captured[0]);

        assert_eq!(demo.toggles.lock().len(), 1);
        assert_eq!(
            rejections.drain(),
            vec![AuditEvent::Rejected {
                module: LED,
                rejection: Rejection::Replayed {
                    peer: BUTTON,
                    sequence: 0
                }
            }]
        );
    }

    /// Attack: reorder events inside the window
    #[test]
    fn test_reordering_within_window_is_tolerated() {
        let mut demo = Demo::new();
        demo.deploy();

        let captured = capture(&mut demo, 3);
        for index in [2, 0, 1] {
            deliver(&mut demo, &captured[index]);
        }
        assert_eq!(demo.toggles.lock().len(), 3);

        deliver(&mut demo, &captured[1]);
        assert_eq!(demo.toggles.lock().len(), 3);
    }

    /// Attack: hold events back until they fall out of the window
    #[test]
    fn test_delayed_event_falls_out_of_window() {
        let mut demo = Demo::new();
        demo.deploy();
        let mut rejections = demo.audit(AuditFilter::topics(vec![AuditTopic::Rejection]));

        let captured = capture(&mut demo, 70);
        deliver(&mut demo, &captured[69]);
        deliver(&mut demo, &captured[5]);
        deliver(&mut demo, &captured[6]);

        assert_eq!(demo.toggles.lock().len(), 2);
        assert_eq!(
            rejections.drain(),
            vec![AuditEvent::Rejected {
                module: LED,
                rejection: Rejection::OutOfWindow {
                    peer: BUTTON,
                    sequence: 5
                }
            }]
        );
    }

    /// Attack: replay an old SetKey after the deployer rotated the key
    #[test]
    fn test_set_key_replay_cannot_roll_back() {
        let mut demo = Demo::new();
        let old_key = SecretKey::generate(Encryption::Aes128Gcm);
        let new_key = SecretKey::generate(Encryption::Aes128Gcm);

        let captured = demo.deployer.set_key(LED, BUTTON, &old_key);
        assert_eq!(
            tz_command(&mut demo.led, demo.led_session, 0, &captured),
            TEE_SUCCESS
        );
        let rotation = demo.deployer.set_key(LED, BUTTON, &new_key);
        assert_eq!(
            tz_command(&mut demo.led, demo.led_session, 0, &rotation),
            TEE_SUCCESS
        );

        assert_eq!(
            tz_command(&mut demo.led, demo.led_session, 0, &captured),
            TEE_ERROR_BAD_PARAMETERS
        );
        assert_eq!(
            tz_command(&mut demo.led, demo.led_session, 0, &rotation),
            TEE_ERROR_BAD_PARAMETERS
        );

        let installed = demo.led.runtime().sessions().get(BUTTON).unwrap();
        assert_eq!(installed.key().as_bytes(), new_key.as_bytes());
        assert_eq!(demo.led.runtime().expected_set_key_nonce(), Some(2));
    }

    /// Attack: deliver a SetKey meant for one module to another
    #[test]
    fn test_set_key_for_other_module_is_refused() {
        let mut demo = Demo::new();
        let key = SecretKey::generate(Encryption::Aes128Gcm);

        // Same nonce on both modules, different module keys.
        let for_button = demo.deployer.set_key(BUTTON, LED, &key);
        assert_eq!(
            tz_command(&mut demo.led, demo.led_session, 0, &for_button),
            TEE_ERROR_BAD_PARAMETERS
        );
        assert!(demo.led.runtime().sessions().is_empty());
    }
}
