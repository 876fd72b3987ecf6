//! # Event Pipeline
//!
//! ```text
//! press (TA cmd 3) → button_driver ──seal──→ [InMemoryNetwork] ──→ led_driver
//!                                      └──seal──→ [InMemoryNetwork] ──→ sm3
//! ```
//!
//! Each destination gets its own ciphertext under its own session key and
//! sequence space.

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use ae_audit::{AuditEvent, AuditFilter, AuditTopic};
    use ae_runtime::{serve_inbound, HostBackend, TEE_SUCCESS};
    use std::time::Duration;
    use tokio_stream::StreamExt;

    /// Test: one press reaches both subscribers
    #[test]
    fn test_press_fans_out_to_both_backends() {
        let mut demo = Demo::new();
        demo.deploy();

        assert_eq!(demo.press(&MAGIC.to_le_bytes()), TEE_SUCCESS);
        assert_eq!(demo.settle(), (1, 1));

        assert_eq!(*demo.toggles.lock(), vec![MAGIC.to_le_bytes().to_vec()]);
        assert_eq!(*demo.sm3_values.lock(), vec![(SM3_INPUT, MAGIC)]);
    }

    /// Test: destinations have independent counters
    #[test]
    fn test_sequences_are_per_destination() {
        let mut demo = Demo::new();
        demo.deploy();

        for value in 0..5u32 {
            assert_eq!(demo.press(&value.to_le_bytes()), TEE_SUCCESS);
        }

        let mut led_sequences = Vec::new();
        while let Some(message) = demo.led_inbox.try_recv() {
            led_sequences.push(message.sequence);
        }
        assert_eq!(led_sequences, vec![0, 1, 2, 3, 4]);

        // Same plaintext, different key and nonce.
        let sm3_first = demo.sm3_inbox.try_recv().unwrap();
        assert_eq!(sm3_first.sequence, 0);
        assert_eq!(sm3_first.input, SM3_INPUT);

        let sessions = demo.button.runtime().sessions();
        assert_eq!(sessions.get(LED).unwrap().send_sequence(), 5);
        assert_eq!(sessions.get(SM3).unwrap().send_sequence(), 5);
    }

    /// Test: an unreachable destination does not block the other
    #[test]
    fn test_unreachable_destination_is_isolated() {
        let mut demo = Demo::new();
        demo.deploy();
        let mut deliveries = demo.audit(AuditFilter::topics(vec![AuditTopic::Delivery]));

        demo.network.disconnect(LED);
        assert_eq!(demo.press(&MAGIC.to_le_bytes()), TEE_SUCCESS);
        assert_eq!(demo.settle(), (0, 1));
        assert_eq!(demo.sm3_values.lock().len(), 1);

        match deliveries.try_recv().unwrap() {
            Some(AuditEvent::DeliveryFailed {
                module,
                destination,
                ..
            }) => {
                assert_eq!(module, BUTTON);
                assert_eq!(destination.module, LED);
            }
            other => panic!("expected DeliveryFailed, got {other:?}"),
        }

        // The failed attempt consumed sequence 0 towards LED.
        demo.led_inbox = demo.network.connect(LED);
        assert_eq!(demo.press(&[1, 0, 0, 0]), TEE_SUCCESS);
        assert_eq!(demo.led_inbox.try_recv().unwrap().sequence, 1);
    }

    /// Test: modules served by async loops, as a host process would
    #[tokio::test]
    async fn test_serve_inbound_loops() {
        let mut demo = Demo::new();
        demo.deploy();

        let mut led_inbox = demo.led_inbox;
        let mut led_backend = demo.led;
        let led_task = tokio::spawn(async move {
            let delivered = serve_inbound(&mut led_backend, &mut led_inbox).await;
            (delivered, led_backend)
        });

        let mut sm3_inbox = demo.sm3_inbox;
        let mut sm3_backend = demo.sm3;
        let sm3_task = tokio::spawn(async move {
            let delivered = serve_inbound(&mut sm3_backend, &mut sm3_inbox).await;
            (delivered, sm3_backend)
        });

        for value in [MAGIC, 7, MAGIC] {
            let status = tz_command(
                &mut demo.button,
                demo.button_session,
                PRESS.0,
                &value.to_le_bytes(),
            );
            assert_eq!(status, TEE_SUCCESS);
        }

        // Closing the mailboxes ends both loops once drained.
        demo.network.disconnect(LED);
        demo.network.disconnect(SM3);

        let (led_delivered, led_backend) = tokio::time::timeout(Duration::from_secs(5), led_task)
            .await
            .unwrap()
            .unwrap();
        let (sm3_delivered, sm3_backend) = tokio::time::timeout(Duration::from_secs(5), sm3_task)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(led_delivered, 3);
        assert_eq!(sm3_delivered, 3);
        assert_eq!(led_backend.module_id(), LED);
        assert_eq!(sm3_backend.module_id(), SM3);
        assert_eq!(demo.toggles.lock().len(), 3);
        assert_eq!(
            *demo.sm3_values.lock(),
            vec![(SM3_INPUT, MAGIC), (SM3_INPUT, 7), (SM3_INPUT, MAGIC)]
        );
    }

    /// Test: audit stream sees deployment in order
    #[tokio::test]
    async fn test_audit_stream_observes_deployment() {
        let mut demo = Demo::new();
        let mut stream = demo
            .bus
            .stream(AuditFilter::topics(vec![AuditTopic::Session, AuditTopic::Attestation]));

        demo.deploy();

        let mut established = 0;
        let mut attested = 0;
        for _ in 0..7 {
            let event = tokio::time::timeout(Duration::from_secs(1), stream.next())
                .await
                .unwrap()
                .unwrap();
            match event {
                AuditEvent::SessionEstablished { rotated, .. } => {
                    assert!(!rotated);
                    established += 1;
                }
                AuditEvent::Attested { .. } => attested += 1,
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!((established, attested), (4, 3));
    }

    /// Test: sm3 second input is reachable only through routing
    #[test]
    fn test_unrouted_input_never_receives() {
        let mut demo = Demo::new();
        demo.deploy();
        demo.press(&MAGIC.to_le_bytes());
        demo.settle();

        assert!(demo
            .sm3_values
            .lock()
            .iter()
            .all(|(input, _)| *input != SM3_INPUT2));
        assert!(demo.button_inbox.try_recv().is_none());
    }
}
