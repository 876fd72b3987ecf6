//! # Deployment Flows
//!
//! ```text
//! [Deployer] ──SetKey(nonce n)──→ module ──→ Session installed / rotated
//!            ──Attest(challenge)──→ module ──→ tag, verified with module key
//!            ──descriptor.json──→ RuntimeConfig ──→ pre-provisioned sessions
//! ```

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use ae_audit::{AuditEvent, AuditFilter, AuditTopic};
    use ae_crypto::{Encryption, SecretKey};
    use ae_runtime::{
        execute, pump, HostBackend, InMemoryNetwork, ModuleRuntime, RuntimeConfig, SancusBackend,
        TracingAuditSink, TEE_ERROR_BAD_STATE, TEE_ERROR_ITEM_NOT_FOUND, TEE_SUCCESS,
    };
    use ae_types::{Entrypoint, IoId, ModuleId, RuntimeError};
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Test: nothing flows before the deployer finishes
    #[test]
    fn test_press_before_deployment_is_bad_state() {
        let mut demo = Demo::new();
        let mut faults = demo.audit(AuditFilter::topics(vec![AuditTopic::Configuration]));

        assert_eq!(demo.press(&[1]), TEE_ERROR_BAD_STATE);
        assert!(demo.button.runtime_mut().activate().is_err());
        assert!(matches!(
            faults.try_recv().unwrap(),
            Some(AuditEvent::ConfigurationFault { module: BUTTON, .. })
        ));
        assert_eq!(demo.settle(), (0, 0));
    }

    /// Test: TA sessions are bound to the TA UUID
    #[test]
    fn test_foreign_uuid_cannot_open_session() {
        let mut demo = Demo::new();
        let led_uuid = demo.led.uuid();
        assert_ne!(demo.button.uuid(), led_uuid);
        assert_eq!(
            demo.button.open_session(&led_uuid),
            Err(TEE_ERROR_ITEM_NOT_FOUND)
        );
        assert_eq!(
            demo.led.open_session(&uuid::Uuid::new_v4()),
            Err(TEE_ERROR_ITEM_NOT_FOUND)
        );
    }

    /// Test: rotating a connection key mid-run
    #[test]
    fn test_key_rotation_resets_counters() {
        let mut demo = Demo::new();
        demo.deploy();
        for _ in 0..3 {
            demo.press(&MAGIC.to_le_bytes());
        }
        assert_eq!(demo.settle(), (3, 3));

        let mut sessions = demo.audit(AuditFilter::topics(vec![AuditTopic::Session]));
        demo.connect_button_led(SecretKey::generate(Encryption::ChaCha20Poly1305));

        let rotations: Vec<_> = sessions.drain();
        assert_eq!(rotations.len(), 2);
        assert!(rotations
            .iter()
            .all(|e| matches!(e, AuditEvent::SessionEstablished { rotated: true, .. })));

        // Fresh counters on both ends: sequence 0 is accepted again.
        assert_eq!(demo.press(&MAGIC.to_le_bytes()), TEE_SUCCESS);
        let message = demo.led_inbox.try_recv().unwrap();
        assert_eq!(message.sequence, 0);
        let status = demo.led.deliver(&message.encode().unwrap());
        assert!(demo.led.is_success(status));
        assert_eq!(demo.toggles.lock().len(), 4);

        // sm3 connection untouched.
        assert_eq!(pump(&mut demo.sm3, &mut demo.sm3_inbox), 1);
        assert_eq!(
            demo.button.runtime().sessions().get(SM3).unwrap().send_sequence(),
            4
        );
    }

    /// Test: attestation answers are bound to the module
    #[test]
    fn test_attestation_is_module_bound() {
        let mut demo = Demo::new();
        let challenge = random_bytes(32);

        let (status, button_tag) = tz_attest(&mut demo.button, demo.button_session, &challenge);
        assert_eq!(status, TEE_SUCCESS);
        let (_, led_tag) = tz_attest(&mut demo.led, demo.led_session, &challenge);

        assert!(demo.deployer.verify(BUTTON, &challenge, &button_tag));
        assert!(demo.deployer.verify(LED, &challenge, &led_tag));
        assert!(!demo.deployer.verify(LED, &challenge, &button_tag));
        assert!(!demo.deployer.verify(BUTTON, &random_bytes(32), &button_tag));
    }

    /// Test: sessions pre-provisioned from the deployment descriptor
    #[test]
    fn test_descriptor_driven_deployment() {
        init_tracing();
        let connection_key = hex::encode(random_bytes(32));
        let sender_key = hex::encode(random_bytes(16));
        let receiver_key = hex::encode(random_bytes(16));
        let descriptor = format!(
            r#"{{
                "nodes": [{{ "name": "node-sancus", "type": "sancus" }}],
                "modules": [
                    {{ "name": "sensor", "id": 10, "key": "{sender_key}",
                       "outputs": {{ "reading": 0 }} }},
                    {{ "name": "sm3", "id": 11, "key": "{receiver_key}",
                       "inputs": {{ "store": 1 }} }}
                ],
                "connections": [
                    {{ "from_module": "sensor", "from_output": "reading",
                       "to_module": "sm3", "to_input": "store",
                       "encryption": "chacha20poly1305", "key": "{connection_key}" }},
                    {{ "direct": true, "to_module": "sm3", "to_input": 1 }}
                ]
            }}"#
        );

        let network = InMemoryNetwork::new();
        let build = |name: &str| {
            let config = RuntimeConfig::from_descriptor_json(&descriptor, name).unwrap();
            ModuleRuntime::new(config, Arc::new(network.clone()), Arc::new(TracingAuditSink))
                .unwrap()
        };

        let mut sensor = build("sensor");
        sensor
            .register_entry(IoId(3), |payload, out| out.emit(IoId(0), payload))
            .unwrap();
        sensor.activate().unwrap();

        let received = Arc::new(Mutex::new(Vec::new()));
        let mut sm3 = build("sm3");
        let seen = received.clone();
        sm3.register_input(IoId(1), move |payload, _| seen.lock().push(payload.to_vec()))
            .unwrap();
        sm3.activate().unwrap();

        let mut inbox = network.connect(ModuleId(11));
        let mut sm3 = SancusBackend::new(sm3);

        assert_eq!(
            execute(&mut sensor, Entrypoint::User(IoId(3)), b"reading"),
            Ok(Vec::new())
        );
        assert_eq!(pump(&mut sm3, &mut inbox), 1);
        assert_eq!(*received.lock(), vec![b"reading".to_vec()]);
    }

    /// Test: a TOML-configured module rejects entries it never registered
    #[test]
    fn test_toml_configured_module() {
        let config = RuntimeConfig::from_toml_str(
            r#"
            module_id = 20
            name = "logger"
            replay_window = 32
            encryption = "chacha20poly1305"
            module_key = "0x000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f"
            "#,
        )
        .unwrap();

        let mut logger =
            ModuleRuntime::new(config, Arc::new(InMemoryNetwork::new()), Arc::new(TracingAuditSink))
                .unwrap();
        logger.activate().unwrap();
        assert_eq!(logger.sessions().window_size(), 32);

        assert_eq!(
            execute(&mut logger, Entrypoint::User(IoId(5)), b""),
            Err(RuntimeError::RoutingNotFound {
                direction: ae_types::IoDirection::Entry,
                id: IoId(5)
            })
        );
    }
}
