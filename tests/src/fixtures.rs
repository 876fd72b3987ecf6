//! Shared fixtures: a simulated deployer and the demo application.
//!
//! ```text
//!                      ┌──→ led_driver (TrustZone, 2) input 1 "toggle_led"
//! button_driver (1) ───┤
//!  entry 3 → output 0  └──→ sm3 (Sancus, 3) input 0 "input"
//! ```

use ae_audit::{AuditFilter, InMemoryAuditBus, Subscription};
use ae_crypto::{verify_attestation, Encryption, SecretKey};
use ae_runtime::{
    attest_payload, param_type, param_types, pump, set_key_payload, AuditSink, FanoutAuditSink, Inbox,
    InMemoryNetwork, ModuleRuntime, ReactiveResultCode, RuntimeConfig, SancusBackend, TeeParam,
    TeeResult, TracingAuditSink, TrustZoneBackend, TEE_SUCCESS,
};
use ae_types::{Destination, IoId, ModuleId, TAG_LEN};
use parking_lot::Mutex;
use rand::RngCore;
use std::collections::HashMap;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

pub const BUTTON: ModuleId = ModuleId(1);
pub const LED: ModuleId = ModuleId(2);
pub const SM3: ModuleId = ModuleId(3);

/// Button output.
pub const BUTTON_PRESSED: IoId = IoId(0);
/// Button user entry.
pub const PRESS: IoId = IoId(3);
/// LED input.
pub const TOGGLE_LED: IoId = IoId(1);
/// sm3 inputs.
pub const SM3_INPUT: IoId = IoId(0);
pub const SM3_INPUT2: IoId = IoId(1);

/// Value sm3 accepts as "correct".
pub const MAGIC: u32 = 33;

/// Install a subscriber honouring `RUST_LOG`. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_test_writer()
        .try_init();
}

/// Random bytes from the thread RNG.
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// Simulated deployer: owns module keys and the per-module `SetKey` nonce.
#[derive(Default)]
pub struct Deployer {
    module_keys: HashMap<ModuleId, SecretKey>,
    nonces: HashMap<ModuleId, u16>,
}

impl Deployer {
    pub fn module_key(&mut self, module: ModuleId, encryption: Encryption) -> SecretKey {
        self.module_keys
            .entry(module)
            .or_insert_with(|| SecretKey::generate(encryption))
            .clone()
    }

    /// Next `SetKey` payload for `module`, installing `session` towards `peer`.
    pub fn set_key(&mut self, module: ModuleId, peer: ModuleId, session: &SecretKey) -> Vec<u8> {
        let nonce = self.nonces.entry(module).or_insert(0);
        let payload = set_key_payload(&self.module_keys[&module], peer, *nonce, session).unwrap();
        *nonce += 1;
        payload
    }

    pub fn verify(&self, module: ModuleId, challenge: &[u8], response: &[u8]) -> bool {
        verify_attestation(&self.module_keys[&module], module, challenge, response)
    }
}

/// Invoke a TA command with the payload in slot 0 and nothing else.
pub fn tz_command(
    backend: &mut TrustZoneBackend,
    session: u32,
    command: u16,
    payload: &[u8],
) -> TeeResult {
    let mut params = [
        TeeParam::input(payload),
        TeeParam::None,
        TeeParam::None,
        TeeParam::None,
    ];
    backend.invoke_command(
        session,
        u32::from(command),
        param_types(param_type::MEMREF_INPUT, 0, 0, 0),
        &mut params,
    )
}

/// Attest a TA, returning the response tag.
pub fn tz_attest(
    backend: &mut TrustZoneBackend,
    session: u32,
    challenge: &[u8],
) -> (TeeResult, Vec<u8>) {
    let mut params = [
        TeeParam::input(&attest_payload(challenge).unwrap()),
        TeeParam::output(TAG_LEN),
        TeeParam::None,
        TeeParam::None,
    ];
    let status = backend.invoke_command(
        session,
        1,
        param_types(param_type::MEMREF_INPUT, param_type::MEMREF_OUTPUT, 0, 0),
        &mut params,
    );
    (status, params[1].bytes().unwrap_or_default().to_vec())
}

/// The three-module demo application.
pub struct Demo {
    pub network: InMemoryNetwork,
    pub bus: Arc<InMemoryAuditBus>,
    pub deployer: Deployer,
    pub button: TrustZoneBackend,
    pub led: TrustZoneBackend,
    pub sm3: SancusBackend,
    pub button_session: u32,
    pub led_session: u32,
    pub led_inbox: Inbox,
    pub sm3_inbox: Inbox,
    pub button_inbox: Inbox,
    /// Payloads the LED handler saw.
    pub toggles: Arc<Mutex<Vec<Vec<u8>>>>,
    /// `(input, value)` pairs sm3 saw.
    pub sm3_values: Arc<Mutex<Vec<(IoId, u32)>>>,
    /// Session keys by connection, as the deployer generated them.
    pub keys: HashMap<(ModuleId, ModuleId), SecretKey>,
}

impl Demo {
    /// Load all modules; nothing is keyed or active yet.
    pub fn new() -> Self {
        init_tracing();

        let network = InMemoryNetwork::new();
        let bus = Arc::new(InMemoryAuditBus::new());
        let audit: Arc<dyn AuditSink> = Arc::new(
            FanoutAuditSink::new()
                .with(bus.clone())
                .with(Arc::new(TracingAuditSink)),
        );
        let mut deployer = Deployer::default();

        let runtime = |config: RuntimeConfig| {
            ModuleRuntime::new(config, Arc::new(network.clone()), audit.clone()).unwrap()
        };

        let mut button = runtime(
            RuntimeConfig::new(BUTTON, "button_driver")
                .with_module_key(&deployer.module_key(BUTTON, Encryption::Aes128Gcm))
                .with_route(
                    BUTTON_PRESSED,
                    vec![
                        Destination::new(LED, TOGGLE_LED),
                        Destination::new(SM3, SM3_INPUT),
                    ],
                ),
        );
        button
            .register_entry(PRESS, |payload, out| out.emit(BUTTON_PRESSED, payload))
            .unwrap();

        let toggles = Arc::new(Mutex::new(Vec::new()));
        let mut led = runtime(
            RuntimeConfig::new(LED, "led_driver")
                .with_module_key(&deployer.module_key(LED, Encryption::Aes128Gcm)),
        );
        let seen = toggles.clone();
        led.register_input(TOGGLE_LED, move |payload, _| seen.lock().push(payload.to_vec()))
            .unwrap();

        let sm3_values = Arc::new(Mutex::new(Vec::new()));
        let mut sm3 = runtime(
            RuntimeConfig::new(SM3, "sm3")
                .with_module_key(&deployer.module_key(SM3, Encryption::ChaCha20Poly1305)),
        );
        for input in [SM3_INPUT, SM3_INPUT2] {
            let seen = sm3_values.clone();
            sm3.register_input(input, move |payload, _| {
                if let Some(head) = payload.get(..4) {
                    let mut raw = [0u8; 4];
                    raw.copy_from_slice(head);
                    seen.lock().push((input, u32::from_le_bytes(raw)));
                }
            })
            .unwrap();
        }

        let led_inbox = network.connect(LED);
        let sm3_inbox = network.connect(SM3);
        let button_inbox = network.connect(BUTTON);

        let mut button = TrustZoneBackend::new(button);
        let mut led = TrustZoneBackend::new(led);
        let button_session = button.open_session(&button.uuid()).unwrap();
        let led_session = led.open_session(&led.uuid()).unwrap();

        Self {
            network,
            bus,
            deployer,
            button,
            led,
            sm3: SancusBackend::new(sm3),
            button_session,
            led_session,
            led_inbox,
            sm3_inbox,
            button_inbox,
            toggles,
            sm3_values,
            keys: HashMap::new(),
        }
    }

    /// Subscribe to the audit bus.
    pub fn audit(&self, filter: AuditFilter) -> Subscription {
        self.bus.subscribe(filter)
    }

    /// Key both connections, attest every module, activate.
    pub fn deploy(&mut self) {
        self.connect_button_led(SecretKey::generate(Encryption::Aes128Gcm));
        self.connect_button_sm3(SecretKey::generate(Encryption::ChaCha20Poly1305));

        for (module, status) in [
            (BUTTON, self.attest_tz(BUTTON)),
            (LED, self.attest_tz(LED)),
            (SM3, self.attest_sm3()),
        ] {
            assert!(status, "attestation of {module} failed");
        }

        self.button.runtime_mut().activate().unwrap();
        self.led.runtime_mut().activate().unwrap();
        self.sm3.runtime_mut().activate().unwrap();
        tracing::debug!(modules = 3, "Demo deployed");
    }

    /// Install `key` on both ends of button → LED.
    pub fn connect_button_led(&mut self, key: SecretKey) {
        let to_button = self.deployer.set_key(BUTTON, LED, &key);
        let to_led = self.deployer.set_key(LED, BUTTON, &key);
        assert_eq!(tz_command(&mut self.button, self.button_session, 0, &to_button), TEE_SUCCESS);
        assert_eq!(tz_command(&mut self.led, self.led_session, 0, &to_led), TEE_SUCCESS);
        self.keys.insert((BUTTON, LED), key);
    }

    /// Install `key` on both ends of button → sm3.
    pub fn connect_button_sm3(&mut self, key: SecretKey) {
        let to_button = self.deployer.set_key(BUTTON, SM3, &key);
        let to_sm3 = self.deployer.set_key(SM3, BUTTON, &key);
        assert_eq!(tz_command(&mut self.button, self.button_session, 0, &to_button), TEE_SUCCESS);
        assert_eq!(self.sm3.call(0, &to_sm3).0, ReactiveResultCode::Ok);
        self.keys.insert((BUTTON, SM3), key);
    }

    fn attest_tz(&mut self, module: ModuleId) -> bool {
        let challenge = random_bytes(32);
        let (backend, session) = if module == BUTTON {
            (&mut self.button, self.button_session)
        } else {
            (&mut self.led, self.led_session)
        };
        let (status, tag) = tz_attest(backend, session, &challenge);
        status == TEE_SUCCESS && self.deployer.verify(module, &challenge, &tag)
    }

    fn attest_sm3(&mut self) -> bool {
        let challenge = random_bytes(16);
        let (code, tag) = self.sm3.call(1, &attest_payload(&challenge).unwrap());
        code == ReactiveResultCode::Ok && self.deployer.verify(SM3, &challenge, &tag)
    }

    /// Press the button with `payload` as event data.
    pub fn press(&mut self, payload: &[u8]) -> TeeResult {
        let session = self.button_session;
        let mut params = [
            TeeParam::input(payload),
            TeeParam::None,
            TeeParam::None,
            TeeParam::None,
        ];
        self.button.invoke_command(
            session,
            u32::from(PRESS.0),
            param_types(param_type::MEMREF_INPUT, 0, 0, 0),
            &mut params,
        )
    }

    /// Deliver everything queued for LED and sm3.
    pub fn settle(&mut self) -> (usize, usize) {
        (
            pump(&mut self.led, &mut self.led_inbox),
            pump(&mut self.sm3, &mut self.sm3_inbox),
        )
    }
}
