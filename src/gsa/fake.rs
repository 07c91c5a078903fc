// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process GrandSlam server for handshake tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{aes::Aes256, AesGcm, Nonce};
use async_trait::async_trait;
use plist::{Dictionary, Value};
use url::Url;

use super::endpoints::tests::{lookup_body, LOOKUP_URL};
use super::two_factor::{SecondFactorPrompt, TwoFactorMode};
use super::GsaClient;
use crate::anisette::tests::{sample_anisette, sample_device};
use crate::anisette::StaticAnisetteProvider;
use crate::error::Result;
use crate::http::mock::MockTransport;
use crate::http::{HttpRequest, HttpResponse};
use crate::plist_ext::{parse_dictionary, to_xml_bytes, DictionaryExt};
use crate::srp::test_server::TestSrpServer;
use crate::srp::{PasswordProtocol, Transcript};

const USERNAME: &str = "user@example.com";
const PASSWORD: &str = "correct horse battery";
const ADSID: &str = "000742-05-8c3a7e52";
const IDMS_TOKEN: &str = "idms-token";
const CODE: &str = "123456";
const XCODE_TOKEN: &str = "xcode-app-token";
pub(crate) const XCODE_TOKEN_EXPIRY_MS: i64 = 1_900_000_000_000;

type Aes256Gcm16 = AesGcm<Aes256, U16>;

#[derive(Debug, Clone)]
pub(crate) struct FakeGsaOptions {
    pub(crate) protocol: PasswordProtocol,
    pub(crate) second_factor: Option<TwoFactorMode>,
    /// Challenge again on the restarted handshake.
    pub(crate) always_second_factor: bool,
    pub(crate) continuation: Option<Vec<u8>>,
    pub(crate) tamper_negotiation_proof: bool,
    pub(crate) issue_xcode_token: bool,
}

impl Default for FakeGsaOptions {
    fn default() -> Self {
        Self {
            protocol: PasswordProtocol::S2k,
            second_factor: None,
            always_second_factor: false,
            continuation: None,
            tamper_negotiation_proof: false,
            issue_xcode_token: true,
        }
    }
}

struct Exchange {
    server: TestSrpServer,
    client_public: Vec<u8>,
    transcript: Transcript,
}

#[derive(Default)]
struct State {
    exchange: Option<Exchange>,
    second_factor_passed: bool,
    client_publics: Vec<Vec<u8>>,
    paths: Vec<String>,
    sms_phone_number_ids: Vec<String>,
    session_key: Vec<u8>,
}

pub(crate) struct FakeGsa {
    options: FakeGsaOptions,
    state: Mutex<State>,
    inits: AtomicUsize,
    transport: Arc<MockTransport>,
}

impl FakeGsa {
    pub(crate) fn new(options: FakeGsaOptions) -> Arc<Self> {
        Arc::new_cyclic(|weak: &std::sync::Weak<FakeGsa>| {
            let weak = weak.clone();
            let transport = MockTransport::new(move |request| match weak.upgrade() {
                Some(fake) => fake.handle(request),
                None => Ok(HttpResponse::new(503, "gone")),
            });
            FakeGsa {
                options,
                state: Mutex::new(State::default()),
                inits: AtomicUsize::new(0),
                transport: Arc::new(transport),
            }
        })
    }

    pub(crate) fn client(&self) -> GsaClient {
        GsaClient::new(
            self.transport.clone(),
            Arc::new(StaticAnisetteProvider::new(sample_anisette())),
            sample_device(),
            LOOKUP_URL,
        )
    }

    pub(crate) fn username(&self) -> &'static str {
        USERNAME
    }

    pub(crate) fn password(&self) -> &'static str {
        PASSWORD
    }

    pub(crate) fn adsid(&self) -> &'static str {
        ADSID
    }

    pub(crate) fn idms_token(&self) -> &'static str {
        IDMS_TOKEN
    }

    pub(crate) fn verification_code(&self) -> &'static str {
        CODE
    }

    pub(crate) fn xcode_token(&self) -> &'static str {
        XCODE_TOKEN
    }

    pub(crate) fn init_count(&self) -> usize {
        self.inits.load(Ordering::SeqCst)
    }

    pub(crate) fn session_key(&self) -> Vec<u8> {
        self.state.lock().unwrap().session_key.clone()
    }

    pub(crate) fn client_public_values(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().client_publics.clone()
    }

    /// Request paths in arrival order; operations are tagged `:<o>`.
    pub(crate) fn paths(&self) -> Vec<String> {
        self.state.lock().unwrap().paths.clone()
    }

    pub(crate) fn sms_phone_number_ids(&self) -> Vec<String> {
        self.state.lock().unwrap().sms_phone_number_ids.clone()
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.transport.requests()
    }

    fn handle(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let url = Url::parse(&request.url).unwrap();
        let path = url.path().to_string();
        if request.url == LOOKUP_URL {
            self.record("/lookup".into());
            return Ok(HttpResponse::new(200, lookup_body()));
        }
        match path.as_str() {
            "/gsService" => self.operation(request),
            "/trustedDeviceSecondaryAuth" => {
                self.record(path);
                Ok(HttpResponse::new(200, Vec::new()))
            }
            "/validateCode" => {
                self.record(path);
                let code = request.header_value("security-code").unwrap_or_default();
                Ok(self.validate(code))
            }
            "/auth/verify/phone/put" => {
                self.record(path);
                let body = parse_dictionary(request.body.as_deref().unwrap(), "sms").unwrap();
                self.record_phone_number(&body);
                Ok(HttpResponse::new(200, Vec::new()))
            }
            "/auth/verify/phone/securitycode" => {
                self.record(path);
                let body = parse_dictionary(request.body.as_deref().unwrap(), "sms").unwrap();
                self.record_phone_number(&body);
                let code = body.required_string("securityCode.code").unwrap().to_string();
                Ok(self.validate(&code))
            }
            other => Ok(HttpResponse::new(404, format!("no route for {other}"))),
        }
    }

    fn record(&self, path: String) {
        self.state.lock().unwrap().paths.push(path);
    }

    fn record_phone_number(&self, body: &Dictionary) {
        let id = body
            .required_dictionary("serverInfo")
            .unwrap()
            .required_string("phoneNumber.id")
            .unwrap()
            .to_string();
        self.state.lock().unwrap().sms_phone_number_ids.push(id);
    }

    fn validate(&self, code: &str) -> HttpResponse {
        if code == CODE {
            self.state.lock().unwrap().second_factor_passed = true;
            HttpResponse::new(200, status_body(0, ""))
        } else {
            HttpResponse::new(400, status_body(-21669, "Incorrect verification code."))
        }
    }

    fn operation(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let envelope = parse_dictionary(request.body.as_deref().unwrap(), "envelope").unwrap();
        let body = envelope.required_dictionary("Request").unwrap();
        let operation = body.required_string("o").unwrap().to_string();
        self.record(format!("/gsService:{operation}"));

        let payload = match operation.as_str() {
            "init" => self.init(body),
            "complete" => self.complete(body),
            "apptokens" => self.app_tokens(body),
            other => panic!("unexpected operation {other}"),
        };
        let mut root = Dictionary::new();
        root.insert("Response".into(), Value::Dictionary(payload));
        Ok(HttpResponse::new(200, to_xml_bytes(root).unwrap()))
    }

    fn init(&self, body: &Dictionary) -> Dictionary {
        self.inits.fetch_add(1, Ordering::SeqCst);
        assert_eq!(body.required_string("u").unwrap(), USERNAME);
        let client_public = body.required_data("A2k").unwrap().to_vec();

        let salt = vec![0x5a; 16];
        let iterations = 1000;
        let server = TestSrpServer::new(USERNAME, PASSWORD, &salt, iterations, self.options.protocol);

        let mut transcript = Transcript::new();
        transcript.add_str("s2k,s2k_fo");
        transcript.add_str("|");
        transcript.add_str("|");
        transcript.add_str(self.options.protocol.name());

        let mut payload = status_dictionary(0, "");
        payload.insert("sp".into(), Value::String(self.options.protocol.name().into()));
        payload.insert("c".into(), Value::String("init-cookie".into()));
        payload.insert("s".into(), Value::Data(salt));
        payload.insert("i".into(), Value::Integer(iterations.into()));
        payload.insert("B".into(), Value::Data(server.public_value()));

        let mut state = self.state.lock().unwrap();
        state.client_publics.push(client_public.clone());
        state.exchange = Some(Exchange {
            server,
            client_public,
            transcript,
        });
        payload
    }

    fn complete(&self, body: &Dictionary) -> Dictionary {
        assert_eq!(body.required_string("c").unwrap(), "init-cookie");
        let m1 = body.required_data("M1").unwrap().to_vec();

        let mut state = self.state.lock().unwrap();
        let second_factor_passed = state.second_factor_passed;
        let Some(mut exchange) = state.exchange.take() else {
            return status_dictionary(-22406, "complete without init");
        };
        let Some(m2) = exchange.server.verify_client(&exchange.client_public, &m1) else {
            return status_dictionary(-20101, "Your Apple ID or password was incorrect.");
        };
        let session_key = exchange.server.session_key().unwrap().to_vec();
        state.session_key = session_key.clone();

        let challenge = match self.options.second_factor {
            Some(mode) if self.options.always_second_factor || !second_factor_passed => Some(mode),
            _ => None,
        };

        let mut login = Dictionary::new();
        login.insert("adsid".into(), Value::String(ADSID.into()));
        login.insert("GsIdmsToken".into(), Value::String(IDMS_TOKEN.into()));
        login.insert("sk".into(), Value::Data(session_key));
        login.insert("c".into(), Value::Data(b"session-cookie".to_vec()));
        match challenge {
            Some(mode) => {
                let url = match mode {
                    TwoFactorMode::TrustedDevice => "trustedDeviceSecondaryAuth",
                    TwoFactorMode::Sms => "secondaryAuth",
                };
                login.insert("status-code".into(), Value::Integer(409.into()));
                login.insert("url".into(), Value::String(url.into()));
            }
            None => {
                login.insert("status-code".into(), Value::Integer(200.into()));
            }
        }
        let spd = exchange.server.encrypt_payload(&to_xml_bytes(login).unwrap());

        exchange.transcript.add_str("|");
        exchange.transcript.add_data(&spd);
        exchange.transcript.add_str("|");
        if let Some(sc) = &self.options.continuation {
            exchange.transcript.add_data(sc);
        }
        exchange.transcript.add_str("|");
        let mut np = exchange.server.negotiation_proof(&exchange.transcript.digest());
        if self.options.tamper_negotiation_proof {
            np[0] ^= 0xff;
        }

        let mut payload = status_dictionary(0, "");
        payload.insert("M2".into(), Value::Data(m2));
        payload.insert("spd".into(), Value::Data(spd));
        payload.insert("np".into(), Value::Data(np));
        if let Some(sc) = &self.options.continuation {
            payload.insert("sc".into(), Value::Data(sc.clone()));
        }
        payload
    }

    fn app_tokens(&self, body: &Dictionary) -> Dictionary {
        assert_eq!(body.required_string("u").unwrap(), ADSID);
        assert_eq!(body.required_string("t").unwrap(), IDMS_TOKEN);
        let session_key = self.session_key();

        let apps: Vec<String> = body
            .get("app")
            .and_then(Value::as_array)
            .unwrap()
            .iter()
            .filter_map(Value::as_string)
            .map(str::to_string)
            .collect();
        let expected =
            super::app_tokens::checksum(&session_key, ADSID, &apps).unwrap();
        if body.required_data("checksum").unwrap() != expected.as_slice() {
            return status_dictionary(-22421, "checksum mismatch");
        }

        let mut tokens = Dictionary::new();
        if self.options.issue_xcode_token {
            for app in &apps {
                let mut token = Dictionary::new();
                token.insert("token".into(), Value::String(XCODE_TOKEN.into()));
                token.insert("expiry".into(), Value::Integer(XCODE_TOKEN_EXPIRY_MS.into()));
                tokens.insert(app.clone(), Value::Dictionary(token));
            }
        }
        let mut plaintext = Dictionary::new();
        plaintext.insert("t".into(), Value::Dictionary(tokens));

        let mut payload = status_dictionary(0, "");
        payload.insert(
            "et".into(),
            Value::Data(seal_tokens(&session_key, &to_xml_bytes(plaintext).unwrap())),
        );
        payload
    }
}

/// `aad(3) | nonce(16) | ciphertext | tag(16)`
pub(crate) fn seal_tokens(key: &[u8], plaintext: &[u8]) -> Vec<u8> {
    let aad = b"XYZ";
    let nonce = [0x42u8; 16];
    let cipher = Aes256Gcm16::new_from_slice(key).unwrap();
    let sealed = cipher
        .encrypt(
            Nonce::<U16>::from_slice(&nonce),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .unwrap();
    let mut out = aad.to_vec();
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    out
}

fn status_dictionary(code: i64, message: &str) -> Dictionary {
    let mut status = Dictionary::new();
    status.insert("ec".into(), Value::Integer(code.into()));
    status.insert("em".into(), Value::String(message.into()));
    let mut payload = Dictionary::new();
    payload.insert("Status".into(), Value::Dictionary(status));
    payload
}

fn status_body(code: i64, message: &str) -> Vec<u8> {
    to_xml_bytes(status_dictionary(code, message)).unwrap()
}

/// Prompt returning a fixed answer and counting calls.
pub(crate) struct FixedPrompt {
    code: Option<String>,
    calls: AtomicUsize,
}

impl FixedPrompt {
    pub(crate) fn code(code: &str) -> Self {
        Self {
            code: Some(code.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn none() -> Self {
        Self {
            code: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecondFactorPrompt for FixedPrompt {
    async fn fetch_code(&self) -> Option<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.code.clone()
    }
}
