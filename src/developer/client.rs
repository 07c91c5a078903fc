// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP implementation of [`DeveloperServices`].
//!
//! Two wire surfaces share one set of authentication headers:
//!
//! - **JSON:API** (`/v1/...`): certificates, devices, bundle IDs,
//!   capabilities, profiles. Reads and deletes are tunnelled as `POST` with
//!   `X-HTTP-Method-Override` and the query in the body; writes get
//!   `data.attributes.teamId` injected.
//! - **Legacy plist** (`/QH65B2/<action>.action`): teams and app groups.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use plist::{Dictionary, Value as PlistValue};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use url::Url;
use uuid::Uuid;

use super::models::{
    AppGroup, BundleId, BundleIdAttributes, Capability, CapabilityAttributes, CapabilitySetting,
    CapabilityType, CertificateAttributes, CertificateRecord, Device, DeviceAttributes,
    DeviceRegistration, Document, ProfileAttributes, ProfileRecord, Resource, Team,
};
use super::DeveloperServices;
use crate::anisette::{
    AnisetteProvider, DeviceInfo, CLIENT_INFO_HEADER, DEVICE_ID_HEADER, XCODE_VERSION_HEADER,
};
use crate::config::ClientConfig;
use crate::error::{Error, OperationError, ReconciliationError, Result};
use crate::gsa::two_factor::APP_INFO;
use crate::gsa::{DeveloperLoginToken, GsaClient};
use crate::http::{HttpRequest, HttpResponse, HttpTransport, Method};
use crate::plist_ext::{parse_dictionary, to_xml_bytes, DictionaryExt};

const JSON_API_CONTENT_TYPE: &str = "application/vnd.api+json";
const PLIST_CONTENT_TYPE: &str = "text/x-xml-plist";
const METHOD_OVERRIDE_HEADER: &str = "X-HTTP-Method-Override";

const PROTOCOL_VERSION: &str = "QH65B2";
const CLIENT_ID: &str = "XABBG36SBA";
const PLATFORM: &str = "ios";

/// Xcode build advertised to developer services.
const XCODE_VERSION: &str = "16.2 (16C5031c)";

const CERTIFICATE_TYPE: &str = "DEVELOPMENT";
const PROFILE_TYPE: &str = "IOS_APP_DEVELOPMENT";
const PAGE_LIMIT: &str = "200";

/// Developer services over HTTP, authenticated with an Xcode login token.
#[derive(Clone)]
pub struct DeveloperServicesClient {
    transport: Arc<dyn HttpTransport>,
    anisette: Arc<dyn AnisetteProvider>,
    device: DeviceInfo,
    token: DeveloperLoginToken,
    team_id: Option<String>,
    base_url: String,
}

impl DeveloperServicesClient {
    /// Client sharing `gsa`'s transport, device and attestation source.
    ///
    /// Only [`DeveloperServices::list_teams`] works until a team is chosen
    /// with [`Self::with_team`].
    pub fn new(gsa: &GsaClient, token: DeveloperLoginToken, base_url: impl Into<String>) -> Self {
        Self {
            transport: gsa.transport().clone(),
            anisette: gsa.anisette_provider().clone(),
            device: gsa.device().clone(),
            token,
            team_id: None,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(gsa: &GsaClient, token: DeveloperLoginToken, config: &ClientConfig) -> Self {
        Self::new(gsa, token, config.developer_services_url.as_str())
    }

    pub fn with_team(mut self, team_id: impl Into<String>) -> Self {
        self.team_id = Some(team_id.into());
        self
    }

    pub fn team_id(&self) -> Option<&str> {
        self.team_id.as_deref()
    }

    fn require_team(&self) -> Result<&str> {
        self.team_id
            .as_deref()
            .ok_or_else(|| ReconciliationError::TeamNotFound("(none selected)".into()).into())
    }

    async fn authenticated(&self, request: HttpRequest, content_type: &str) -> Result<HttpRequest> {
        let anisette = self.anisette.fetch(&self.device).await?;
        Ok(request
            .header("Accept", content_type)
            .header("Content-Type", content_type)
            .header("Accept-Language", "en-US, en")
            .header("User-Agent", "Xcode")
            .header(XCODE_VERSION_HEADER, XCODE_VERSION)
            .header(CLIENT_INFO_HEADER, self.device.client_info())
            .header(DEVICE_ID_HEADER, self.device.device_id.clone())
            .header("X-Apple-App-Info", APP_INFO)
            .header("X-Apple-I-Identity-Id", self.token.adsid.clone())
            .header("X-Apple-GS-Token", self.token.token.clone())
            .headers(anisette.headers()))
    }

    // -------------------------------------------------------------------------
    // JSON:API
    // -------------------------------------------------------------------------

    /// Send one JSON:API call and return the raw response, whatever its
    /// status.
    async fn send_json(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<Value>,
    ) -> Result<(String, HttpResponse)> {
        let team_id = self.require_team()?;
        let url = format!("{}/v1/{}", self.base_url, path.trim_start_matches('/'));

        let (request, body) = match method {
            Method::Get | Method::Delete => {
                let mut encoded = url::form_urlencoded::Serializer::new(String::new());
                for (key, value) in query {
                    encoded.append_pair(key, value);
                }
                encoded.append_pair("teamId", team_id);
                let body = json!({ "urlEncodedQueryParams": encoded.finish() });
                let request = HttpRequest::new(Method::Post, url.as_str())
                    .header(METHOD_OVERRIDE_HEADER, method.as_str());
                (request, body)
            }
            Method::Post | Method::Patch | Method::Put => {
                let body = with_team_attribute(body.unwrap_or_else(|| json!({})), team_id)?;
                (HttpRequest::new(method, url.as_str()), body)
            }
        };

        let request = self
            .authenticated(request, JSON_API_CONTENT_TYPE)
            .await?
            .body(serde_json::to_vec(&body)?);
        debug!(%method, path, "Sending developer services request");
        let response = self.transport.send(request).await?;
        Ok((url, response))
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<Value>,
    ) -> Result<T> {
        let (url, response) = self.send_json(method, path, query, body).await?;
        let response = check_json_api(response, &url)?;
        Ok(serde_json::from_slice(&response.body)?)
    }

    async fn execute(&self, method: Method, path: &str) -> Result<()> {
        let (url, response) = self.send_json(method, path, &[], None).await?;
        check_json_api(response, &url).map(|_| ())
    }

    /// Fetch every page of a collection by following `links.next`.
    async fn fetch_all<A: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<Resource<A>>> {
        let mut query: Vec<(String, String)> = query
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .chain(std::iter::once(("limit".to_string(), PAGE_LIMIT.to_string())))
            .collect();
        let mut path = path.to_string();
        let mut resources = Vec::new();

        loop {
            let borrowed: Vec<(&str, &str)> = query
                .iter()
                .map(|(key, value)| (key.as_str(), value.as_str()))
                .collect();
            let page: Page<A> = self.fetch(Method::Get, &path, &borrowed, None).await?;
            resources.extend(page.data);

            let Some(next) = page.links.and_then(|links| links.next) else {
                break;
            };
            (path, query) = split_next_link(&next)?;
        }
        Ok(resources)
    }

    // -------------------------------------------------------------------------
    // Legacy plist API
    // -------------------------------------------------------------------------

    async fn legacy(&self, action: &str, mut params: Dictionary) -> Result<Dictionary> {
        let url = format!(
            "{}/{PROTOCOL_VERSION}/{action}.action?clientId={CLIENT_ID}",
            self.base_url
        );
        params.insert(
            "requestId".into(),
            PlistValue::String(Uuid::new_v4().to_string().to_uppercase()),
        );
        params.insert("clientId".into(), PlistValue::String(CLIENT_ID.into()));
        params.insert("protocolVersion".into(), PlistValue::String(PROTOCOL_VERSION.into()));
        params.insert(
            "userLocale".into(),
            PlistValue::Array(vec![PlistValue::String("en_US".into())]),
        );

        let request = self
            .authenticated(HttpRequest::new(Method::Post, url.as_str()), PLIST_CONTENT_TYPE)
            .await?
            .body(to_xml_bytes(params)?);
        debug!(action, "Sending legacy developer services request");
        let response = self.transport.send(request).await?.error_for_status(&url)?;
        let payload = parse_dictionary(&response.body, "developer services response")?;
        check_result_code(&payload)?;
        Ok(payload)
    }

    /// Platform-scoped legacy action: `ios/<action>` with the team attached.
    async fn legacy_team_action(&self, action: &str, mut params: Dictionary) -> Result<Dictionary> {
        params.insert("teamId".into(), PlistValue::String(self.require_team()?.into()));
        params.insert("DTDK_Platform".into(), PlistValue::String(PLATFORM.into()));
        self.legacy(&format!("{PLATFORM}/{action}"), params).await
    }
}

impl fmt::Debug for DeveloperServicesClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeveloperServicesClient")
            .field("base_url", &self.base_url)
            .field("team_id", &self.team_id)
            .field("adsid", &self.token.adsid)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl DeveloperServices for DeveloperServicesClient {
    async fn list_teams(&self) -> Result<Vec<Team>> {
        let payload = self.legacy("listTeams", Dictionary::new()).await?;
        dictionaries(&payload, "teams")?
            .into_iter()
            .map(Team::from_plist)
            .collect()
    }

    async fn list_certificates(&self) -> Result<Vec<CertificateRecord>> {
        self.fetch_all::<CertificateAttributes>(
            "certificates",
            &[("filter[certificateType]", CERTIFICATE_TYPE)],
        )
        .await?
        .into_iter()
        .map(CertificateRecord::from_resource)
        .collect()
    }

    async fn create_certificate(&self, csr_pem: &str) -> Result<CertificateRecord> {
        let body = json!({
            "data": {
                "type": "certificates",
                "attributes": {
                    "csrContent": csr_pem,
                    "certificateType": CERTIFICATE_TYPE,
                }
            }
        });
        let document: Document<Resource<CertificateAttributes>> =
            self.fetch(Method::Post, "certificates", &[], Some(body)).await?;
        CertificateRecord::from_resource(document.data)
    }

    async fn revoke_certificate(&self, id: &str) -> Result<()> {
        self.execute(Method::Delete, &format!("certificates/{id}")).await
    }

    async fn list_devices(&self) -> Result<Vec<Device>> {
        Ok(self
            .fetch_all::<DeviceAttributes>("devices", &[])
            .await?
            .into_iter()
            .map(Device::from_resource)
            .collect())
    }

    async fn register_device(&self, name: &str, udid: &str) -> Result<DeviceRegistration> {
        let body = json!({
            "data": {
                "type": "devices",
                "attributes": { "name": name, "platform": "IOS", "udid": udid }
            }
        });
        let (url, response) = self.send_json(Method::Post, "devices", &[], Some(body)).await?;
        if response.status == 409 {
            return Ok(DeviceRegistration::AlreadyRegistered);
        }
        let response = check_json_api(response, &url)?;
        let document: Document<Resource<DeviceAttributes>> = serde_json::from_slice(&response.body)?;
        Ok(DeviceRegistration::Created(Device::from_resource(document.data)))
    }

    async fn find_bundle_ids(&self, identifier: &str) -> Result<Vec<BundleId>> {
        Ok(self
            .fetch_all::<BundleIdAttributes>(
                "bundleIds",
                &[
                    ("filter[identifier]", identifier),
                    ("include", "profiles"),
                    ("fields[profiles]", "bundleId"),
                ],
            )
            .await?
            .into_iter()
            .map(BundleId::from_resource)
            .collect())
    }

    async fn create_bundle_id(&self, name: &str, identifier: &str) -> Result<BundleId> {
        let body = json!({
            "data": {
                "type": "bundleIds",
                "attributes": { "name": name, "platform": "IOS", "identifier": identifier }
            }
        });
        let document: Document<Resource<BundleIdAttributes>> =
            self.fetch(Method::Post, "bundleIds", &[], Some(body)).await?;
        Ok(BundleId::from_resource(document.data))
    }

    async fn list_capabilities(&self, bundle_id: &str) -> Result<Vec<Capability>> {
        Ok(self
            .fetch_all::<CapabilityAttributes>(&format!("bundleIds/{bundle_id}/bundleIdCapabilities"), &[])
            .await?
            .into_iter()
            .filter_map(Capability::from_resource)
            .collect())
    }

    async fn create_capability(
        &self,
        bundle_id: &str,
        capability_type: &CapabilityType,
        settings: &[CapabilitySetting],
    ) -> Result<Capability> {
        let body = json!({
            "data": {
                "type": "bundleIdCapabilities",
                "attributes": { "capabilityType": capability_type, "settings": settings },
                "relationships": {
                    "bundleId": { "data": { "type": "bundleIds", "id": bundle_id } },
                    "capability": { "data": { "type": "capabilities", "id": capability_type } }
                }
            }
        });
        let document: Document<Resource<CapabilityAttributes>> =
            self.fetch(Method::Post, "bundleIdCapabilities", &[], Some(body)).await?;
        Capability::from_resource(document.data)
            .ok_or_else(|| Error::decode("capability", "reply has no capability type"))
    }

    async fn update_capability(
        &self,
        capability_id: &str,
        capability_type: &CapabilityType,
        settings: &[CapabilitySetting],
    ) -> Result<()> {
        let body = json!({
            "data": {
                "type": "bundleIdCapabilities",
                "id": capability_id,
                "attributes": { "capabilityType": capability_type, "settings": settings }
            }
        });
        let (url, response) = self
            .send_json(Method::Patch, &format!("bundleIdCapabilities/{capability_id}"), &[], Some(body))
            .await?;
        check_json_api(response, &url).map(|_| ())
    }

    async fn delete_capability(&self, capability_id: &str) -> Result<()> {
        self.execute(Method::Delete, &format!("bundleIdCapabilities/{capability_id}"))
            .await
    }

    async fn delete_profile(&self, profile_id: &str) -> Result<()> {
        self.execute(Method::Delete, &format!("profiles/{profile_id}")).await
    }

    async fn create_profile(
        &self,
        name: &str,
        bundle_id: &str,
        certificate_ids: &[String],
        device_ids: &[String],
    ) -> Result<ProfileRecord> {
        let linkage = |kind: &str, ids: &[String]| -> Value {
            Value::Array(ids.iter().map(|id| json!({ "type": kind, "id": id })).collect())
        };
        let body = json!({
            "data": {
                "type": "profiles",
                "attributes": { "name": name, "profileType": PROFILE_TYPE },
                "relationships": {
                    "bundleId": { "data": { "type": "bundleIds", "id": bundle_id } },
                    "certificates": { "data": linkage("certificates", certificate_ids) },
                    "devices": { "data": linkage("devices", device_ids) }
                }
            }
        });
        let document: Document<Resource<ProfileAttributes>> =
            self.fetch(Method::Post, "profiles", &[], Some(body)).await?;
        ProfileRecord::from_resource(document.data)
    }

    async fn list_app_groups(&self) -> Result<Vec<AppGroup>> {
        let payload = self
            .legacy_team_action("listApplicationGroups", Dictionary::new())
            .await?;
        dictionaries(&payload, "applicationGroupList")?
            .into_iter()
            .map(AppGroup::from_plist)
            .collect()
    }

    async fn create_app_group(&self, name: &str, identifier: &str) -> Result<AppGroup> {
        let mut params = Dictionary::new();
        params.insert("name".into(), PlistValue::String(name.into()));
        params.insert("identifier".into(), PlistValue::String(identifier.into()));
        let payload = self.legacy_team_action("addApplicationGroup", params).await?;
        AppGroup::from_plist(payload.required_dictionary("applicationGroup")?)
    }

    async fn assign_app_group(&self, bundle_id: &str, group_id: &str) -> Result<()> {
        let mut params = Dictionary::new();
        params.insert("appIdId".into(), PlistValue::String(bundle_id.into()));
        params.insert("applicationGroups".into(), PlistValue::String(group_id.into()));
        self.legacy_team_action("assignApplicationGroupToAppId", params)
            .await
            .map(|_| ())
    }
}

#[derive(Debug, Deserialize)]
struct Page<A> {
    data: Vec<Resource<A>>,
    links: Option<PageLinks>,
}

#[derive(Debug, Deserialize)]
struct PageLinks {
    next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorDocument {
    #[serde(default)]
    errors: Vec<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    status: Option<String>,
    code: Option<String>,
    title: Option<String>,
    detail: Option<String>,
}

/// Insert `teamId` into `data.attributes`, creating the objects if absent.
fn with_team_attribute(mut body: Value, team_id: &str) -> Result<Value> {
    let malformed = || Error::decode("request body", "expected a JSON object");
    let root = body.as_object_mut().ok_or_else(malformed)?;
    let data = root
        .entry("data")
        .or_insert_with(|| json!({}))
        .as_object_mut()
        .ok_or_else(malformed)?;
    let attributes = data
        .entry("attributes")
        .or_insert_with(|| json!({}))
        .as_object_mut()
        .ok_or_else(malformed)?;
    attributes.insert("teamId".into(), Value::String(team_id.into()));
    Ok(body)
}

/// Map a JSON:API error document to [`OperationError`]; anything else that
/// is not a success stays an HTTP status error.
fn check_json_api(response: HttpResponse, url: &str) -> Result<HttpResponse> {
    if response.is_success() {
        return Ok(response);
    }
    let document: ErrorDocument = serde_json::from_slice(&response.body).unwrap_or_default();
    match document.errors.into_iter().next() {
        Some(error) => {
            let code = error
                .status
                .as_deref()
                .and_then(|status| status.parse().ok())
                .unwrap_or(i64::from(response.status));
            let message = error
                .detail
                .or(error.title)
                .or(error.code)
                .unwrap_or_default();
            Err(OperationError::new(code, message).into())
        }
        None => response.error_for_status(url),
    }
}

/// `resultCode` may be an integer or a numeric string; zero is success.
fn check_result_code(payload: &Dictionary) -> Result<()> {
    let code = payload.optional_integer("resultCode").unwrap_or(0);
    if code == 0 {
        return Ok(());
    }
    let message = payload
        .optional_string("userString")
        .or_else(|| payload.optional_string("resultString"))
        .unwrap_or_default();
    Err(OperationError::new(code, message).into())
}

fn dictionaries<'a>(payload: &'a Dictionary, key: &'static str) -> Result<Vec<&'a Dictionary>> {
    payload
        .get(key)
        .and_then(PlistValue::as_array)
        .ok_or(crate::error::ProtocolError::MissingField(key))?
        .iter()
        .map(|entry| {
            entry
                .as_dictionary()
                .ok_or_else(|| Error::decode("developer services response", format!("`{key}` entry is not a dictionary")))
        })
        .collect()
}

/// Split an absolute `links.next` URL into the path below `/v1/` and its
/// query pairs, minus `teamId` which every request adds back.
fn split_next_link(next: &str) -> Result<(String, Vec<(String, String)>)> {
    let url = Url::parse(next).map_err(|e| Error::decode("pagination link", e))?;
    let path = url
        .path()
        .split_once("/v1/")
        .map(|(_, rest)| rest.to_string())
        .ok_or_else(|| Error::decode("pagination link", "not a /v1/ URL"))?;
    let query = url
        .query_pairs()
        .filter(|(key, _)| key != "teamId")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    Ok((path, query))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::{DateTime, Utc};

    use super::*;
    use crate::anisette::tests::{sample_anisette, sample_device};
    use crate::anisette::StaticAnisetteProvider;
    use crate::http::mock::MockTransport;

    const BASE: &str = "https://developer.test/services";

    fn client_with(
        handler: impl FnMut(&HttpRequest) -> Result<HttpResponse> + Send + 'static,
    ) -> (DeveloperServicesClient, Arc<MockTransport>) {
        let transport = Arc::new(MockTransport::new(handler));
        let gsa = GsaClient::new(
            transport.clone(),
            Arc::new(StaticAnisetteProvider::new(sample_anisette())),
            sample_device(),
            "https://gsa.test/lookup",
        );
        let token = DeveloperLoginToken {
            adsid: "000111-22-aaaa".into(),
            token: "gs-token".into(),
            expiry: DateTime::<Utc>::from_timestamp(4_000_000_000, 0).unwrap(),
        };
        let client = DeveloperServicesClient::new(&gsa, token, format!("{BASE}/")).with_team("TEAM123");
        (client, transport)
    }

    fn json_body(request: &HttpRequest) -> Value {
        serde_json::from_slice(request.body.as_deref().unwrap()).unwrap()
    }

    fn plist_reply(entries: Vec<(&str, PlistValue)>) -> HttpResponse {
        let mut dict = Dictionary::new();
        for (key, value) in entries {
            dict.insert(key.into(), value);
        }
        HttpResponse::new(200, to_xml_bytes(dict).unwrap())
    }

    #[tokio::test]
    async fn reads_are_tunnelled_through_post() {
        let (client, transport) = client_with(|_| {
            Ok(HttpResponse::new(
                200,
                json!({ "data": [{ "id": "D1", "attributes": { "name": "Phone", "udid": "U1" } }] })
                    .to_string(),
            ))
        });
        let devices = client.list_devices().await.unwrap();
        assert_eq!(devices, [Device { id: "D1".into(), name: "Phone".into(), udid: "U1".into() }]);

        let request = &transport.requests()[0];
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.url, format!("{BASE}/v1/devices"));
        assert_eq!(request.header_value(METHOD_OVERRIDE_HEADER), Some("GET"));
        assert_eq!(request.header_value("Content-Type"), Some(JSON_API_CONTENT_TYPE));
        assert_eq!(request.header_value("X-Apple-GS-Token"), Some("gs-token"));
        assert_eq!(request.header_value("X-Apple-I-Identity-Id"), Some("000111-22-aaaa"));
        assert_eq!(request.header_value("X-Apple-I-MD"), Some("otp"));
        assert_eq!(
            json_body(request)["urlEncodedQueryParams"],
            "limit=200&teamId=TEAM123"
        );
    }

    #[tokio::test]
    async fn writes_carry_the_team_attribute() {
        let (client, transport) = client_with(|_| {
            Ok(HttpResponse::new(
                201,
                json!({ "data": { "id": "B1", "attributes": { "identifier": "XTL-A.app", "name": "XTool app" } } })
                    .to_string(),
            ))
        });
        let bundle = client.create_bundle_id("XTool app", "XTL-A.app").await.unwrap();
        assert_eq!(bundle.id, "B1");

        let request = &transport.requests()[0];
        assert_eq!(request.header_value(METHOD_OVERRIDE_HEADER), None);
        let body = json_body(request);
        assert_eq!(body["data"]["attributes"]["teamId"], "TEAM123");
        assert_eq!(body["data"]["attributes"]["identifier"], "XTL-A.app");
    }

    #[tokio::test]
    async fn conflict_on_device_registration_is_not_an_error() {
        let (client, _) = client_with(|_| Ok(HttpResponse::new(409, "{}")));
        assert_eq!(
            client.register_device("Phone", "U1").await.unwrap(),
            DeviceRegistration::AlreadyRegistered
        );
    }

    #[tokio::test]
    async fn json_api_errors_become_operation_errors() {
        let (client, _) = client_with(|_| {
            Ok(HttpResponse::new(
                403,
                json!({ "errors": [{ "status": "403", "code": "FORBIDDEN", "title": "Forbidden", "detail": "No access" }] })
                    .to_string(),
            ))
        });
        let err = client.revoke_certificate("C1").await.unwrap_err();
        match err {
            Error::Operation(OperationError { code, message }) => {
                assert_eq!(code, 403);
                assert_eq!(message, "No access");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn collections_follow_next_links() {
        let calls = Arc::new(Mutex::new(0));
        let seen = calls.clone();
        let (client, transport) = client_with(move |_| {
            let mut calls = seen.lock().unwrap();
            *calls += 1;
            let body = if *calls == 1 {
                json!({
                    "data": [{ "id": "C1", "attributes": { "serialNumber": "0a" } }],
                    "links": { "next": format!("{BASE}/v1/certificates?cursor=abc&limit=200&teamId=TEAM123") }
                })
            } else {
                json!({ "data": [{ "id": "C2", "attributes": { "serialNumber": "0B" } }] })
            };
            Ok(HttpResponse::new(200, body.to_string()))
        });

        let certificates = client.list_certificates().await.unwrap();
        let serials: Vec<_> = certificates.iter().map(|c| c.serial_number.as_str()).collect();
        assert_eq!(serials, ["0A", "0B"]);
        let second = &transport.requests()[1];
        assert_eq!(
            json_body(second)["urlEncodedQueryParams"],
            "cursor=abc&limit=200&teamId=TEAM123"
        );
    }

    #[tokio::test]
    async fn legacy_actions_use_the_plist_envelope() {
        let (client, transport) = client_with(|_| {
            let mut group = Dictionary::new();
            group.insert("applicationGroup".into(), PlistValue::String("G1".into()));
            group.insert("name".into(), PlistValue::String("XTool group app".into()));
            group.insert("identifier".into(), PlistValue::String("group.XTL-A.app".into()));
            Ok(plist_reply(vec![
                ("resultCode", PlistValue::Integer(0.into())),
                ("applicationGroupList", PlistValue::Array(vec![PlistValue::Dictionary(group)])),
            ]))
        });
        let groups = client.list_app_groups().await.unwrap();
        assert_eq!(groups[0].identifier, "group.XTL-A.app");

        let request = &transport.requests()[0];
        assert_eq!(
            request.url,
            format!("{BASE}/QH65B2/ios/listApplicationGroups.action?clientId=XABBG36SBA")
        );
        assert_eq!(request.header_value("Accept"), Some(PLIST_CONTENT_TYPE));
        let body = parse_dictionary(request.body.as_deref().unwrap(), "test").unwrap();
        assert_eq!(body.optional_string("teamId"), Some("TEAM123"));
        assert_eq!(body.optional_string("DTDK_Platform"), Some("ios"));
        assert_eq!(body.optional_string("protocolVersion"), Some("QH65B2"));
        assert!(body.optional_string("requestId").is_some());
    }

    #[tokio::test]
    async fn legacy_result_codes_surface_user_strings() {
        let (client, _) = client_with(|_| {
            Ok(plist_reply(vec![
                ("resultCode", PlistValue::String("35".into())),
                ("resultString", PlistValue::String("internal".into())),
                ("userString", PlistValue::String("Invalid team".into())),
            ]))
        });
        let err = client.list_teams().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Operation(OperationError { code: 35, ref message }) if message == "Invalid team"
        ));
    }

    #[tokio::test]
    async fn team_scoped_calls_need_a_team() {
        let (client, transport) = client_with(|_| Ok(HttpResponse::new(200, "{}")));
        let client = DeveloperServicesClient {
            team_id: None,
            ..client
        };
        assert!(matches!(
            client.list_devices().await,
            Err(Error::Reconciliation(ReconciliationError::TeamNotFound(_)))
        ));
        assert_eq!(transport.request_count(), 0);
    }

    #[test]
    fn team_attribute_is_injected_into_nested_objects() {
        let body = with_team_attribute(json!({}), "T").unwrap();
        assert_eq!(body, json!({ "data": { "attributes": { "teamId": "T" } } }));
        assert!(with_team_attribute(json!([]), "T").is_err());
    }
}
