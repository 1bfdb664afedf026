//! Purpose: Request/response seam between the models and the HTTP stack.
//! Exports: `Transport`, `Method`, `Request`, `Response`, `HttpTransport`.
//! Role: Models build a `Request` and interpret the status; transports only move bytes.
//! Invariants: Non-2xx responses are returned as `Response`, never raised.
//! Invariants: Only transport-level failures (connect, read, decode) become `Io`/`Internal` errors.
#![allow(clippy::result_large_err)]

use super::config::ClientConfig;
use crate::core::error::{Error, ErrorKind};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, Error as TlsError, SignatureScheme};
use serde_json::Value;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use url::Url;

type ApiResult<T> = Result<T, Error>;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Request<'a> {
    pub method: Method,
    pub url: &'a Url,
    pub body: Option<&'a Value>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    pub status: u16,
    pub body: Value,
}

impl Response {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The `results` array of a KE-chain envelope (empty when absent).
    pub fn results(&self) -> &[Value] {
        self.body
            .get("results")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn into_results(self) -> Vec<Value> {
        match self.body {
            Value::Object(mut map) => match map.remove("results") {
                Some(Value::Array(results)) => results,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    /// The first result of the envelope, or the body itself when it is not an envelope.
    pub fn into_first_result(self) -> Option<Value> {
        let is_envelope = self.body.get("results").is_some();
        if is_envelope {
            self.into_results().into_iter().next()
        } else if self.body.is_object() {
            Some(self.body)
        } else {
            None
        }
    }
}

/// Moves one JSON request to the server and returns status plus decoded body.
pub trait Transport: Send + Sync {
    fn request(&self, request: &Request<'_>) -> ApiResult<Response>;
}

#[derive(Debug)]
struct AcceptAllServerCertVerifier;

impl ServerCertVerifier for AcceptAllServerCertVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, TlsError> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        rustls::crypto::aws_lc_rs::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Blocking HTTP transport backed by a shared `ureq::Agent`.
#[derive(Clone)]
pub struct HttpTransport {
    agent: ureq::Agent,
    authorization: Option<String>,
    user_agent: String,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> ApiResult<Self> {
        let agent = if !config.check_certificates {
            agent_skip_verify()
        } else if let Some(ca_file) = &config.ca_file {
            agent_with_ca_file(ca_file)?
        } else {
            ureq::AgentBuilder::new().build()
        };
        Ok(Self {
            agent,
            authorization: authorization_header(config),
            user_agent: config.user_agent.clone(),
        })
    }
}

impl Transport for HttpTransport {
    fn request(&self, request: &Request<'_>) -> ApiResult<Response> {
        let mut call = self
            .agent
            .request(request.method.as_str(), request.url.as_str())
            .set("Accept", "application/json")
            .set("X-Requested-With", "XMLHttpRequest")
            .set("User-Agent", &self.user_agent);
        if let Some(authorization) = &self.authorization {
            call = call.set("Authorization", authorization);
        }

        let outcome = match request.body {
            Some(body) => {
                let payload = serde_json::to_string(body).map_err(|err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to encode request json")
                        .with_source(err)
                })?;
                call.set("Content-Type", "application/json")
                    .send_string(&payload)
            }
            None => call.call(),
        };

        let response = match outcome {
            Ok(resp) => resp,
            Err(ureq::Error::Status(_, resp)) => resp,
            Err(ureq::Error::Transport(err)) => {
                return Err(Error::new(ErrorKind::Io)
                    .with_message(format!(
                        "{} {} failed",
                        request.method.as_str(),
                        request.url
                    ))
                    .with_source(err));
            }
        };
        let status = response.status();
        let body = read_json_body(response)?;
        tracing::debug!(
            method = request.method.as_str(),
            url = %request.url,
            status,
            "kechain request"
        );
        Ok(Response { status, body })
    }
}

fn authorization_header(config: &ClientConfig) -> Option<String> {
    if let Some(token) = &config.token {
        return Some(format!("Token {token}"));
    }
    match (&config.username, &config.password) {
        (Some(username), Some(password)) => {
            let encoded = STANDARD.encode(format!("{username}:{password}"));
            Some(format!("Basic {encoded}"))
        }
        _ => None,
    }
}

fn read_json_body(response: ureq::Response) -> ApiResult<Value> {
    let body = response.into_string().map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read response body")
            .with_source(err)
    })?;
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("invalid response json")
            .with_source(err)
    })
}

fn agent_with_ca_file(path: &Path) -> ApiResult<ureq::Agent> {
    let cert_bytes = std::fs::read(path).map_err(|err| {
        Error::new(ErrorKind::Client)
            .with_message(format!(
                "failed to read TLS CA/certificate file {}",
                path.display()
            ))
            .with_source(err)
    })?;
    let mut cert_reader = Cursor::new(cert_bytes);
    let certs = rustls_pemfile::certs(&mut cert_reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| {
            Error::new(ErrorKind::Client)
                .with_message("failed to parse TLS CA/certificate file")
                .with_source(err)
        })?;

    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    let mut root_store = rustls::RootCertStore::empty();
    let (added, _) = root_store.add_parsable_certificates(certs);
    if added == 0 {
        return Err(Error::new(ErrorKind::Client)
            .with_message("TLS CA/certificate file contains no parsable certificates"));
    }

    let tls_config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    Ok(ureq::builder().tls_config(Arc::new(tls_config)).build())
}

fn agent_skip_verify() -> ureq::Agent {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    let tls_config = rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAllServerCertVerifier))
        .with_no_client_auth();
    ureq::builder().tls_config(Arc::new(tls_config)).build()
}
