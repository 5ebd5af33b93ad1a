use std::io;
use std::sync::Arc;
use std::time::Duration;

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Request, Uri};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::proxy::Tunnel;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use log::warn;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{ring, verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};

use super::{HttpRequest, HttpResponse};
use crate::error::{Result, ScanError};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const IDLE_TIMEOUT: Duration = Duration::from_secs(1);
const MAX_IDLE_CONNS: usize = 30;

type Body = Full<Bytes>;

enum Transport {
    Direct(Client<HttpsConnector<HttpConnector>, Body>),
    Proxied(Client<HttpsConnector<Tunnel<HttpConnector>>, Body>),
}

/// Shared HTTP client used by every worker.
///
/// Redirects are never followed: a 3xx is a final response the modules can
/// match on. Certificate errors are ignored since targets are often
/// misconfigured hosts. The request target goes out exactly as built, with
/// no dot-segment resolution.
pub struct HttpClient {
    transport: Transport,
    timeout: Duration,
}

impl HttpClient {
    pub fn new(timeout_seconds: u64, proxy_url: Option<&str>, keep_alives: bool) -> Result<Self> {
        let tls = insecure_tls_config()?;

        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_connect_timeout(Some(CONNECT_TIMEOUT));
        http.set_keepalive(Some(IDLE_TIMEOUT));

        // With no idle connections kept, every request opens a fresh one.
        let mut builder = Client::builder(TokioExecutor::new());
        builder
            .pool_timer(TokioTimer::new())
            .pool_idle_timeout(IDLE_TIMEOUT)
            .pool_max_idle_per_host(if keep_alives { MAX_IDLE_CONNS } else { 0 });

        let proxy = proxy_url.and_then(|raw| match raw.parse::<Uri>() {
            Ok(uri) if uri.authority().is_some() => Some(uri),
            _ => {
                warn!("ignoring invalid proxy '{}'", raw);
                None
            }
        });

        let https = HttpsConnectorBuilder::new()
            .with_tls_config(tls)
            .https_or_http()
            .enable_http1();

        let transport = match proxy {
            Some(proxy) => {
                Transport::Proxied(builder.build(https.wrap_connector(Tunnel::new(proxy, http))))
            }
            None => Transport::Direct(builder.build(https.wrap_connector(http))),
        };

        Ok(Self {
            transport,
            timeout: Duration::from_secs(timeout_seconds),
        })
    }

    /// Sends the request and reads the whole body within the timeout.
    pub async fn send_request(&self, req: &HttpRequest) -> Result<HttpResponse> {
        let mut request = Request::builder()
            .method(req.method.clone())
            .uri(req.uri.clone())
            .body(Full::new(Bytes::from(req.body.clone())))
            .map_err(|e| ScanError::RequestBuild(e.to_string()))?;
        *request.headers_mut() = req.headers.clone();

        let exchange = async {
            let pending = match &self.transport {
                Transport::Direct(client) => client.request(request),
                Transport::Proxied(client) => client.request(request),
            };
            let response = pending.await.map_err(ScanError::transport)?;
            let (parts, body) = response.into_parts();
            let body = body.collect().await.map_err(ScanError::transport)?.to_bytes();
            Ok::<_, ScanError>((parts, body))
        };

        let (parts, body) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| {
                ScanError::transport(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("no response from {} within {:?}", req.target, self.timeout),
                ))
            })??;

        Ok(HttpResponse {
            url: req.target.clone(),
            status: parts.status.as_u16(),
            headers: parts.headers,
            body,
        })
    }
}

fn insecure_tls_config() -> Result<ClientConfig> {
    let provider = Arc::new(ring::default_provider());
    let config = ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()
        .map_err(ScanError::transport)?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCert(provider)))
        .with_no_client_auth();
    Ok(config)
}

/// Accepts any server certificate but still checks handshake signatures.
#[derive(Debug)]
struct AcceptAnyCert(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
