//! The HTTP client capability the executor delegates to.
//!
//! # Design
//! `Transport` is the seam between the queue engine and the network. The
//! executor hands it a fully prepared `TransportCall` and a byte sink; the
//! transport performs one blocking round trip, streams the body into the
//! sink as it arrives, and returns the status. `UreqTransport` is the
//! production implementation; tests substitute scripted transports.

use std::io::Read;
use std::time::Duration;

use ureq::tls::TlsConfig;
use ureq::{Agent, Proxy};

use crate::error::TransportError;
use crate::http::HttpMethod;

const READ_CHUNK: usize = 16 * 1024;

/// One prepared HTTP exchange.
///
/// `headers` already contains the site cookie (if configured) followed by
/// the caller's headers, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportCall<'a> {
    pub method: HttpMethod,
    pub url: &'a str,
    pub headers: Vec<(String, String)>,
    pub proxy: Option<&'a str>,
    pub connect_timeout: Duration,
    pub total_timeout: Option<Duration>,
    pub body: Option<&'a [u8]>,
    pub verify_tls: bool,
}

pub trait Transport: Send + Sync + 'static {
    /// Perform the call, feeding body bytes to `sink` in arrival order.
    ///
    /// Returns the HTTP status of a completed exchange, whatever its value.
    fn perform(
        &self,
        call: &TransportCall<'_>,
        sink: &mut dyn FnMut(&[u8]),
    ) -> Result<u16, TransportError>;
}

/// Blocking transport backed by `ureq`.
///
/// Builds one agent per call, so no connection state is shared between
/// requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct UreqTransport;

impl UreqTransport {
    pub fn new() -> Self {
        Self
    }

    fn agent_for(call: &TransportCall<'_>) -> Result<Agent, TransportError> {
        let tls = TlsConfig::builder()
            .disable_verification(!call.verify_tls)
            .build();

        let mut builder = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_connect(Some(call.connect_timeout))
            .timeout_global(call.total_timeout)
            .tls_config(tls);

        if let Some(proxy) = call.proxy.filter(|p| !p.is_empty()) {
            let proxy = Proxy::new(proxy)
                .map_err(|e| TransportError::setup(format!("invalid proxy {proxy:?}: {e}")))?;
            builder = builder.proxy(Some(proxy));
        }

        Ok(builder.build().new_agent())
    }
}

impl Transport for UreqTransport {
    fn perform(
        &self,
        call: &TransportCall<'_>,
        sink: &mut dyn FnMut(&[u8]),
    ) -> Result<u16, TransportError> {
        let agent = Self::agent_for(call)?;

        let result = match call.method {
            HttpMethod::Get => {
                let mut req = agent.get(call.url);
                for (name, value) in &call.headers {
                    req = req.header(name.as_str(), value.as_str());
                }
                req.call()
            }
            HttpMethod::Post => {
                let mut req = agent.post(call.url);
                for (name, value) in &call.headers {
                    req = req.header(name.as_str(), value.as_str());
                }
                req.send(call.body.unwrap_or_default())
            }
        };

        let mut response = result.map_err(TransportError::from)?;
        let status = response.status().as_u16();

        let mut reader = response.body_mut().as_reader();
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => sink(&buf[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(TransportError::io(e).with_status(status)),
            }
        }

        Ok(status)
    }
}
