// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT transport backed by `rumqttc`.
//!
//! # Examples
//!
//! ```no_run
//! use mqtt_alarm::protocol::{MqttTransport, Transport};
//!
//! # async fn example() -> Result<(), mqtt_alarm::ProtocolError> {
//! let (transport, mut inbound) = MqttTransport::builder("mqtt://192.168.1.50:1883")
//!     .credentials("user", "password")
//!     .connect()
//!     .await?;
//!
//! transport.subscribe("alarm/status")?;
//! while let Some(message) = inbound.recv().await {
//!     println!("{} -> {:?}", message.topic, message.payload);
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rumqttc::tokio_rustls::rustls::{
    self, ClientConfig, DigitallySignedStruct, SignatureScheme,
    client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    crypto::CryptoProvider,
    pki_types::{CertificateDer, ServerName, UnixTime},
};
use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS, TlsConfiguration};
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::error::ProtocolError;

use super::{InboundMessage, Transport};

/// Capacity of the channel delivering inbound messages.
const INBOUND_CHANNEL_CAPACITY: usize = 64;

/// Capacity of the rumqttc request channel.
const REQUEST_CHANNEL_CAPACITY: usize = 10;

/// Last will message registered with the broker on connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastWill {
    /// Topic the broker publishes the will on.
    pub topic: String,
    /// Will payload.
    pub payload: String,
    /// Quality of service level (0, 1 or 2; anything higher is treated as 2).
    pub qos: u8,
    /// Whether the broker retains the will message.
    pub retain: bool,
}

impl Default for LastWill {
    fn default() -> Self {
        Self {
            topic: "WillMsg".to_string(),
            payload: "Connection Closed abnormally..!".to_string(),
            qos: 0,
            retain: false,
        }
    }
}

/// Connection options for an MQTT transport.
#[derive(Debug, Clone)]
struct MqttTransportConfig {
    url: String,
    client_id: Option<String>,
    credentials: Option<(String, String)>,
    keep_alive: Duration,
    clean_session: bool,
    reconnect_period: Duration,
    connection_timeout: Duration,
    last_will: Option<LastWill>,
    verify_tls: bool,
}

impl Default for MqttTransportConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            client_id: None,
            credentials: None,
            keep_alive: Duration::from_secs(10),
            clean_session: true,
            reconnect_period: Duration::from_secs(1),
            connection_timeout: Duration::from_secs(30),
            last_will: Some(LastWill::default()),
            verify_tls: true,
        }
    }
}

/// An MQTT connection used as the bridge's transport.
///
/// Cheaply cloneable. The background event loop keeps polling after
/// connection errors, waiting `reconnect_period` between attempts, and
/// re-subscribes every known topic once the broker accepts the new session.
#[derive(Clone)]
pub struct MqttTransport {
    inner: Arc<MqttTransportInner>,
}

struct MqttTransportInner {
    client: AsyncClient,
    client_id: String,
    address: BrokerAddress,
    connected: AtomicBool,
    closing: AtomicBool,
    /// Topics to restore after a reconnect.
    subscriptions: Mutex<Vec<String>>,
}

impl MqttTransport {
    /// Creates a builder for a connection to `url`.
    ///
    /// Accepted schemes are `mqtt://` and `tcp://` (plain, default port
    /// 1883) and `mqtts://` and `ssl://` (TLS, default port 8883). A URL
    /// without a scheme is treated as plain MQTT.
    #[must_use]
    pub fn builder(url: impl Into<String>) -> MqttTransportBuilder {
        MqttTransportBuilder {
            config: MqttTransportConfig {
                url: url.into(),
                ..MqttTransportConfig::default()
            },
        }
    }

    /// Returns whether the broker connection is currently up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
    }

    /// Returns the MQTT client identifier.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.inner.client_id
    }

    /// Returns the broker host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.inner.address.host
    }

    /// Returns the broker port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.inner.address.port
    }

    /// Returns the topics subscribed through this transport.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<String> {
        self.inner.subscriptions.lock().clone()
    }

    /// Disconnects from the broker and stops the event loop.
    ///
    /// # Errors
    ///
    /// Returns error if the disconnect request cannot be sent, which happens
    /// when the event loop has already stopped.
    pub async fn disconnect(&self) -> Result<(), ProtocolError> {
        tracing::info!(
            host = %self.inner.address.host,
            port = %self.inner.address.port,
            "Disconnecting from MQTT broker"
        );

        self.inner.closing.store(true, Ordering::Release);
        self.inner.connected.store(false, Ordering::Release);
        self.inner
            .client
            .disconnect()
            .await
            .map_err(ProtocolError::Mqtt)
    }

    /// Re-issues every known subscription after a fresh session.
    fn resubscribe(&self) {
        let topics = self.inner.subscriptions.lock().clone();
        for topic in topics {
            if let Err(e) = self.inner.client.try_subscribe(topic.as_str(), QoS::AtMostOnce) {
                tracing::warn!(topic = %topic, error = %e, "Failed to restore subscription");
            }
        }
    }
}

impl Transport for MqttTransport {
    fn subscribe(&self, topic: &str) -> Result<(), ProtocolError> {
        self.inner.client.try_subscribe(topic, QoS::AtMostOnce)?;

        let mut subscriptions = self.inner.subscriptions.lock();
        if !subscriptions.iter().any(|t| t == topic) {
            subscriptions.push(topic.to_string());
        }

        tracing::debug!(topic = %topic, "Subscribed to topic");
        Ok(())
    }

    fn publish(&self, topic: &str, payload: &str) -> Result<(), ProtocolError> {
        tracing::debug!(topic = %topic, payload = %payload, "Publishing MQTT message");

        self.inner
            .client
            .try_publish(topic, QoS::AtMostOnce, false, payload.as_bytes().to_vec())
            .map_err(ProtocolError::Mqtt)
    }
}

impl std::fmt::Debug for MqttTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttTransport")
            .field("host", &self.inner.address.host)
            .field("port", &self.inner.address.port)
            .field("client_id", &self.inner.client_id)
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Builder for an MQTT transport.
///
/// # Examples
///
/// ```no_run
/// use mqtt_alarm::protocol::MqttTransport;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), mqtt_alarm::ProtocolError> {
/// let (transport, inbound) = MqttTransport::builder("mqtt://broker.local")
///     .client_id("alarm_bridge")
///     .keep_alive(Duration::from_secs(30))
///     .reconnect_period(Duration::from_secs(5))
///     .connect()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct MqttTransportBuilder {
    config: MqttTransportConfig,
}

impl MqttTransportBuilder {
    /// Sets the client identifier (default: `mqtt_alarm_` plus 8 random hex
    /// characters).
    #[must_use]
    pub fn client_id(mut self, id: impl Into<String>) -> Self {
        self.config.client_id = Some(id.into());
        self
    }

    /// Sets authentication credentials.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.credentials = Some((username.into(), password.into()));
        self
    }

    /// Sets the keep-alive interval (default: 10 seconds).
    #[must_use]
    pub fn keep_alive(mut self, duration: Duration) -> Self {
        self.config.keep_alive = duration;
        self
    }

    /// Sets the clean-session flag (default: `true`).
    #[must_use]
    pub fn clean_session(mut self, clean: bool) -> Self {
        self.config.clean_session = clean;
        self
    }

    /// Sets the delay between reconnection attempts (default: 1 second).
    #[must_use]
    pub fn reconnect_period(mut self, duration: Duration) -> Self {
        self.config.reconnect_period = duration;
        self
    }

    /// Sets how long to wait for the initial connection (default: 30 seconds).
    #[must_use]
    pub fn connection_timeout(mut self, duration: Duration) -> Self {
        self.config.connection_timeout = duration;
        self
    }

    /// Sets the last will message, or `None` to register no will.
    #[must_use]
    pub fn last_will(mut self, will: Option<LastWill>) -> Self {
        self.config.last_will = will;
        self
    }

    /// Sets whether the broker certificate is verified on TLS connections
    /// (default: `true`).
    ///
    /// With `false` any certificate the broker presents is accepted, which
    /// allows self-signed brokers. Handshake signatures are still checked.
    #[must_use]
    pub fn verify_tls(mut self, verify: bool) -> Self {
        self.config.verify_tls = verify;
        self
    }

    /// Connects to the broker.
    ///
    /// Returns the transport and the receiver for inbound messages. Messages
    /// are delivered in the order the broker sent them.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The URL is invalid
    /// - The broker does not accept the connection within the timeout
    pub async fn connect(
        self,
    ) -> Result<(MqttTransport, mpsc::Receiver<InboundMessage>), ProtocolError> {
        let address = BrokerAddress::parse(&self.config.url)?;
        let client_id = self.config.client_id.clone().unwrap_or_else(generate_client_id);

        let mut mqtt_options = MqttOptions::new(&client_id, &address.host, address.port);
        mqtt_options.set_keep_alive(self.config.keep_alive);
        mqtt_options.set_clean_session(self.config.clean_session);

        if let Some((ref username, ref password)) = self.config.credentials {
            mqtt_options.set_credentials(username, password);
        }

        if let Some(ref will) = self.config.last_will {
            mqtt_options.set_last_will(rumqttc::LastWill::new(
                will.topic.clone(),
                will.payload.clone().into_bytes(),
                qos_level(will.qos),
                will.retain,
            ));
        }

        if address.tls {
            let transport = if self.config.verify_tls {
                rumqttc::Transport::tls_with_default_config()
            } else {
                tracing::warn!(
                    host = %address.host,
                    "TLS certificate verification disabled"
                );
                rumqttc::Transport::tls_with_config(unverified_tls_config()?)
            };
            mqtt_options.set_transport(transport);
        }

        let (client, event_loop) = AsyncClient::new(mqtt_options, REQUEST_CHANNEL_CAPACITY);

        let transport = MqttTransport {
            inner: Arc::new(MqttTransportInner {
                client,
                client_id,
                address,
                connected: AtomicBool::new(false),
                closing: AtomicBool::new(false),
                subscriptions: Mutex::new(Vec::new()),
            }),
        };

        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);
        let (connack_tx, connack_rx) = oneshot::channel();

        let transport_clone = transport.clone();
        let reconnect_period = self.config.reconnect_period;
        let event_task = tokio::spawn(async move {
            handle_transport_events(
                event_loop,
                transport_clone,
                inbound_tx,
                connack_tx,
                reconnect_period,
            )
            .await;
        });

        let timeout = self.config.connection_timeout;
        match tokio::time::timeout(timeout, connack_rx).await {
            Ok(Ok(())) => {
                tracing::info!(
                    host = %transport.inner.address.host,
                    port = %transport.inner.address.port,
                    client_id = %transport.inner.client_id,
                    "Connected to MQTT broker"
                );
                Ok((transport, inbound_rx))
            }
            Ok(Err(_)) => {
                event_task.abort();
                Err(ProtocolError::ConnectionFailed(
                    "MQTT event loop terminated unexpectedly".to_string(),
                ))
            }
            Err(_) => {
                event_task.abort();
                Err(ProtocolError::Timeout(
                    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                ))
            }
        }
    }
}

/// Host, port and TLS flag parsed from a broker URL.
#[derive(Debug, Clone, PartialEq, Eq)]
struct BrokerAddress {
    host: String,
    port: u16,
    tls: bool,
}

impl BrokerAddress {
    fn parse(url: &str) -> Result<Self, ProtocolError> {
        let (rest, tls) = if let Some(rest) = url
            .strip_prefix("mqtts://")
            .or_else(|| url.strip_prefix("ssl://"))
        {
            (rest, true)
        } else {
            let rest = url
                .strip_prefix("mqtt://")
                .or_else(|| url.strip_prefix("tcp://"))
                .unwrap_or(url);
            (rest, false)
        };

        if rest.contains("://") {
            return Err(ProtocolError::InvalidAddress(format!(
                "unsupported scheme: {url}"
            )));
        }

        // Anything after the authority is ignored.
        let authority = rest.split('/').next().unwrap_or_default();
        let default_port = if tls { 8883 } else { 1883 };

        let (host, port) = if let Some((h, p)) = authority.rsplit_once(':') {
            let port = p
                .parse()
                .map_err(|_| ProtocolError::InvalidAddress(format!("Invalid port: {p}")))?;
            (h, port)
        } else {
            (authority, default_port)
        };

        if host.is_empty() {
            return Err(ProtocolError::InvalidAddress(format!(
                "missing broker host: {url:?}"
            )));
        }

        Ok(Self {
            host: host.to_string(),
            port,
            tls,
        })
    }
}

/// Certificate verifier that accepts any server certificate.
///
/// Handshake signatures are still verified with the provider's algorithms,
/// so the peer must hold the key of the certificate it presented.
#[derive(Debug)]
struct AcceptAnyServerCert(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

/// Builds a TLS configuration that skips certificate verification.
fn unverified_tls_config() -> Result<TlsConfiguration, ProtocolError> {
    let provider = CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()));

    let config = ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()
        .map_err(|e| ProtocolError::ConnectionFailed(format!("TLS setup failed: {e}")))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert(provider)))
        .with_no_client_auth();

    Ok(TlsConfiguration::Rustls(Arc::new(config)))
}

fn generate_client_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("mqtt_alarm_{}", &id[..8])
}

fn qos_level(level: u8) -> QoS {
    match level {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        _ => QoS::ExactlyOnce,
    }
}

/// Drives the rumqttc event loop until the transport is closed.
async fn handle_transport_events(
    mut event_loop: EventLoop,
    transport: MqttTransport,
    inbound_tx: mpsc::Sender<InboundMessage>,
    connack_tx: oneshot::Sender<()>,
    reconnect_period: Duration,
) {
    use rumqttc::{Event, Outgoing, Packet};

    let mut connack_tx = Some(connack_tx);

    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                tracing::debug!(?connack, "MQTT transport connected");
                transport.inner.connected.store(true, Ordering::Release);

                if let Some(tx) = connack_tx.take() {
                    let _ = tx.send(());
                } else {
                    tracing::info!(
                        host = %transport.inner.address.host,
                        session_present = connack.session_present,
                        "Reconnected to MQTT broker"
                    );
                    if !connack.session_present {
                        transport.resubscribe();
                    }
                }
            }
            Ok(Event::Incoming(Packet::SubAck(suback))) => {
                tracing::debug!(?suback, "MQTT subscription acknowledged");
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                tracing::debug!(
                    topic = %publish.topic,
                    payload = %String::from_utf8_lossy(&publish.payload),
                    "MQTT message received"
                );
                let message = InboundMessage::new(publish.topic.clone(), publish.payload.to_vec());
                if inbound_tx.send(message).await.is_err() {
                    tracing::debug!("Inbound receiver dropped, stopping MQTT event loop");
                    break;
                }
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                tracing::debug!("MQTT disconnect sent");
            }
            Ok(_) => {}
            Err(e) => {
                transport.inner.connected.store(false, Ordering::Release);
                if transport.inner.closing.load(Ordering::Acquire) {
                    tracing::debug!("MQTT event loop stopped");
                    break;
                }
                tracing::error!(error = %e, "MQTT transport error");
                tokio::time::sleep(reconnect_period).await;
            }
        }
    }
}
