//! `RelayServer` builder and accept loop.
//!
//! This is the entry point for running a keyline relay. It ties the
//! layers together: transport → protocol → station registry → wires.

use std::sync::Arc;
use std::time::Duration;

use keyline_protocol::{Codec, JsonCodec};
use keyline_station::{RegistryConfig, StationRegistry};
use keyline_transport::{Transport, WebSocketTransport};
use keyline_wire::{WireConfig, WireManager};
use tokio::sync::Mutex;

use crate::KeylineError;
use crate::handler::handle_connection;

/// The current protocol version. Stations must send this in their join
/// handshake or be refused.
pub const PROTOCOL_VERSION: u32 = 1;

/// Shared relay state passed to each connection handler task.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) stations: Mutex<StationRegistry>,
    pub(crate) wires: Mutex<WireManager>,
    pub(crate) codec: C,
    pub(crate) liveness_timeout: Duration,
}

/// Builder for configuring and starting a relay.
///
/// # Example
///
/// ```rust,ignore
/// use keyline::RelayServer;
///
/// let server = RelayServer::builder()
///     .bind("0.0.0.0:7250")
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct RelayServerBuilder {
    bind_addr: String,
    wire_config: WireConfig,
    registry_config: RegistryConfig,
}

impl RelayServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:7250".to_string(),
            wire_config: WireConfig::default(),
            registry_config: RegistryConfig::default(),
        }
    }

    /// Sets the address to bind the relay to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the per-wire configuration (capacity, idle timeout).
    pub fn wire_config(mut self, config: WireConfig) -> Self {
        self.wire_config = config;
        self
    }

    /// Sets the station registry configuration (liveness timeout).
    pub fn registry_config(mut self, config: RegistryConfig) -> Self {
        self.registry_config = config;
        self
    }

    /// Builds the relay, binding its listener.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build(
        self,
    ) -> Result<RelayServer<JsonCodec>, KeylineError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let liveness_timeout =
            Duration::from_secs(self.registry_config.liveness_timeout_secs);
        let state = Arc::new(ServerState {
            stations: Mutex::new(StationRegistry::new(
                self.registry_config,
            )),
            wires: Mutex::new(WireManager::new(self.wire_config)),
            codec: JsonCodec,
            liveness_timeout,
        });

        Ok(RelayServer { transport, state })
    }
}

impl Default for RelayServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running keyline relay.
///
/// Call [`run()`](Self::run) to start accepting stations.
pub struct RelayServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl<C: Codec> RelayServer<C> {
    /// Creates a new builder.
    pub fn builder() -> RelayServerBuilder {
        RelayServerBuilder::new()
    }

    /// Returns the local address the relay is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the accept loop.
    ///
    /// Accepts connections, performs the join handshake, and spawns a
    /// handler task per station. A background sweep expires stations
    /// whose connection went quiet without closing. Runs until the
    /// process is terminated.
    pub async fn run(mut self) -> Result<(), KeylineError> {
        tracing::info!("keyline relay running");

        // Liveness sweep: catches dead TCP sessions that never FIN.
        // Handlers remove stations on clean closes; this handles the
        // rest.
        {
            let state = Arc::clone(&self.state);
            let period = (state.liveness_timeout / 2)
                .max(Duration::from_secs(1));
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                loop {
                    ticker.tick().await;
                    let expired =
                        state.stations.lock().await.expire_stale();
                    if expired.is_empty() {
                        continue;
                    }
                    let mut wires = state.wires.lock().await;
                    for station in expired {
                        if let Err(e) =
                            wires.leave(station.station_id).await
                        {
                            tracing::debug!(
                                station = %station.station_id,
                                error = %e,
                                "expired station was not on a wire"
                            );
                        }
                    }
                }
            });
        }

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) =
                            handle_connection::<C>(conn, state).await
                        {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
