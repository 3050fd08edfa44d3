use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use tokio::{io::AsyncWriteExt, net::TcpStream, time::timeout};

use super::ModbusTransport;
use crate::protocol::{
    fault::ChannelFault,
    modbus::{
        generate_pull_get_holdings_request, generate_pull_set_holding_request,
        parse_pull_get_holdings, parse_pull_set_holding, read_modbus_frame, FrameError,
    },
    register::DEFAULT_PORT,
};

#[derive(Debug, Clone)]
pub struct TcpTransportConfig {
    pub host: String,
    pub port: u16,
    /// Bound on a single connect attempt.
    pub connect_timeout: Duration,
    /// Connect attempts before giving up.
    pub connect_retries: u32,
}

impl TcpTransportConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
            connect_timeout: Duration::from_secs(3),
            connect_retries: 3,
        }
    }
}

impl Default for TcpTransportConfig {
    fn default() -> Self {
        Self::new("127.0.0.1", DEFAULT_PORT)
    }
}

/// Modbus TCP client holding one session.
///
/// Only one transaction is ever in flight. When a caller abandons a
/// transaction (usually through a timeout) the socket may still hold part of
/// the reply, so the next transaction starts on a fresh session.
pub struct TcpTransport {
    config: TcpTransportConfig,
    stream: Option<TcpStream>,
    in_flight: bool,
    next_transaction_id: u16,
}

impl TcpTransport {
    pub fn new(config: TcpTransportConfig) -> Self {
        Self {
            config,
            stream: None,
            in_flight: false,
            next_transaction_id: 1,
        }
    }

    fn transaction_id(&mut self) -> u16 {
        let id = self.next_transaction_id;
        self.next_transaction_id = self.next_transaction_id.wrapping_add(1);
        id
    }

    async fn exchange(&mut self, request: &[u8]) -> Result<Bytes, ChannelFault> {
        if self.in_flight {
            log::debug!(
                "Previous transaction to {} was abandoned, reopening session",
                self.endpoint()
            );
            self.connect().await?;
        }

        let stream = self.stream.as_mut().ok_or(ChannelFault::NotConnected)?;
        self.in_flight = true;

        let result: Result<Bytes, FrameError> = async {
            stream.write_all(request).await?;
            stream.flush().await?;
            read_modbus_frame(stream).await
        }
        .await;

        self.in_flight = false;
        result.map_err(|err| {
            let fault = ChannelFault::from(err);
            if fault.is_link_down() {
                self.stream = None;
            }
            fault
        })
    }
}

#[async_trait]
impl ModbusTransport for TcpTransport {
    async fn connect(&mut self) -> Result<(), ChannelFault> {
        self.close().await;

        let attempts = self.config.connect_retries.max(1);
        let mut last_fault = ChannelFault::NotConnected;
        for attempt in 1..=attempts {
            let target = (self.config.host.as_str(), self.config.port);
            match timeout(self.config.connect_timeout, TcpStream::connect(target)).await {
                Ok(Ok(stream)) => {
                    if let Err(err) = stream.set_nodelay(true) {
                        log::debug!("Failed to set TCP_NODELAY: {err}");
                    }
                    self.stream = Some(stream);
                    return Ok(());
                }
                Ok(Err(err)) => last_fault = ChannelFault::connection_lost(err.to_string()),
                Err(_) => {
                    last_fault = ChannelFault::Timeout {
                        after: self.config.connect_timeout,
                    }
                }
            }
            log::debug!(
                "Connect attempt {attempt}/{attempts} to {} failed: {last_fault}",
                self.endpoint()
            );
        }
        Err(last_fault)
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
        self.in_flight = false;
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn read_holding_registers(
        &mut self,
        unit_id: u8,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, ChannelFault> {
        let transaction_id = self.transaction_id();
        let (request, raw) =
            generate_pull_get_holdings_request(unit_id, transaction_id, address, count)?;
        let response = self.exchange(&raw).await?;
        let values = parse_pull_get_holdings(&request, &response)?;
        if values.len() != count as usize {
            return Err(ChannelFault::Malformed {
                expected: count,
                actual: values.len(),
            });
        }
        Ok(values)
    }

    async fn write_register(
        &mut self,
        unit_id: u8,
        address: u16,
        value: u16,
    ) -> Result<(), ChannelFault> {
        let transaction_id = self.transaction_id();
        let (request, raw) =
            generate_pull_set_holding_request(unit_id, transaction_id, address, value)?;
        let response = self.exchange(&raw).await?;
        parse_pull_set_holding(&request, &response)?;
        Ok(())
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::{io::AsyncReadExt, net::TcpListener};

    /// Answer one read request for two registers and one write request.
    async fn serve_once(listener: TcpListener) {
        let (mut socket, _) = listener.accept().await.unwrap();

        let mut request = [0u8; 12];
        socket.read_exact(&mut request).await.unwrap();
        assert_eq!(request[7], 0x03);
        let mut reply = vec![request[0], request[1], 0, 0, 0, 7, request[6], 0x03, 4];
        reply.extend_from_slice(&[0x00, 0x01, 0xE2, 0x40]);
        socket.write_all(&reply).await.unwrap();

        let mut request = [0u8; 12];
        socket.read_exact(&mut request).await.unwrap();
        assert_eq!(request[7], 0x06);
        socket.write_all(&request).await.unwrap();
    }

    #[tokio::test]
    async fn test_read_and_write_against_local_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(serve_once(listener));

        let mut transport = TcpTransport::new(TcpTransportConfig::new("127.0.0.1", port));
        assert!(!transport.is_connected());
        transport.connect().await.unwrap();
        assert!(transport.is_connected());

        let values = transport.read_holding_registers(240, 107, 2).await.unwrap();
        assert_eq!(values, vec![0x0001, 0xE240]);
        transport.write_register(240, 0, 0x0180).await.unwrap();

        server.await.unwrap();
    }

    /// Swallow the first request without answering, then serve one read on a
    /// second session. Returns the number of accepted sessions.
    async fn stall_then_serve(listener: TcpListener) -> usize {
        let (mut stalled, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 12];
        stalled.read_exact(&mut request).await.unwrap();
        let late_reply = [request[0], request[1], 0, 0, 0, 5, request[6], 0x03, 2, 0xDE, 0xAD];

        let (mut socket, _) = listener.accept().await.unwrap();
        // Too late for the abandoned transaction, must not be picked up.
        let _ = stalled.write_all(&late_reply).await;

        socket.read_exact(&mut request).await.unwrap();
        let reply = [request[0], request[1], 0, 0, 0, 5, request[6], 0x03, 2, 0x01, 0x80];
        socket.write_all(&reply).await.unwrap();
        2
    }

    #[tokio::test]
    async fn test_abandoned_transaction_reopens_the_session() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(stall_then_serve(listener));

        let mut transport = TcpTransport::new(TcpTransportConfig::new("127.0.0.1", port));
        transport.connect().await.unwrap();
        assert!(timeout(
            Duration::from_millis(100),
            transport.read_holding_registers(240, 0, 1)
        )
        .await
        .is_err());
        assert!(transport.in_flight);

        let values = transport.read_holding_registers(240, 0, 1).await.unwrap();
        assert_eq!(values, vec![0x0180]);
        assert!(!transport.in_flight);
        assert_eq!(server.await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_connect_to_closed_port_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut config = TcpTransportConfig::new("127.0.0.1", port);
        config.connect_retries = 1;
        config.connect_timeout = Duration::from_millis(500);
        let mut transport = TcpTransport::new(config);
        assert!(transport.connect().await.is_err());
        assert!(!transport.is_connected());
        assert_eq!(
            transport.read_holding_registers(240, 0, 1).await,
            Err(ChannelFault::NotConnected)
        );
    }
}
