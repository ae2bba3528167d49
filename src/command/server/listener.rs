use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info};

use crate::command::server::error::Error;
use crate::command::server::{serve_request, ServerContext};
use crate::configuration::ServerConfig;

async fn build_listener(binding_address: SocketAddr) -> Result<TcpListener, Error> {
    match TcpListener::bind(binding_address).await {
        Ok(listener) => Ok(listener),
        Err(err) => {
            let msg = format!("Failed to bind to {binding_address}: {err}");
            Err(Error::Initialization(msg))
        }
    }
}

async fn accept(listener: &TcpListener) -> Result<(TcpStream, SocketAddr), Error> {
    match listener.accept().await {
        Ok((stream, remote_address)) => {
            debug!("Accepted connection from {remote_address}");
            Ok((stream, remote_address))
        }
        Err(err) => {
            let msg = format!("Failed to accept incoming connection: {err}");
            Err(Error::Execution(msg))
        }
    }
}

pub struct Listener {
    binding_address: SocketAddr,
    timeouts: Arc<[Duration; 2]>,
    context: Arc<ServerContext>,
}

impl Listener {
    pub fn new(server_config: &ServerConfig, context: ServerContext) -> Self {
        let binding_address = SocketAddr::new(server_config.bind_address, server_config.port);
        let timeouts = [
            Duration::from_secs(server_config.query_timeout),
            Duration::from_secs(server_config.query_timeout_grace_period),
        ];

        Self {
            binding_address,
            timeouts: Arc::new(timeouts),
            context: Arc::new(context),
        }
    }

    pub async fn serve(&self) -> Result<(), Error> {
        info!("Listening on {}", self.binding_address);
        let listener = build_listener(self.binding_address).await?;

        loop {
            debug!("Waiting for incoming connection");
            let (tcp, remote_address) = accept(&listener).await?;
            let stream = TokioIo::new(tcp);

            tokio::spawn(Box::pin(serve_request(
                stream,
                Arc::clone(&self.context),
                Arc::clone(&self.timeouts),
                remote_address,
            )));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_listener_with_port_zero() {
        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        let listener = build_listener(addr).await.unwrap();

        let local_addr = listener.local_addr().unwrap();
        assert_ne!(local_addr.port(), 0);
    }

    #[tokio::test]
    async fn test_build_listener_port_in_use() {
        let first = build_listener(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        let taken = first.local_addr().unwrap();

        let result = build_listener(taken).await;
        assert!(matches!(result, Err(Error::Initialization(msg)) if msg.contains("Failed to bind")));
    }

    #[tokio::test]
    async fn test_accept_connection() {
        let listener = build_listener(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();

        let client = tokio::spawn(async move { TcpStream::connect(addr).await });
        let (_stream, remote_address) = accept(&listener).await.unwrap();
        assert!(client.await.unwrap().is_ok());
        assert_eq!(remote_address.ip(), addr.ip());
    }
}
