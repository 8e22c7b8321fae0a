//! Integration tests for the WebSocket transport.
//!
//! These spin up a real listener and a real dialer on the loopback
//! interface, so they verify actual network behavior rather than mocks:
//! message boundaries, both send directions, and clean-close signaling.

#[cfg(feature = "websocket")]
mod websocket {
    use keyline_transport::{
        Connection, Transport, WebSocketConnection, WebSocketTransport,
    };

    /// Binds a transport on a random port and returns it with its address.
    async fn bind_ephemeral() -> (WebSocketTransport, String) {
        let transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport
            .local_addr()
            .expect("should have local addr")
            .to_string();
        (transport, addr)
    }

    #[tokio::test]
    async fn test_accept_and_send_receive_both_directions() {
        let (mut transport, addr) = bind_ephemeral().await;

        let server_handle = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });

        let client = WebSocketConnection::connect(&format!("ws://{addr}"))
            .await
            .expect("should connect");

        let server_conn = server_handle.await.expect("task should complete");
        assert!(server_conn.id().into_inner() > 0);
        assert_ne!(server_conn.id(), client.id());

        // Server → client.
        server_conn
            .send(b"hello from relay")
            .await
            .expect("send should succeed");
        let got = client
            .recv()
            .await
            .expect("recv should succeed")
            .expect("should have data");
        assert_eq!(got, b"hello from relay");

        // Client → server.
        client
            .send(b"hello from station")
            .await
            .expect("send should succeed");
        let got = server_conn
            .recv()
            .await
            .expect("recv should succeed")
            .expect("should have data");
        assert_eq!(got, b"hello from station");

        server_conn.close().await.expect("close should succeed");
    }

    #[tokio::test]
    async fn test_recv_returns_none_on_peer_close() {
        let (mut transport, addr) = bind_ephemeral().await;

        let server_handle = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });

        let client = WebSocketConnection::connect(&format!("ws://{addr}"))
            .await
            .expect("should connect");
        let server_conn = server_handle.await.unwrap();

        client.close().await.expect("close should succeed");

        let result = server_conn.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on peer close");
    }

    #[tokio::test]
    async fn test_connect_to_dead_port_fails() {
        // Bind and immediately drop to get a port nobody is listening on.
        let (transport, addr) = bind_ephemeral().await;
        drop(transport);

        let result =
            WebSocketConnection::connect(&format!("ws://{addr}")).await;
        assert!(result.is_err());
    }
}
