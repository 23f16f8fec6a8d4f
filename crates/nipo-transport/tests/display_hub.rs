//! Integration tests for the display hub.

#[cfg(feature = "websocket")]
mod display_hub {
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use nipo_transport::{DisplayHub, TransportError};
    use tokio_tungstenite::tungstenite::Message;

    type Client = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    // =====================================================================
    // Helpers
    // =====================================================================

    async fn hub() -> DisplayHub {
        DisplayHub::bind("127.0.0.1:0").await.expect("hub should bind")
    }

    async fn connect(hub: &DisplayHub) -> Client {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{}", hub.local_addr()))
            .await
            .expect("screen should connect");
        ws
    }

    async fn next_text(client: &mut Client) -> String {
        let msg = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("frame should arrive")
            .expect("stream should be open")
            .expect("message should be valid");
        msg.into_text().expect("frames are text").as_str().to_owned()
    }

    // =====================================================================
    // Delivery
    // =====================================================================

    #[tokio::test]
    async fn test_late_screen_gets_current_frame() {
        let hub = hub().await;
        hub.publish(&b"frame-1"[..]).unwrap();
        hub.publish(&b"frame-2"[..]).unwrap();

        let mut screen = connect(&hub).await;

        assert_eq!(next_text(&mut screen).await, "frame-2");
    }

    #[tokio::test]
    async fn test_publish_reaches_connected_screens() {
        let hub = hub().await;
        let mut a = connect(&hub).await;
        let mut b = connect(&hub).await;
        hub.wait_for_subscribers(2).await;

        hub.publish(&b"frame-1"[..]).unwrap();

        assert_eq!(next_text(&mut a).await, "frame-1");
        assert_eq!(next_text(&mut b).await, "frame-1");
        assert_eq!(hub.subscribers(), 2);
    }

    #[tokio::test]
    async fn test_screen_with_nothing_published_waits() {
        let hub = hub().await;
        let mut screen = connect(&hub).await;
        hub.wait_for_subscribers(1).await;

        let nothing = tokio::time::timeout(Duration::from_millis(100), screen.next()).await;
        assert!(nothing.is_err(), "no frame should be sent before the first publish");

        hub.publish(&b"first"[..]).unwrap();
        assert_eq!(next_text(&mut screen).await, "first");
    }

    #[tokio::test]
    async fn test_screen_messages_are_ignored() {
        let hub = hub().await;
        let mut screen = connect(&hub).await;
        hub.wait_for_subscribers(1).await;

        screen.send(Message::Text("hello".into())).await.unwrap();
        hub.publish(&b"frame-1"[..]).unwrap();

        assert_eq!(next_text(&mut screen).await, "frame-1");
        assert_eq!(hub.subscribers(), 1);
    }

    // =====================================================================
    // Lifecycle
    // =====================================================================

    #[tokio::test]
    async fn test_closed_screen_is_uncounted() {
        let hub = hub().await;
        let mut screen = connect(&hub).await;
        hub.wait_for_subscribers(1).await;

        screen.close(None).await.unwrap();

        let mut count = hub.watch_subscribers();
        tokio::time::timeout(Duration::from_secs(5), count.wait_for(|n| *n == 0))
            .await
            .expect("count should drop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_closes_screens_and_refuses_publish() {
        let hub = hub().await;
        let mut screen = connect(&hub).await;
        hub.wait_for_subscribers(1).await;

        tokio::time::timeout(Duration::from_secs(5), hub.shutdown())
            .await
            .expect("shutdown should finish");

        assert_eq!(hub.subscribers(), 0);
        let last = screen.next().await;
        assert!(matches!(last, Some(Ok(Message::Close(_))) | None));
        assert!(matches!(hub.publish(&b"late"[..]), Err(TransportError::Shutdown)));
    }

    #[tokio::test]
    async fn test_shutdown_completes_with_stalled_screen() {
        let hub = hub().await;
        // Never read from: its socket buffers fill and sends block.
        let _stalled = connect(&hub).await;
        hub.wait_for_subscribers(1).await;

        let frame = vec![b'x'; 1 << 20];
        for _ in 0..32 {
            hub.publish(frame.clone()).unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        tokio::time::timeout(Duration::from_secs(3), hub.shutdown())
            .await
            .expect("shutdown should not wait on a stalled screen");
        assert_eq!(hub.subscribers(), 0);
    }
}
