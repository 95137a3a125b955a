//! WebSocket client tests against an in-process controller stand-in

use std::future::Future;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use intellicenter_api::{
    keys, ApiError, Request, TransportEvent, Unit, UnitConnector, UnitSession, WebSocketConnector,
};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message as Frame;
use tokio_tungstenite::{accept_async, WebSocketStream};

type ServerSocket = WebSocketStream<TcpStream>;

/// Accept one WebSocket client and hand it to `handler`
async fn serve_once<F, Fut>(handler: F) -> Unit
where
    F: FnOnce(ServerSocket) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let socket = accept_async(tcp).await.unwrap();
        handler(socket).await;
    });
    Unit {
        name: "Pentair -i: test".to_string(),
        address: addr.ip(),
        port: addr.port(),
    }
}

async fn next_request(socket: &mut ServerSocket) -> Value {
    loop {
        match socket.next().await {
            Some(Ok(Frame::Text(text))) => return serde_json::from_str(text.as_str()).unwrap(),
            Some(Ok(_)) => continue,
            other => panic!("client went away: {:?}", other),
        }
    }
}

async fn send_json(socket: &mut ServerSocket, value: Value) {
    socket
        .send(Frame::Text(value.to_string().into()))
        .await
        .unwrap();
}

async fn drain(mut socket: ServerSocket) {
    while let Some(Ok(_)) = socket.next().await {}
}

#[tokio::test]
async fn test_request_response_and_notification() {
    let unit = serve_once(|mut socket| async move {
        let request = next_request(&mut socket).await;
        assert_eq!(request["command"], "RequestParamList");
        assert_eq!(request["objectList"][0]["objnam"], "B1101");

        send_json(
            &mut socket,
            json!({
                "command": "NotifyList",
                "objectList": [{"objnam": "B1101", "params": {"STATUS": "ON"}}]
            }),
        )
        .await;
        send_json(
            &mut socket,
            json!({
                "command": "SendParamList",
                "messageID": request["messageID"],
                "response": "200",
                "objectList": [{"objnam": "B1101", "params": {"LSTTMP": "81"}}]
            }),
        )
        .await;
        drain(socket).await;
    })
    .await;

    let connector = WebSocketConnector::default();
    let (session, mut events) = connector.connect(&unit).await.unwrap();

    let response = session
        .request(Request::subscribe("B1101", &[keys::LSTTMP]))
        .await
        .unwrap();
    assert_eq!(response.object_list[0].text(keys::LSTTMP), Some("81"));

    match events.recv().await {
        Some(TransportEvent::Notify(objects)) => {
            assert_eq!(objects[0].text(keys::STATUS), Some("ON"));
        }
        other => panic!("expected notification, got {:?}", other),
    }

    session.close().await;
}

#[tokio::test]
async fn test_rejected_request() {
    let unit = serve_once(|mut socket| async move {
        let request = next_request(&mut socket).await;
        send_json(
            &mut socket,
            json!({
                "command": "SendParamList",
                "messageID": request["messageID"],
                "response": "400",
                "description": "unknown object"
            }),
        )
        .await;
        drain(socket).await;
    })
    .await;

    let (session, _events) = WebSocketConnector::default().connect(&unit).await.unwrap();
    let result = session.request(Request::set_setpoint("NOPE", 80)).await;

    match result {
        Err(ApiError::Rejected { code, description }) => {
            assert_eq!(code, "400");
            assert_eq!(description, "unknown object");
        }
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn test_close_fails_pending_request_and_emits_closed_once() {
    let unit = serve_once(|mut socket| async move {
        let _ = next_request(&mut socket).await;
        socket.close(None).await.unwrap();
        drain(socket).await;
    })
    .await;

    let (session, mut events) = WebSocketConnector::default().connect(&unit).await.unwrap();
    let result = session.request(Request::system_configuration()).await;
    assert!(matches!(result, Err(ApiError::ConnectionClosed)));

    assert_eq!(events.recv().await, Some(TransportEvent::Closed));
    assert_eq!(events.recv().await, None);

    // the session stays closed for later callers
    let result = session.request(Request::chemical_status()).await;
    assert!(matches!(
        result,
        Err(ApiError::ConnectionClosed) | Err(ApiError::NetworkError(_))
    ));
}

#[tokio::test]
async fn test_undecodable_frame_is_transient() {
    let unit = serve_once(|mut socket| async move {
        socket
            .send(Frame::Text("{{ definitely not json".into()))
            .await
            .unwrap();
        send_json(
            &mut socket,
            json!({
                "command": "NotifyList",
                "objectList": [{"objnam": "CHR01", "params": {"SALT": "3200"}}]
            }),
        )
        .await;
        drain(socket).await;
    })
    .await;

    let (_session, mut events) = WebSocketConnector::default().connect(&unit).await.unwrap();

    assert!(matches!(events.recv().await, Some(TransportEvent::Error(_))));
    assert!(matches!(events.recv().await, Some(TransportEvent::Notify(_))));
}

#[tokio::test]
async fn test_request_timeout() {
    let unit = serve_once(|socket| drain(socket)).await;

    let connector = WebSocketConnector::new(Duration::from_millis(100));
    let (session, _events) = connector.connect(&unit).await.unwrap();

    let result = session.request(Request::circuit_status()).await;
    assert!(matches!(result, Err(ApiError::Timeout)));
}

#[tokio::test]
async fn test_connect_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let unit = Unit {
        name: "gone".to_string(),
        address: addr.ip(),
        port: addr.port(),
    };
    let result = WebSocketConnector::default().connect(&unit).await;
    assert!(matches!(result, Err(ApiError::ConnectError(_))));
}

#[tokio::test]
async fn test_light_command_unsupported() {
    let unit = serve_once(|socket| drain(socket)).await;
    let (session, _events) = WebSocketConnector::default().connect(&unit).await.unwrap();

    let forwarded = session
        .send_light_command(&json!("PARTY"))
        .await
        .unwrap();
    assert!(!forwarded);
}
