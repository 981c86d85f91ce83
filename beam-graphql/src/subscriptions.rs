use async_graphql::dynamic::Schema;
use async_graphql::http::{WebSocket as GqlWebSocket, WebSocketProtocols, WsMessage};
use futures_util::{SinkExt, StreamExt};
use salvo::http::header::{HeaderValue, SEC_WEBSOCKET_PROTOCOL};
use salvo::prelude::*;
use salvo::websocket::WebSocketUpgrade;

use crate::context::RequestContext;
use crate::host::UpgradeHandler;

/// WebSocket transport serving subscriptions of one schema.
///
/// Supports both `graphql-transport-ws` (graphql-ws v5+) and `graphql-ws` protocols.
pub struct SubscriptionTransport {
    server: String,
    schema: Schema,
}

impl SubscriptionTransport {
    pub fn new(server: impl Into<String>, schema: Schema) -> Self {
        Self {
            server: server.into(),
            schema,
        }
    }
}

fn requested_protocol(req: &Request) -> WebSocketProtocols {
    req.headers()
        .get(SEC_WEBSOCKET_PROTOCOL)
        .and_then(|v| v.to_str().ok())
        .and_then(|protocols| {
            protocols
                .split(',')
                .map(str::trim)
                .find_map(|p| p.parse::<WebSocketProtocols>().ok())
        })
        .unwrap_or(WebSocketProtocols::GraphQLWS)
}

#[async_trait::async_trait]
impl UpgradeHandler for SubscriptionTransport {
    async fn upgrade(&self, req: &mut Request, depot: &mut Depot, res: &mut Response) {
        let protocol = requested_protocol(req);
        let context = RequestContext::from_request(req, depot);
        let schema = self.schema.clone();
        let server = self.server.clone();

        res.headers_mut().insert(
            SEC_WEBSOCKET_PROTOCOL,
            HeaderValue::from_static(protocol.sec_websocket_protocol()),
        );

        let upgraded = WebSocketUpgrade::new()
            .upgrade(req, res, move |ws| async move {
                tracing::debug!(server = %server, "Subscription connection opened");
                let (mut salvo_sink, salvo_stream) = ws.split();

                let input_stream = Box::pin(salvo_stream.filter_map(|msg| async move {
                    match msg {
                        Ok(msg) if msg.is_text() || msg.is_binary() => {
                            Some(msg.as_bytes().to_vec())
                        }
                        _ => None,
                    }
                }));

                let mut conn_data = async_graphql::Data::default();
                conn_data.insert(context);

                let mut gql_ws = Box::pin(
                    GqlWebSocket::new(schema, input_stream, protocol).connection_data(conn_data),
                );

                while let Some(ws_msg) = gql_ws.next().await {
                    let salvo_msg = match ws_msg {
                        WsMessage::Text(text) => salvo::websocket::Message::text(text),
                        WsMessage::Close(code, reason) => {
                            salvo::websocket::Message::close_with(code, reason)
                        }
                    };
                    if salvo_sink.send(salvo_msg).await.is_err() {
                        break;
                    }
                }
                tracing::debug!(server = %server, "Subscription connection closed");
            })
            .await;

        if let Err(e) = upgraded {
            tracing::warn!(server = %self.server, error = ?e, "WebSocket upgrade failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use salvo::test::TestClient;

    use super::*;

    #[test]
    fn test_protocol_defaults_to_graphql_transport_ws() {
        let req = TestClient::get("http://127.0.0.1:5800/graphql").build();
        assert_eq!(
            requested_protocol(&req).sec_websocket_protocol(),
            "graphql-transport-ws"
        );
    }

    #[test]
    fn test_first_known_requested_protocol_wins() {
        let req = TestClient::get("http://127.0.0.1:5800/graphql")
            .add_header(SEC_WEBSOCKET_PROTOCOL, "chat, graphql-ws", true)
            .build();
        assert_eq!(requested_protocol(&req).sec_websocket_protocol(), "graphql-ws");
    }
}
