#[cfg(test)]
mod tests {
    use futures_util::stream;
    use salvo::http::body::ResBody;
    use salvo::http::header::{CONTENT_TYPE, HeaderValue};
    use salvo::prelude::*;
    use salvo::test::{ResponseExt, TestClient};

    use crate::adapter::{
        AdapterError, EngineBody, EngineResponse, from_engine_response, to_engine_request,
    };
    use crate::config::DEFAULT_MAX_BODY_SIZE;

    // ─── to_engine_request ────────────────────────────────────────────────────

    #[tokio::test]
    async fn repeated_headers_are_joined_in_order() {
        let mut req = TestClient::get("http://0.0.0.0/graphql")
            .add_header("x-tag", "a", false)
            .add_header("x-tag", "b", false)
            .add_header("x-single", "c", true)
            .build();

        let engine_req = to_engine_request(&mut req, DEFAULT_MAX_BODY_SIZE).await.unwrap();

        assert_eq!(engine_req.headers.get("x-tag").map(String::as_str), Some("a, b"));
        assert_eq!(engine_req.header("X-Single"), Some("c"));
    }

    #[tokio::test]
    async fn non_text_header_values_are_skipped() {
        let mut req = TestClient::get("http://0.0.0.0/graphql").build();
        req.headers_mut()
            .append("x-binary", HeaderValue::from_bytes(&[0xfe, 0xff]).unwrap());

        let engine_req = to_engine_request(&mut req, DEFAULT_MAX_BODY_SIZE).await.unwrap();

        assert!(engine_req.header("x-binary").is_none());
    }

    #[tokio::test]
    async fn search_keeps_leading_question_mark() {
        let mut req = TestClient::get("http://0.0.0.0/graphql?query=%7Bhello%7D").build();
        let engine_req = to_engine_request(&mut req, DEFAULT_MAX_BODY_SIZE).await.unwrap();
        assert_eq!(engine_req.search, "?query=%7Bhello%7D");
        assert_eq!(engine_req.method, "GET");

        let mut req = TestClient::get("http://0.0.0.0/graphql").build();
        let engine_req = to_engine_request(&mut req, DEFAULT_MAX_BODY_SIZE).await.unwrap();
        assert_eq!(engine_req.search, "");
    }

    #[tokio::test]
    async fn body_is_forwarded_untouched() {
        let mut req = TestClient::post("http://0.0.0.0/graphql")
            .raw_json(r#"{"query":"{ hello }"}"#)
            .build();

        let engine_req = to_engine_request(&mut req, DEFAULT_MAX_BODY_SIZE).await.unwrap();

        assert_eq!(engine_req.method, "POST");
        assert_eq!(engine_req.body, br#"{"query":"{ hello }"}"#.to_vec());
        assert!(engine_req.header("content-type").is_some());
    }

    #[tokio::test]
    async fn body_over_the_limit_is_rejected() {
        let payload = format!(r#"{{"query":"{{ {} }}"}}"#, "hello ".repeat(32));
        let mut req = TestClient::post("http://0.0.0.0/graphql")
            .raw_json(payload.clone())
            .build();
        let err = to_engine_request(&mut req, 64).await.unwrap_err();
        assert!(matches!(err, AdapterError::Body(_)));

        let mut req = TestClient::post("http://0.0.0.0/graphql")
            .raw_json(payload.clone())
            .build();
        let engine_req = to_engine_request(&mut req, 1024).await.unwrap();
        assert_eq!(engine_req.body, payload.into_bytes());
    }

    #[tokio::test]
    async fn accepts_matches_any_listed_mime() {
        let mut req = TestClient::get("http://0.0.0.0/graphql")
            .add_header("accept", "text/html;q=0.9, text/event-stream", true)
            .build();
        let engine_req = to_engine_request(&mut req, DEFAULT_MAX_BODY_SIZE).await.unwrap();

        assert!(engine_req.accepts("text/event-stream"));
        assert!(engine_req.accepts("text/html"));
        assert!(!engine_req.accepts("application/json"));
    }

    // ─── from_engine_response ─────────────────────────────────────────────────

    #[tokio::test]
    async fn complete_body_copies_status_headers_and_text() {
        let mut engine_res = EngineResponse::complete(StatusCode::CREATED, r#"{"data":{}}"#);
        engine_res
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut res = Response::new();
        from_engine_response(&mut res, engine_res).unwrap();

        assert_eq!(res.status_code, Some(StatusCode::CREATED));
        assert_eq!(
            res.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(res.take_string().await.unwrap(), r#"{"data":{}}"#);
    }

    #[tokio::test]
    async fn missing_status_defaults_to_ok() {
        let engine_res = EngineResponse {
            status: None,
            headers: Default::default(),
            body: EngineBody::Complete("ok".to_string()),
        };

        let mut res = Response::new();
        from_engine_response(&mut res, engine_res).unwrap();

        assert_eq!(res.status_code, Some(StatusCode::OK));
        assert_eq!(res.take_string().await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn chunked_body_is_refused_without_writing() {
        let engine_res = EngineResponse {
            status: Some(StatusCode::OK),
            headers: Default::default(),
            body: EngineBody::Chunked(Box::pin(stream::iter(vec!["a".to_string()]))),
        };

        let mut res = Response::new();
        let err = from_engine_response(&mut res, engine_res).unwrap_err();

        assert!(matches!(err, AdapterError::UnsupportedBody));
        assert!(matches!(res.body, ResBody::None));
    }
}
