//! Service-level behavior tests.

#[cfg(test)]
mod tests {
    use reqwest::{Method, StatusCode};

    use crate::{TestServer, http_client};

    #[tokio::test]
    async fn test_should_reject_unsupported_method() {
        let server = TestServer::start().await;

        let resp = http_client()
            .request(Method::PATCH, server.url("/bucket/key"))
            .send()
            .await
            .expect("patch");
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_should_tag_every_response() {
        let server = TestServer::start().await;

        let resp = http_client()
            .get(server.url("/missing/key"))
            .send()
            .await
            .expect("get");
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let headers = resp.headers();
        assert!(headers.contains_key("x-amz-request-id"));
        assert_eq!(headers["server"], "locals3");
        let request_id = headers["x-amz-request-id"]
            .to_str()
            .expect("request id")
            .to_owned();
        let body = resp.text().await.expect("body");
        assert!(body.contains(&request_id));
    }

    #[tokio::test]
    async fn test_should_stop_on_shutdown() {
        let server = TestServer::start().await;
        let url = server.url("/");
        server.stop().await;

        let result = http_client().get(url).send().await;
        assert!(result.is_err());
    }
}
