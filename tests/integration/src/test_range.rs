//! Range request tests.

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use crate::{TestServer, http_client};

    const ALPHABET: &str = "abcdefghijklmnopqrstuvwxyz";

    async fn seeded() -> (TestServer, reqwest::Client) {
        let server = TestServer::start().await;
        let http = http_client();
        http.put(server.url("/ranges/letters"))
            .body(ALPHABET)
            .send()
            .await
            .expect("put");
        (server, http)
    }

    #[tokio::test]
    async fn test_should_serve_partial_content() {
        let (server, http) = seeded().await;

        let resp = http
            .get(server.url("/ranges/letters"))
            .header("range", "bytes=10-19")
            .send()
            .await
            .expect("get");
        assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(resp.headers()["content-range"], "bytes 10-19/26");
        assert_eq!(resp.headers()["content-length"], "10");
        assert_eq!(resp.text().await.expect("body"), "klmnopqrst");
    }

    #[tokio::test]
    async fn test_should_serve_open_ended_range() {
        let (server, http) = seeded().await;

        let resp = http
            .get(server.url("/ranges/letters"))
            .header("range", "bytes=0-")
            .send()
            .await
            .expect("get");
        assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(resp.headers()["content-range"], "bytes 0-25/26");
        assert_eq!(resp.text().await.expect("body"), ALPHABET);

        let resp = http
            .get(server.url("/ranges/letters"))
            .header("range", "bytes=-3")
            .send()
            .await
            .expect("get suffix");
        assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(resp.text().await.expect("body"), "xyz");
    }

    #[tokio::test]
    async fn test_should_reject_range_past_end() {
        let (server, http) = seeded().await;

        let resp = http
            .get(server.url("/ranges/letters"))
            .header("range", "bytes=100-200")
            .send()
            .await
            .expect("get");
        assert_eq!(resp.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        let body = resp.text().await.expect("body");
        assert!(body.contains("<Code>InvalidRange</Code>"));
    }
}
