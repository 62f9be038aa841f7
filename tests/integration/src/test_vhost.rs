//! Virtual-host addressing tests.

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use crate::{TestServer, http_client};

    #[tokio::test]
    async fn test_should_take_bucket_from_host_header() {
        let server = TestServer::start().await;
        let http = http_client();
        let host = format!("media.localhost:{}", server.port());

        let resp = http
            .put(server.url("/"))
            .header("host", &host)
            .send()
            .await
            .expect("create bucket");
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = http
            .put(server.url("/clip.txt"))
            .header("host", &host)
            .body("virtual")
            .send()
            .await
            .expect("put");
        assert_eq!(resp.status(), StatusCode::OK);

        // The same object through path-style addressing.
        let resp = http
            .get(server.url("/media/clip.txt"))
            .send()
            .await
            .expect("get");
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.text().await.expect("body"), "virtual");

        let resp = http
            .get(server.url("/"))
            .header("host", &host)
            .send()
            .await
            .expect("list");
        let body = resp.text().await.expect("body");
        assert!(body.contains("<Key>clip.txt</Key>"));
    }
}
