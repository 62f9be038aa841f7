//! CORS and health check tests.

#[cfg(test)]
mod tests {
    use reqwest::{Method, StatusCode};

    use crate::{TestServer, http_client};

    #[tokio::test]
    async fn test_should_answer_preflight_for_any_path() {
        let server = TestServer::start().await;

        for path in ["/", "/bucket", "/bucket/some/key"] {
            let resp = http_client()
                .request(Method::OPTIONS, server.url(path))
                .header("origin", "http://app.local")
                .header("access-control-request-method", "PUT")
                .send()
                .await
                .expect("preflight");
            assert_eq!(resp.status(), StatusCode::OK);
            let headers = resp.headers();
            assert_eq!(headers["access-control-allow-origin"], "*");
            let methods = headers["access-control-allow-methods"]
                .to_str()
                .expect("methods");
            assert!(methods.contains("PUT"));
            assert!(methods.contains("POST"));
            assert!(headers.contains_key("access-control-allow-headers"));
        }
    }

    #[tokio::test]
    async fn test_should_expose_etag_on_part_upload() {
        let server = TestServer::start().await;
        let http = http_client();

        let resp = http
            .post(server.url("/cors/file.bin?uploads"))
            .send()
            .await
            .expect("initiate");
        assert_eq!(resp.status(), StatusCode::OK);
        let xml = resp.text().await.expect("body");
        let upload_id = xml
            .split("<UploadId>")
            .nth(1)
            .and_then(|rest| rest.split("</UploadId>").next())
            .expect("upload id")
            .to_owned();

        let resp = http
            .put(server.url(&format!(
                "/cors/file.bin?partNumber=1&uploadId={upload_id}"
            )))
            .body("part")
            .send()
            .await
            .expect("upload part");
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["access-control-allow-origin"], "*");
        assert_eq!(resp.headers()["access-control-expose-headers"], "ETag");
        assert!(resp.headers().contains_key("etag"));
    }

    #[tokio::test]
    async fn test_should_report_health() {
        let server = TestServer::start().await;

        let resp = http_client()
            .get(server.url("/_locals3/health"))
            .send()
            .await
            .expect("health");
        assert_eq!(resp.status(), StatusCode::OK);
        let json: serde_json::Value = resp.json().await.expect("json");
        assert_eq!(json["status"], "running");
        assert!(json["version"].is_string());
    }
}
