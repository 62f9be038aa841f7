//! Browser form upload tests.

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use crate::{TestServer, http_client};

    const BOUNDARY: &str = "----locals3formboundary";

    fn form_body(fields: &[(&str, &str)], filename: &str, data: &str) -> String {
        let mut body = String::new();
        for (name, value) in fields {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            ));
        }
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
             Content-Type: text/plain\r\n\r\n{data}\r\n--{BOUNDARY}--\r\n"
        ));
        body
    }

    async fn post_form(server: &TestServer, path: &str, body: String) -> reqwest::Response {
        http_client()
            .post(server.url(path))
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(body)
            .send()
            .await
            .expect("post form")
    }

    #[tokio::test]
    async fn test_should_store_form_upload_with_filename_key() {
        let server = TestServer::start().await;
        let body = form_body(
            &[("key", "uploads/${filename}"), ("x-amz-meta-origin", "browser")],
            "notes.txt",
            "from a form",
        );

        let resp = post_form(&server, "/forms", body).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert!(resp.headers().contains_key("etag"));
        assert_eq!(resp.headers()["access-control-allow-origin"], "*");

        let resp = http_client()
            .get(server.url("/forms/uploads/notes.txt"))
            .send()
            .await
            .expect("get");
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["x-amz-meta-origin"], "browser");
        assert_eq!(resp.text().await.expect("body"), "from a form");
    }

    #[tokio::test]
    async fn test_should_render_post_response_for_201() {
        let server = TestServer::start().await;
        let body = form_body(
            &[("key", "created.txt"), ("success_action_status", "201")],
            "c.txt",
            "created",
        );

        let resp = post_form(&server, "/forms", body).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let xml = resp.text().await.expect("body");
        assert!(xml.contains("<PostResponse"));
        assert!(xml.contains("<Key>created.txt</Key>"));
        assert!(xml.contains("<Bucket>forms</Bucket>"));
    }

    #[tokio::test]
    async fn test_should_redirect_after_form_upload() {
        let server = TestServer::start().await;
        let body = form_body(
            &[
                ("key", "r.txt"),
                ("success_action_redirect", "http://example.com/done"),
            ],
            "r.txt",
            "redirected",
        );

        let resp = post_form(&server, "/forms", body).await;
        assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(resp.headers()["location"], "http://example.com/done");
    }

    #[tokio::test]
    async fn test_should_reject_form_without_key() {
        let server = TestServer::start().await;
        let body = form_body(&[], "k.txt", "no key");

        let resp = post_form(&server, "/forms", body).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
