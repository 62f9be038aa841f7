//! Object lifecycle tests.

#[cfg(test)]
mod tests {
    use aws_sdk_s3::primitives::ByteStream;
    use reqwest::StatusCode;

    use crate::{TestServer, http_client, test_bucket_name};

    #[tokio::test]
    async fn test_should_store_fetch_revalidate_and_delete() {
        let server = TestServer::start().await;
        let http = http_client();

        let resp = http.put(server.url("/mybucket")).send().await.expect("create");
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = http
            .put(server.url("/mybucket/a.txt"))
            .body("hello")
            .send()
            .await
            .expect("put");
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = http
            .get(server.url("/mybucket/a.txt"))
            .send()
            .await
            .expect("get");
        assert_eq!(resp.status(), StatusCode::OK);
        let etag = resp.headers()["etag"].to_str().expect("etag").to_owned();
        assert_eq!(etag, "\"5d41402abc4b2a76b9719d911017c592\"");
        assert_eq!(resp.text().await.expect("body"), "hello");

        for _ in 0..2 {
            let resp = http
                .get(server.url("/mybucket/a.txt"))
                .header("if-none-match", &etag)
                .send()
                .await
                .expect("conditional get");
            assert_eq!(resp.status(), StatusCode::NOT_MODIFIED);
            assert!(resp.bytes().await.expect("body").is_empty());
        }

        let resp = http
            .delete(server.url("/mybucket/a.txt"))
            .send()
            .await
            .expect("delete");
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let resp = http
            .get(server.url("/mybucket/a.txt"))
            .send()
            .await
            .expect("get after delete");
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(resp.headers()["content-type"], "application/xml");
        let body = resp.text().await.expect("body");
        assert!(body.contains("<Code>NoSuchKey</Code>"));
        assert!(body.contains("a.txt"));

        server.stop().await;
    }

    #[tokio::test]
    async fn test_should_round_trip_through_sdk() {
        let server = TestServer::start().await;
        let client = server.s3_client();
        let bucket = test_bucket_name("sdk");

        client
            .create_bucket()
            .bucket(&bucket)
            .send()
            .await
            .expect("create_bucket");
        client
            .put_object()
            .bucket(&bucket)
            .key("docs/readme.md")
            .body(ByteStream::from_static(b"# readme"))
            .content_type("text/markdown")
            .metadata("author", "locals3")
            .send()
            .await
            .expect("put_object");

        let head = client
            .head_object()
            .bucket(&bucket)
            .key("docs/readme.md")
            .send()
            .await
            .expect("head_object");
        assert_eq!(head.content_length(), Some(8));
        assert_eq!(head.content_type(), Some("text/markdown"));
        assert_eq!(
            head.metadata().and_then(|m| m.get("author")).map(String::as_str),
            Some("locals3")
        );

        let got = client
            .get_object()
            .bucket(&bucket)
            .key("docs/readme.md")
            .send()
            .await
            .expect("get_object");
        let data = got.body.collect().await.expect("collect").into_bytes();
        assert_eq!(data.as_ref(), b"# readme");

        let missing = client
            .get_object()
            .bucket(&bucket)
            .key("nope")
            .send()
            .await;
        assert!(missing.is_err(), "missing key should fail");
    }

    #[tokio::test]
    async fn test_should_copy_object_with_sdk() {
        let server = TestServer::start().await;
        let client = server.s3_client();

        client
            .put_object()
            .bucket("source")
            .key("orig.txt")
            .body(ByteStream::from_static(b"copy me"))
            .send()
            .await
            .expect("put_object");

        let copied = client
            .copy_object()
            .bucket("target")
            .key("copy.txt")
            .copy_source("source/orig.txt")
            .send()
            .await
            .expect("copy_object");
        assert!(copied.copy_object_result().and_then(|r| r.e_tag()).is_some());

        let got = client
            .get_object()
            .bucket("target")
            .key("copy.txt")
            .send()
            .await
            .expect("get copy");
        let data = got.body.collect().await.expect("collect").into_bytes();
        assert_eq!(data.as_ref(), b"copy me");
    }
}
