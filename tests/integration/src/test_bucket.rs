//! Bucket operation tests.

#[cfg(test)]
mod tests {
    use aws_sdk_s3::primitives::ByteStream;
    use reqwest::StatusCode;

    use crate::{TestServer, http_client, test_bucket_name};

    #[tokio::test]
    async fn test_should_create_and_list_buckets() {
        let server = TestServer::start().await;
        let client = server.s3_client();
        let bucket = test_bucket_name("list");

        client
            .create_bucket()
            .bucket(&bucket)
            .send()
            .await
            .expect("create_bucket");

        let listed = client.list_buckets().send().await.expect("list_buckets");
        let names: Vec<&str> = listed.buckets().iter().filter_map(|b| b.name()).collect();
        assert!(names.contains(&bucket.as_str()), "{names:?}");
    }

    #[tokio::test]
    async fn test_should_list_objects_with_prefix_and_delimiter() {
        let server = TestServer::start().await;
        let client = server.s3_client();
        let bucket = test_bucket_name("prefix");

        client
            .create_bucket()
            .bucket(&bucket)
            .send()
            .await
            .expect("create_bucket");
        for key in ["photos/2024/a.jpg", "photos/2024/b.jpg", "photos/c.jpg", "notes.txt"] {
            client
                .put_object()
                .bucket(&bucket)
                .key(key)
                .body(ByteStream::from_static(b"x"))
                .send()
                .await
                .expect("put_object");
        }

        let listed = client
            .list_objects()
            .bucket(&bucket)
            .prefix("photos/")
            .delimiter("/")
            .send()
            .await
            .expect("list_objects");
        let keys: Vec<&str> = listed.contents().iter().filter_map(|o| o.key()).collect();
        let prefixes: Vec<&str> = listed
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix())
            .collect();
        assert_eq!(keys, vec!["photos/c.jpg"]);
        assert_eq!(prefixes, vec!["photos/2024/"]);

        let page = client
            .list_objects()
            .bucket(&bucket)
            .max_keys(2)
            .send()
            .await
            .expect("list_objects page");
        assert_eq!(page.contents().len(), 2);
        assert_eq!(page.is_truncated(), Some(true));
    }

    #[tokio::test]
    async fn test_should_refuse_to_delete_non_empty_bucket() {
        let server = TestServer::start().await;
        let http = http_client();

        http.put(server.url("/full")).send().await.expect("create");
        http.put(server.url("/full/item"))
            .body("data")
            .send()
            .await
            .expect("put");

        let resp = http
            .delete(server.url("/full"))
            .send()
            .await
            .expect("delete bucket");
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let body = resp.text().await.expect("body");
        assert!(body.contains("<Code>BucketNotEmpty</Code>"));

        http.delete(server.url("/full/item"))
            .send()
            .await
            .expect("delete object");
        let resp = http
            .delete(server.url("/full"))
            .send()
            .await
            .expect("delete bucket");
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_should_report_missing_bucket_on_listing() {
        let server = TestServer::start().await;
        let resp = http_client()
            .get(server.url("/ghost"))
            .send()
            .await
            .expect("list");
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = resp.text().await.expect("body");
        assert!(body.contains("<Code>NoSuchBucket</Code>"));
    }

    #[tokio::test]
    async fn test_should_create_bucket_on_listing_when_enabled() {
        let server = TestServer::start_with(true).await;
        let http = http_client();

        let resp = http.get(server.url("/lazy")).send().await.expect("list");
        assert_eq!(resp.status(), StatusCode::OK);
        let body = resp.text().await.expect("body");
        assert!(body.contains("<Name>lazy</Name>"));

        let resp = http.get(server.url("/")).send().await.expect("list buckets");
        let body = resp.text().await.expect("body");
        assert!(body.contains("<Name>lazy</Name>"));
    }
}
