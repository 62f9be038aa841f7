//! Pull-through replication tests.

#[cfg(test)]
mod tests {
    use locals3_core::ObjectStore;
    use reqwest::StatusCode;

    use crate::{TestServer, http_client};

    #[tokio::test(flavor = "multi_thread")]
    async fn test_should_fetch_miss_from_upstream_and_keep_it() {
        let upstream = TestServer::start().await;
        let (server, store) = TestServer::start_replicating(&upstream.endpoint()).await;
        let http = http_client();

        let resp = http
            .put(upstream.url("/origin/docs/report.csv"))
            .header("content-type", "text/csv")
            .header("x-amz-meta-team", "billing")
            .body("a,b\n1,2\n")
            .send()
            .await
            .expect("seed upstream");
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = http
            .get(server.url("/origin/docs/report.csv"))
            .send()
            .await
            .expect("get through replica");
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["content-type"], "text/csv");
        assert_eq!(resp.headers()["x-amz-meta-team"], "billing");
        assert_eq!(resp.text().await.expect("body"), "a,b\n1,2\n");

        let local = store
            .inner()
            .get_object("origin", "docs/report.csv")
            .expect("get local")
            .expect("replicated locally");
        assert_eq!(local.data.as_ref(), b"a,b\n1,2\n");
        assert_eq!(local.metadata.content_type, "text/csv");
        assert_eq!(
            local.metadata.custom_metadata.get("team").map(String::as_str),
            Some("billing")
        );

        // Served from the local copy once upstream is gone.
        upstream.stop().await;
        let resp = http
            .get(server.url("/origin/docs/report.csv"))
            .send()
            .await
            .expect("get after upstream stopped");
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_should_answer_no_such_key_when_upstream_lacks_object() {
        let upstream = TestServer::start().await;
        let (server, store) = TestServer::start_replicating(&upstream.endpoint()).await;

        let resp = http_client()
            .get(server.url("/origin/absent.txt"))
            .send()
            .await
            .expect("get");
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = resp.text().await.expect("body");
        assert!(body.contains("<Code>NoSuchKey</Code>"));
        assert!(store.inner().get_bucket("origin").expect("get bucket").is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_should_answer_no_such_key_when_upstream_is_down() {
        let (server, _store) = TestServer::start_replicating("http://127.0.0.1:1").await;

        let resp = http_client()
            .get(server.url("/origin/absent.txt"))
            .send()
            .await
            .expect("get");
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
