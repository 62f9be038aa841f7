//! Multipart upload tests.

#[cfg(test)]
mod tests {
    use aws_sdk_s3::primitives::ByteStream;
    use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};

    use crate::{TestServer, test_bucket_name};

    #[tokio::test]
    async fn test_should_assemble_parts_in_part_number_order() {
        let server = TestServer::start().await;
        let client = server.s3_client();
        let bucket = test_bucket_name("mpu");
        let key = "big/object.bin";

        client
            .create_bucket()
            .bucket(&bucket)
            .send()
            .await
            .expect("create_bucket");

        let upload = client
            .create_multipart_upload()
            .bucket(&bucket)
            .key(key)
            .send()
            .await
            .expect("create_multipart_upload");
        let upload_id = upload.upload_id().expect("upload id").to_owned();

        // Upload part 2 before part 1.
        let mut parts = Vec::new();
        for (number, data) in [(2, "second"), (1, "first-")] {
            let part = client
                .upload_part()
                .bucket(&bucket)
                .key(key)
                .upload_id(&upload_id)
                .part_number(number)
                .body(ByteStream::from_static(data.as_bytes()))
                .send()
                .await
                .expect("upload_part");
            parts.push(
                CompletedPart::builder()
                    .part_number(number)
                    .e_tag(part.e_tag().expect("part etag"))
                    .build(),
            );
        }

        let completed = client
            .complete_multipart_upload()
            .bucket(&bucket)
            .key(key)
            .upload_id(&upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .expect("complete_multipart_upload");
        assert_eq!(completed.key(), Some(key));
        let location = completed.location().expect("location");
        assert!(location.contains(&format!(":{}/", server.port())), "{location}");

        let got = client
            .get_object()
            .bucket(&bucket)
            .key(key)
            .send()
            .await
            .expect("get_object");
        let data = got.body.collect().await.expect("collect").into_bytes();
        assert_eq!(data.as_ref(), b"first-second");
    }

    #[tokio::test]
    async fn test_should_copy_part_from_existing_object() {
        let server = TestServer::start().await;
        let client = server.s3_client();
        let bucket = test_bucket_name("mpucopy");

        client
            .put_object()
            .bucket(&bucket)
            .key("seed")
            .body(ByteStream::from_static(b"seeded-"))
            .send()
            .await
            .expect("put seed");

        let upload = client
            .create_multipart_upload()
            .bucket(&bucket)
            .key("joined")
            .send()
            .await
            .expect("create_multipart_upload");
        let upload_id = upload.upload_id().expect("upload id").to_owned();

        let copied = client
            .upload_part_copy()
            .bucket(&bucket)
            .key("joined")
            .upload_id(&upload_id)
            .part_number(1)
            .copy_source(format!("{bucket}/seed"))
            .send()
            .await
            .expect("upload_part_copy");
        let copied_etag = copied
            .copy_part_result()
            .and_then(|r| r.e_tag())
            .expect("copy etag")
            .to_owned();

        let tail = client
            .upload_part()
            .bucket(&bucket)
            .key("joined")
            .upload_id(&upload_id)
            .part_number(2)
            .body(ByteStream::from_static(b"tail"))
            .send()
            .await
            .expect("upload_part");

        let parts = vec![
            CompletedPart::builder()
                .part_number(1)
                .e_tag(copied_etag)
                .build(),
            CompletedPart::builder()
                .part_number(2)
                .e_tag(tail.e_tag().expect("etag"))
                .build(),
        ];
        client
            .complete_multipart_upload()
            .bucket(&bucket)
            .key("joined")
            .upload_id(&upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .expect("complete_multipart_upload");

        let got = client
            .get_object()
            .bucket(&bucket)
            .key("joined")
            .send()
            .await
            .expect("get_object");
        let data = got.body.collect().await.expect("collect").into_bytes();
        assert_eq!(data.as_ref(), b"seeded-tail");
    }
}
