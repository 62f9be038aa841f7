//! Operation dispatch: classify → decide → render.
//!
//! [`S3Handler`] is the boundary between the hyper service and the
//! operation logic. [`StoreHandler`] implements it on top of any
//! [`ObjectStore`]: every call is synchronous and returns an explicit
//! response value, so the service runs it on the blocking pool.

use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http::header;
use tracing::{debug, error};

use locals3_core::{ObjectStore, ObjectUpload, StoreError};
use locals3_model::types::DEFAULT_MAX_KEYS;
use locals3_model::{
    BucketQuery, CanonicalRequest, CopySource, Operation, S3Error, S3ErrorCode, StoredObject,
};

use crate::body::S3ResponseBody;
use crate::form::{self, MultipartForm};
use crate::multipart;
use crate::request::{META_PREFIX, metadata_directive, object_upload};
use crate::response::{
    CONTENT_TYPE_TEXT_XML, CONTENT_TYPE_XML, build_response, render_object, set_header,
    with_upload_cors, xml_body,
};

/// Placeholder in a form `key` field replaced by the uploaded filename.
const FILENAME_PLACEHOLDER: &str = "${filename}";

/// Filename used when the form part does not carry one.
const DEFAULT_FILENAME: &str = "default";

/// Handles a classified request and produces a complete response.
pub trait S3Handler: Send + Sync + 'static {
    /// Handle one request.
    ///
    /// `head` carries the original request headers; `body` is the fully
    /// collected request payload.
    fn handle(
        &self,
        request: &CanonicalRequest,
        head: &http::request::Parts,
        body: Bytes,
    ) -> Result<http::Response<S3ResponseBody>, S3Error>;
}

/// Behaviour switches for [`StoreHandler`].
#[derive(Debug, Clone, Copy, Default)]
pub struct HandlerConfig {
    /// Create a missing bucket when it is listed instead of answering 404.
    pub create_buckets: bool,
    /// Port reported in `Location` URLs.
    pub port: u16,
}

/// [`S3Handler`] backed by an [`ObjectStore`].
#[derive(Debug)]
pub struct StoreHandler<S> {
    store: Arc<S>,
    config: HandlerConfig,
}

impl<S> Clone for StoreHandler<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config,
        }
    }
}

impl<S: ObjectStore> StoreHandler<S> {
    /// Create a handler over `store`.
    #[must_use]
    pub fn new(store: Arc<S>, config: HandlerConfig) -> Self {
        Self { store, config }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The handler configuration.
    #[must_use]
    pub fn config(&self) -> HandlerConfig {
        self.config
    }
}

impl<S: ObjectStore> S3Handler for StoreHandler<S> {
    fn handle(
        &self,
        request: &CanonicalRequest,
        head: &http::request::Parts,
        body: Bytes,
    ) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let op = request.operation();
        debug!(
            operation = %op,
            bucket = ?request.bucket(),
            key = ?request.object(),
            "dispatching S3 operation"
        );

        match op {
            Operation::ListBuckets => self.list_buckets(),
            Operation::ListBucketObjects => self.list_bucket_objects(request),
            Operation::Head | Operation::Get => self.get_object(request, head),
            Operation::GetAcl => self.get_acl(),
            Operation::SetAcl => put_response(StatusCode::OK, S3ResponseBody::empty()),
            Operation::CreateBucket => self.create_bucket(request),
            Operation::StoreObject => self.store_object(request, head, body),
            Operation::CopyObject(source) => self.copy_object(request, head, source),
            Operation::DeleteObject => self.delete_object(request),
            Operation::DeleteBucket => self.delete_bucket(request),
            Operation::InitiateMultipartUpload => initiate_multipart_upload(request),
            Operation::UploadPart {
                upload_id,
                part_number,
            } => self.upload_part(request, head, body, upload_id, *part_number),
            Operation::UploadPartCopy {
                upload_id,
                part_number,
                source,
            } => self.upload_part_copy(request, upload_id, *part_number, source),
            Operation::CompleteMultipartUpload { upload_id } => {
                self.complete_multipart_upload(request, upload_id, &body)
            }
            Operation::PostObject => self.post_object(request, head, &body),
            Operation::UnrecognizedPost => Err(S3Error::invalid_request(
                "POST requires ?uploads, ?uploadId or a multipart/form-data body",
            )),
            Operation::Unknown => Err(unknown_operation(request)),
        }
    }
}

impl<S: ObjectStore> StoreHandler<S> {
    fn list_buckets(&self) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let buckets = self.store.list_buckets().map_err(store_error)?;
        xml_response(StatusCode::OK, xml_body(locals3_xml::list_buckets(&buckets))?)
    }

    fn list_bucket_objects(
        &self,
        request: &CanonicalRequest,
    ) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let bucket = require_bucket(request)?;
        if self.store.get_bucket(bucket).map_err(store_error)?.is_none() {
            if !self.config.create_buckets {
                return Err(S3Error::no_such_bucket(bucket));
            }
            debug!(bucket, "creating missing bucket on listing");
            self.store.create_bucket(bucket).map_err(store_error)?;
        }

        let query = bucket_query(request)?;
        let result = self
            .store
            .query_objects(bucket, &query)
            .map_err(store_error)?;
        let body = if request.is_head() {
            S3ResponseBody::empty()
        } else {
            xml_body(locals3_xml::list_bucket_objects(&result))?
        };
        xml_response(StatusCode::OK, body)
    }

    fn get_object(
        &self,
        request: &CanonicalRequest,
        head: &http::request::Parts,
    ) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let bucket = require_bucket(request)?;
        let key = require_object(request)?;
        let object = self.lookup(bucket, key)?;
        render_object(&object, &head.headers, request.is_head())
    }

    /// Fetch an object, giving the store one chance to replicate it first.
    fn lookup(&self, bucket: &str, key: &str) -> Result<StoredObject, S3Error> {
        if let Some(object) = self.store.get_object(bucket, key).map_err(store_error)? {
            return Ok(object);
        }
        self.store
            .replicate_object(bucket, key)
            .map_err(store_error)?
            .ok_or_else(|| S3Error::no_such_key(key))
    }

    fn get_acl(&self) -> Result<http::Response<S3ResponseBody>, S3Error> {
        xml_response(StatusCode::OK, xml_body(locals3_xml::acl())?)
    }

    fn create_bucket(
        &self,
        request: &CanonicalRequest,
    ) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let bucket = require_bucket(request)?;
        self.store.create_bucket(bucket).map_err(store_error)?;
        put_response(StatusCode::OK, S3ResponseBody::empty())
    }

    fn store_object(
        &self,
        request: &CanonicalRequest,
        head: &http::request::Parts,
        body: Bytes,
    ) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let bucket = require_bucket(request)?;
        let key = require_object(request)?;
        self.store.create_bucket(bucket).map_err(store_error)?;
        let stored = self
            .store
            .store_object(bucket, key, object_upload(&head.headers, body))
            .map_err(store_error)?;
        build_response(
            set_header(put_builder(StatusCode::OK), header::ETAG, &stored.etag()),
            S3ResponseBody::empty(),
        )
    }

    fn copy_object(
        &self,
        request: &CanonicalRequest,
        head: &http::request::Parts,
        source: &CopySource,
    ) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let bucket = require_bucket(request)?;
        let key = request
            .object()
            .ok_or_else(|| S3Error::invalid_request("Copy requires a destination object key"))?;
        self.store.create_bucket(bucket).map_err(store_error)?;
        let copied = self
            .store
            .copy_object(
                &source.bucket,
                &source.key,
                bucket,
                key,
                &metadata_directive(&head.headers),
            )
            .map_err(store_error)?
            .ok_or_else(|| S3Error::no_such_key(source.key.as_str()))?;

        let metadata = &copied.metadata;
        put_response(
            StatusCode::OK,
            xml_body(locals3_xml::copy_object_result(
                &metadata.last_modified,
                &metadata.md5_hex,
            ))?,
        )
    }

    fn delete_object(
        &self,
        request: &CanonicalRequest,
    ) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let bucket = require_bucket(request)?;
        let key = require_object(request)?;
        self.store.delete_object(bucket, key).map_err(store_error)?;
        no_content()
    }

    fn delete_bucket(
        &self,
        request: &CanonicalRequest,
    ) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let bucket = require_bucket(request)?;
        self.store.delete_bucket(bucket).map_err(store_error)?;
        no_content()
    }

    fn upload_part(
        &self,
        request: &CanonicalRequest,
        head: &http::request::Parts,
        body: Bytes,
        upload_id: &str,
        part_number: u32,
    ) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let bucket = require_bucket(request)?;
        let key = require_object(request)?;
        let staged = multipart::stage_part(
            self.store.as_ref(),
            bucket,
            key,
            upload_id,
            part_number,
            object_upload(&head.headers, body),
        )
        .map_err(store_error)?;
        build_response(
            set_header(
                with_upload_cors(text_xml_builder(StatusCode::OK)),
                header::ETAG,
                &staged.etag(),
            ),
            S3ResponseBody::empty(),
        )
    }

    fn upload_part_copy(
        &self,
        request: &CanonicalRequest,
        upload_id: &str,
        part_number: u32,
        source: &CopySource,
    ) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let bucket = require_bucket(request)?;
        let key = require_object(request)?;
        let staged = multipart::stage_part_copy(
            self.store.as_ref(),
            bucket,
            key,
            upload_id,
            part_number,
            source,
        )
        .map_err(store_error)?
        .ok_or_else(|| S3Error::no_such_key(source.key.as_str()))?;

        let metadata = &staged.metadata;
        build_response(
            set_header(
                with_upload_cors(text_xml_builder(StatusCode::OK)),
                header::ETAG,
                &staged.etag(),
            ),
            xml_body(locals3_xml::copy_part_result(
                &metadata.last_modified,
                &metadata.md5_hex,
            ))?,
        )
    }

    fn complete_multipart_upload(
        &self,
        request: &CanonicalRequest,
        upload_id: &str,
        manifest: &[u8],
    ) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let bucket = require_bucket(request)?;
        let key = require_object(request)?;
        let object = multipart::complete(self.store.as_ref(), bucket, key, upload_id, manifest)
            .map_err(store_error)?;
        let location = multipart::object_location(bucket, key, self.config.port);
        post_response(
            StatusCode::OK,
            xml_body(locals3_xml::complete_multipart_result(
                &location,
                bucket,
                key,
                &object.metadata.md5_hex,
            ))?,
        )
    }

    fn post_object(
        &self,
        request: &CanonicalRequest,
        head: &http::request::Parts,
        body: &[u8],
    ) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let bucket = require_bucket(request)?;
        let content_type = head
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        let boundary = form::extract_boundary(content_type)?;
        let form = form::parse_multipart(body, &boundary)?;

        let key = form_key(&form)?;
        let upload = form_upload(&form);
        self.store.create_bucket(bucket).map_err(store_error)?;
        let stored = self
            .store
            .store_object(bucket, &key, upload)
            .map_err(store_error)?;
        debug!(bucket, key, "stored form upload");

        if let Some(redirect) = form.field("success_action_redirect") {
            let builder = set_header(
                post_builder(StatusCode::TEMPORARY_REDIRECT),
                header::LOCATION,
                redirect,
            );
            return build_response(builder, S3ResponseBody::empty());
        }

        let status = match form.field("success_action_status").map(str::trim) {
            Some("200") => StatusCode::OK,
            Some("201") => StatusCode::CREATED,
            _ => StatusCode::NO_CONTENT,
        };
        let etag = stored.etag();
        let body = if status == StatusCode::CREATED {
            let location = multipart::object_location(bucket, &key, self.config.port);
            xml_body(locals3_xml::post_response(
                &location,
                bucket,
                &key,
                &stored.metadata.md5_hex,
            ))?
        } else {
            S3ResponseBody::empty()
        };
        build_response(set_header(post_builder(status), header::ETAG, &etag), body)
    }
}

/// Map a storage failure onto the S3 error it is reported as.
#[must_use]
pub fn store_error(err: StoreError) -> S3Error {
    match err {
        StoreError::NoSuchBucket { bucket } => S3Error::no_such_bucket(bucket),
        StoreError::BucketNotEmpty { bucket } => S3Error::bucket_not_empty(bucket),
        StoreError::InvalidBucketName { bucket } => {
            S3Error::new(S3ErrorCode::InvalidBucketName).with_resource(bucket)
        }
        StoreError::InvalidKey { key, reason } => {
            S3Error::invalid_argument(format!("Invalid object key: {reason}")).with_resource(key)
        }
        StoreError::InvalidPart {
            part_number,
            reason,
        } => S3Error::invalid_part(format!("part {part_number}: {reason}")),
        other => {
            error!(error = %other, "storage failure");
            S3Error::internal_error("storage failure").with_source(other)
        }
    }
}

fn unknown_operation(request: &CanonicalRequest) -> S3Error {
    let verb = request.verb();
    let supported = [
        http::Method::GET,
        http::Method::HEAD,
        http::Method::PUT,
        http::Method::POST,
        http::Method::DELETE,
        http::Method::OPTIONS,
    ];
    if !supported.contains(verb) {
        return S3Error::method_not_allowed(verb.as_str());
    }
    if request.bucket().is_none() {
        return S3Error::no_such_bucket("");
    }
    S3Error::not_implemented(format!("{verb} request"))
}

fn require_bucket(request: &CanonicalRequest) -> Result<&str, S3Error> {
    request.bucket().ok_or_else(|| S3Error::no_such_bucket(""))
}

fn require_object(request: &CanonicalRequest) -> Result<&str, S3Error> {
    request
        .object()
        .ok_or_else(|| S3Error::invalid_request("An object key is required"))
}

fn bucket_query(request: &CanonicalRequest) -> Result<BucketQuery, S3Error> {
    let query = request.query();
    let non_empty = |name: &str| {
        query
            .get(name)
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
    };

    let max_keys = match query.get("max-keys").or_else(|| query.get("max_keys")) {
        None => DEFAULT_MAX_KEYS,
        Some(raw) => raw.trim().parse::<usize>().map_err(|_| {
            S3Error::invalid_argument("max-keys must be a non-negative integer")
                .with_resource(raw.to_owned())
        })?,
    };

    Ok(BucketQuery {
        marker: non_empty("marker"),
        prefix: non_empty("prefix"),
        max_keys,
        delimiter: non_empty("delimiter"),
    })
}

fn initiate_multipart_upload(
    request: &CanonicalRequest,
) -> Result<http::Response<S3ResponseBody>, S3Error> {
    let bucket = require_bucket(request)?;
    let key = require_object(request)?;
    let upload_id = multipart::new_upload_id();
    debug!(bucket, key, upload_id, "initiated multipart upload");
    post_response(
        StatusCode::OK,
        xml_body(locals3_xml::initiate_multipart_result(bucket, key, &upload_id))?,
    )
}

fn form_key(form: &MultipartForm) -> Result<String, S3Error> {
    let key = form
        .field("key")
        .filter(|k| !k.is_empty())
        .ok_or_else(|| S3Error::invalid_argument("Form upload requires a key field"))?;
    let filename = form
        .filename
        .as_deref()
        .filter(|f| !f.is_empty())
        .unwrap_or(DEFAULT_FILENAME);
    Ok(key.replace(FILENAME_PLACEHOLDER, filename))
}

fn form_upload(form: &MultipartForm) -> ObjectUpload {
    let content_type = form
        .field("content-type")
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .or_else(|| form.file_content_type.clone());
    let custom_metadata = form
        .fields_with_prefix(META_PREFIX)
        .map(|(name, value)| (name.to_owned(), value.to_owned()))
        .collect();
    ObjectUpload {
        data: form.file_data.clone(),
        content_type,
        custom_metadata,
    }
}

fn text_xml_builder(status: StatusCode) -> http::response::Builder {
    http::Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, CONTENT_TYPE_TEXT_XML)
}

fn put_builder(status: StatusCode) -> http::response::Builder {
    text_xml_builder(status).header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")
}

fn post_builder(status: StatusCode) -> http::response::Builder {
    with_upload_cors(text_xml_builder(status))
}

fn put_response(
    status: StatusCode,
    body: S3ResponseBody,
) -> Result<http::Response<S3ResponseBody>, S3Error> {
    build_response(put_builder(status), body)
}

fn post_response(
    status: StatusCode,
    body: S3ResponseBody,
) -> Result<http::Response<S3ResponseBody>, S3Error> {
    build_response(post_builder(status), body)
}

fn xml_response(
    status: StatusCode,
    body: S3ResponseBody,
) -> Result<http::Response<S3ResponseBody>, S3Error> {
    build_response(
        http::Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, CONTENT_TYPE_XML),
        body,
    )
}

fn no_content() -> Result<http::Response<S3ResponseBody>, S3Error> {
    build_response(
        http::Response::builder().status(StatusCode::NO_CONTENT),
        S3ResponseBody::empty(),
    )
}
