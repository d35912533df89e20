//! Tests for request signing.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use rstest::{fixture, rstest};

use super::*;

const ACCESS_KEY: &str = "AKIDEXAMPLE";
const SECRET_KEY: &str = "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";

fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, second)
        .single()
        .unwrap_or_else(|| panic!("valid timestamp"))
}

#[fixture]
fn describe_images() -> SignatureQuery {
    SignatureQuery::builder()
        .path("/")
        .service("ec2")
        .region("eu-west-1")
        .access_key(ACCESS_KEY)
        .secret_key(SECRET_KEY)
        .body("Action=DescribeImages&Owner.1=self&Version=2016-11-15")
        .header("Content-Type", FORM_CONTENT_TYPE)
        .build()
        .unwrap_or_else(|err| panic!("query should build: {err}"))
}

#[rstest]
fn sign_matches_known_vector_for_form_body(mut describe_images: SignatureQuery) {
    let header = sign(&mut describe_images, at(2017, 11, 10, 9, 36, 43))
        .unwrap_or_else(|err| panic!("sign: {err}"));

    assert_eq!(
        header,
        concat!(
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20171110/eu-west-1/ec2/aws4_request, ",
            "SignedHeaders=content-type;host;x-amz-content-sha256;x-amz-date, ",
            "Signature=cd226b54eb3f1a8c9a2cac1e97f7e2c39cc68f4d4d564e5ed92e1e71eacfe19a"
        )
    );
}

#[test]
fn sign_matches_known_vector_for_query_parameters_without_body() {
    let parameters = BTreeMap::from([
        (String::from("Version"), String::from("2010-05-08")),
        (String::from("Action"), String::from("ListUsers")),
        (String::from("Marker"), String::from("a b/c")),
    ]);
    let mut query = SignatureQuery::builder()
        .method(Some("GET"))
        .path("/")
        .service("iam")
        .region("us-east-1")
        .access_key(ACCESS_KEY)
        .secret_key(SECRET_KEY)
        .query_parameters(parameters)
        .build()
        .unwrap_or_else(|err| panic!("query should build: {err}"));

    let header =
        sign(&mut query, at(2015, 8, 30, 12, 36, 0)).unwrap_or_else(|err| panic!("sign: {err}"));

    assert_eq!(
        header,
        concat!(
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/iam/aws4_request, ",
            "SignedHeaders=host;x-amz-content-sha256;x-amz-date, ",
            "Signature=68d9cf6bb1085ed657b677ae10a192850a67f5936493cec7988d58fe65125fca"
        )
    );
    assert_eq!(
        query.headers.get(HEADER_CONTENT_SHA256).map(String::as_str),
        Some(EMPTY_BODY_SHA256)
    );
}

#[rstest]
fn sign_is_reproducible(describe_images: SignatureQuery) {
    let now = at(2024, 2, 29, 23, 59, 59);
    let mut first = describe_images.clone();
    let mut second = describe_images;

    let lhs = sign(&mut first, now).unwrap_or_else(|err| panic!("sign: {err}"));
    let rhs = sign(&mut second, now).unwrap_or_else(|err| panic!("sign: {err}"));

    assert_eq!(lhs, rhs);
    assert_eq!(first.headers, second.headers);
}

#[rstest]
fn sign_injects_date_digest_and_host_headers(mut describe_images: SignatureQuery) {
    sign(&mut describe_images, at(2017, 11, 10, 9, 36, 43))
        .unwrap_or_else(|err| panic!("sign: {err}"));

    let headers = &describe_images.headers;
    assert_eq!(
        headers.get(HEADER_DATE).map(String::as_str),
        Some("20171110T093643Z")
    );
    assert_eq!(
        headers.get(HEADER_CONTENT_SHA256).map(String::as_str),
        Some("762954c20c752b445aa01a0e158ca61c7bd02ea91d92982cbc937c742eb015e6")
    );
    assert_eq!(
        headers.get(HEADER_HOST).map(String::as_str),
        Some("ec2.eu-west-1.amazonaws.com")
    );
}

#[rstest]
fn body_digest_changes_with_body(describe_images: SignatureQuery) {
    let now = at(2017, 11, 10, 9, 36, 43);
    let bodies = [
        "Action=DescribeImages",
        "Action=DescribeImages&Owner.1=self",
        "Action=DescribeInstances",
        "",
    ];
    let mut digests = bodies
        .iter()
        .map(|body| {
            let mut query = SignatureQuery {
                body: Some((*body).to_owned()),
                ..describe_images.clone()
            };
            sign(&mut query, now).unwrap_or_else(|err| panic!("sign: {err}"));
            query
                .headers
                .get(HEADER_CONTENT_SHA256)
                .cloned()
                .unwrap_or_default()
        })
        .collect::<Vec<_>>();
    digests.sort();
    digests.dedup();
    assert_eq!(digests.len(), bodies.len());
}

#[rstest]
fn sign_request_carries_signed_headers_and_authorization(describe_images: SignatureQuery) {
    let request = sign_request(describe_images, at(2017, 11, 10, 9, 36, 43))
        .unwrap_or_else(|err| panic!("sign: {err}"));

    assert_eq!(request.method, "POST");
    assert_eq!(request.url, "https://ec2.eu-west-1.amazonaws.com/");
    assert_eq!(
        request.body.as_deref(),
        Some("Action=DescribeImages&Owner.1=self&Version=2016-11-15")
    );
    for name in [
        HEADER_AUTHORIZATION,
        HEADER_HOST,
        HEADER_DATE,
        HEADER_CONTENT_SHA256,
        "Content-Type",
    ] {
        assert!(request.headers.contains_key(name), "missing header {name}");
    }
}

#[test]
fn builder_defaults_method_to_post() {
    let query = SignatureQuery::builder()
        .path("/")
        .service("ec2")
        .region("eu-west-1")
        .access_key(ACCESS_KEY)
        .secret_key(SECRET_KEY)
        .build()
        .unwrap_or_else(|err| panic!("query should build: {err}"));
    assert_eq!(query.method, DEFAULT_METHOD);
    assert_eq!(query.body, None);
}

#[rstest]
#[case::no_path(SignatureQuery::builder(), "path")]
#[case::no_service(SignatureQuery::builder().path("/"), "service")]
#[case::no_region(SignatureQuery::builder().path("/").service("ec2"), "region")]
#[case::no_access_key(
    SignatureQuery::builder().path("/").service("ec2").region("eu-west-1"),
    "access_key"
)]
#[case::no_secret_key(
    SignatureQuery::builder()
        .path("/")
        .service("ec2")
        .region("eu-west-1")
        .access_key(ACCESS_KEY),
    "secret_key"
)]
#[case::cleared_method(
    SignatureQuery::builder()
        .path("/")
        .service("ec2")
        .region("eu-west-1")
        .access_key(ACCESS_KEY)
        .secret_key(SECRET_KEY)
        .method(None),
    "method"
)]
#[case::blank_region(
    SignatureQuery::builder()
        .path("/")
        .service("ec2")
        .region("  ")
        .access_key(ACCESS_KEY)
        .secret_key(SECRET_KEY),
    "region"
)]
fn builder_rejects_missing_fields(
    #[case] builder: SignatureQueryBuilder,
    #[case] field: &'static str,
) {
    let err = builder.build().expect_err("incomplete query should fail");
    assert_eq!(err, SignatureError::MissingField(field));
}
