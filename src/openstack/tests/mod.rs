//! Unit tests for the OpenStack provider's request and response handling.

use reqwest::Url;
use rstest::{fixture, rstest};
use serde_json::json;

use super::auth::{AuthRequest, CatalogEntry, TokenResponse, select_endpoints, tokens_url};
use super::wire::{FloatingIpUpdateBody, ImageList, ServerCreateBody, ServerEnvelope};
use super::{OpenStackConnector, OpenStackError, api_message, pick_unique, resource_url};
use crate::config::OpenStackConfig;
use crate::provider::{Connector, Image, NetworkAttachment, ServerCreateRequest};


fn config() -> OpenStackConfig {
    OpenStackConfig {
        cloud: String::from("lab"),
        auth_url: String::from("https://keystone.example.org:5000/v3"),
        username: String::from("alice"),
        password: String::from("s3cret"),
        project_name: String::from("batch"),
        user_domain_name: String::from("Default"),
        project_domain_name: String::from("Default"),
        region_name: None,
        interface: String::from("public"),
    }
}

#[fixture]
fn catalog() -> Vec<CatalogEntry> {
    let body = json!({
        "token": {
            "catalog": [
                {
                    "type": "compute",
                    "endpoints": [
                        {
                            "interface": "internal",
                            "region_id": "RegionOne",
                            "url": "http://nova.internal:8774/v2.1"
                        },
                        {
                            "interface": "public",
                            "region_id": "RegionTwo",
                            "url": "https://nova-two.example.org/v2.1"
                        },
                        {
                            "interface": "public",
                            "region_id": "RegionOne",
                            "url": "https://nova.example.org/v2.1/"
                        }
                    ]
                },
                {
                    "type": "image",
                    "endpoints": [
                        {
                            "interface": "public",
                            "region": "RegionOne",
                            "url": "https://glance.example.org"
                        },
                        {
                            "interface": "public",
                            "region": "RegionTwo",
                            "url": "https://glance-two.example.org/v2"
                        }
                    ]
                },
                {
                    "type": "network",
                    "endpoints": [
                        {
                            "interface": "public",
                            "region_id": "RegionOne",
                            "url": "https://neutron.example.org:9696/"
                        },
                        {
                            "interface": "public",
                            "region_id": "RegionTwo",
                            "url": "https://neutron-two.example.org"
                        }
                    ]
                }
            ]
        }
    });
    serde_json::from_value::<TokenResponse>(body)
        .expect("token body should decode")
        .token
        .catalog
}

#[rstest]
#[case(
    "https://keystone.example.org:5000/v3",
    "https://keystone.example.org:5000/v3/auth/tokens"
)]
#[case(
    "https://keystone.example.org:5000/v3/",
    "https://keystone.example.org:5000/v3/auth/tokens"
)]
#[case(
    "https://keystone.example.org/identity",
    "https://keystone.example.org/identity/v3/auth/tokens"
)]
fn builds_token_url(#[case] auth_url: &str, #[case] expected: &str) {
    assert_eq!(tokens_url(auth_url), expected);
}

#[rstest]
fn password_request_is_project_scoped() {
    let cfg = config();
    let body =
        serde_json::to_value(AuthRequest::password(&cfg)).expect("auth request should serialise");
    assert_eq!(
        body,
        json!({
            "auth": {
                "identity": {
                    "methods": ["password"],
                    "password": {
                        "user": {
                            "name": "alice",
                            "domain": {"name": "Default"},
                            "password": "s3cret"
                        }
                    }
                },
                "scope": {
                    "project": {"name": "batch", "domain": {"name": "Default"}}
                }
            }
        })
    );
}

#[rstest]
fn selects_region_endpoints_and_adds_versions(catalog: Vec<CatalogEntry>) {
    let endpoints =
        select_endpoints(&catalog, "public", Some("RegionOne")).expect("endpoints should resolve");
    assert_eq!(endpoints.compute.as_str(), "https://nova.example.org/v2.1");
    assert_eq!(endpoints.image.as_str(), "https://glance.example.org/v2");
    assert_eq!(endpoints.network.as_str(), "https://neutron.example.org:9696/v2.0");
}

#[rstest]
fn keeps_versioned_catalog_urls(catalog: Vec<CatalogEntry>) {
    let endpoints =
        select_endpoints(&catalog, "public", Some("RegionTwo")).expect("endpoints should resolve");
    assert_eq!(endpoints.image.as_str(), "https://glance-two.example.org/v2");
}

#[rstest]
fn any_region_matches_when_unset(catalog: Vec<CatalogEntry>) {
    let endpoints = select_endpoints(&catalog, "public", None).expect("endpoints should resolve");
    assert_eq!(endpoints.compute.as_str(), "https://nova-two.example.org/v2.1");
}

#[rstest]
fn reports_missing_service(catalog: Vec<CatalogEntry>) {
    let err = select_endpoints(&catalog, "admin", None).expect_err("admin is not published");
    assert_eq!(
        err,
        OpenStackError::MissingService {
            service: String::from("compute"),
            interface: String::from("admin"),
        }
    );
}

#[rstest]
fn resource_urls_encode_names() {
    let base = Url::parse("https://nova.example.org/v2.1").expect("valid URL");
    let url = resource_url(&base, &["servers", "my server/1"]).expect("URL should build");
    assert_eq!(
        url.as_str(),
        "https://nova.example.org/v2.1/servers/my%20server%2F1"
    );
}

#[rstest]
#[case(
    r#"{"itemNotFound": {"message": "Flavor m1.tiny could not be found.", "code": 404}}"#,
    "Flavor m1.tiny could not be found."
)]
#[case(
    r#"{"NeutronError": {"type": "ExternalGatewayForFloatingIPNotFound", "message": "gw"}}"#,
    "gw"
)]
#[case("  upstream timed out\n", "upstream timed out")]
fn extracts_fault_messages(#[case] body: &str, #[case] expected: &str) {
    assert_eq!(api_message(body), expected);
}

#[rstest]
fn unique_pick_rejects_duplicates() {
    assert_eq!(pick_unique::<u8>("network", "public", vec![]), Ok(None));
    assert_eq!(pick_unique("network", "public", vec![1]), Ok(Some(1)));
    assert_eq!(
        pick_unique("network", "public", vec![1, 2]),
        Err(OpenStackError::Ambiguous {
            resource: String::from("network"),
            name: String::from("public"),
            count: 2,
        })
    );
}

#[rstest]
fn server_create_body_matches_nova_schema() {
    let request = ServerCreateRequest {
        name: String::from("nimbus_abcd1234"),
        image_id: String::from("img-1"),
        flavor_id: String::from("f-1"),
        key_name: None,
        user_data: String::from("IyEvYmluL3No"),
        networks: vec![NetworkAttachment {
            uuid: String::from("net-1"),
        }],
    };
    let body =
        serde_json::to_value(ServerCreateBody::from(&request)).expect("body should serialise");
    assert_eq!(
        body,
        json!({
            "server": {
                "name": "nimbus_abcd1234",
                "imageRef": "img-1",
                "flavorRef": "f-1",
                "user_data": "IyEvYmluL3No",
                "networks": [{"uuid": "net-1"}]
            }
        })
    );
}

#[rstest]
fn detach_sends_null_port() {
    let body = serde_json::to_value(FloatingIpUpdateBody::detach()).expect("body should serialise");
    assert_eq!(body, json!({"floatingip": {"port_id": null}}));
}

#[rstest]
fn decodes_unnamed_images_and_server_status() {
    let images: ImageList = serde_json::from_value(json!({
        "images": [
            {"id": "img-1", "name": null, "status": "active"},
            {"id": "img-2", "name": "ubuntu-24.04", "visibility": "public"}
        ]
    }))
    .expect("image list should decode");
    let converted: Vec<Image> = images.images.into_iter().map(Image::from).collect();
    assert_eq!(converted.first().map(|image| image.name.as_str()), Some(""));
    assert_eq!(
        converted.get(1).map(|image| image.name.as_str()),
        Some("ubuntu-24.04")
    );

    let server: ServerEnvelope = serde_json::from_value(json!({
        "server": {"id": "srv-1", "name": "nimbus_x", "status": "BUILD", "addresses": {}}
    }))
    .expect("server should decode");
    assert_eq!(server.server.status, "BUILD");
}

#[rstest]
#[tokio::test]
async fn unknown_profile_is_rejected_before_any_request() {
    let connector = OpenStackConnector::from_config(config());
    let err = connector
        .connect("elsewhere")
        .await
        .expect_err("profile should be unknown");
    assert_eq!(err, OpenStackError::UnknownProfile(String::from("elsewhere")));
    assert_eq!(connector.profile_names().collect::<Vec<_>>(), vec!["lab"]);
}

#[rstest]
#[tokio::test]
async fn incomplete_profile_is_rejected_before_any_request() {
    let mut cfg = config();
    cfg.password = String::new();
    let connector = OpenStackConnector::new().with_profile("lab", cfg);
    let err = connector
        .connect("lab")
        .await
        .expect_err("profile should fail validation");
    assert!(matches!(err, OpenStackError::Config(ref message) if message.contains("OS_PASSWORD")));
}
