//! Integration tests for the Azure Resource Manager client using wiremock
//!
//! These tests verify the HTTP client behavior against mocked endpoints,
//! ensuring proper handling of pagination, response codes and edge cases.

use azgov::azure::auth::AzureCredentials;
use azgov::azure::client::AzureClient;
use azgov::error::{AdapterError, GovernanceError};
use azgov::resource::resourcegroup::{DESCRIPTOR, GROUP_RESOURCES};
use azgov::resource::{
    Deletion, ManagerSettings, ResourceClient, ResourceKind, ResourceManager, RetryPolicy,
};
use futures::TryStreamExt;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{bearer_token, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SUBSCRIPTION: &str = "00000000-0000-0000-0000-000000000000";

fn groups_path() -> String {
    format!("/subscriptions/{}/resourcegroups", SUBSCRIPTION)
}

fn group_path(name: &str) -> String {
    format!("/subscriptions/{}/resourcegroups/{}", SUBSCRIPTION, name)
}

fn client(server: &MockServer) -> AzureClient {
    AzureClient::with_endpoint(
        &server.uri(),
        SUBSCRIPTION,
        AzureCredentials::with_token("test-token"),
    )
    .expect("client should build")
}

fn manager(server: &MockServer) -> ResourceManager {
    let settings = ManagerSettings {
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 5,
        },
        ..ManagerSettings::default()
    };
    ResourceManager::new(&DESCRIPTOR, Arc::new(client(server)), settings)
}

fn group(name: &str) -> serde_json::Value {
    json!({
        "id": format!("/subscriptions/{}/resourceGroups/{}", SUBSCRIPTION, name),
        "name": name,
        "location": "westeurope",
        "type": "Microsoft.Resources/resourceGroups"
    })
}

/// Test module for list operations
mod list_tests {
    use super::*;

    /// Test enumeration follows nextLink until it disappears
    #[tokio::test]
    async fn test_enumerate_follows_next_link() {
        let server = MockServer::start().await;

        let next_link = format!(
            "{}{}?api-version=2021-04-01&$skiptoken=page2",
            server.uri(),
            groups_path()
        );

        Mock::given(method("GET"))
            .and(path(groups_path()))
            .and(query_param("api-version", "2021-04-01"))
            .and(query_param_is_missing("$skiptoken"))
            .and(bearer_token("test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [group("rg-a"), group("rg-b")],
                "nextLink": next_link
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(groups_path()))
            .and(query_param("$skiptoken", "page2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [group("rg-c")]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let groups = manager(&server).enumerate().await.expect("enumeration should succeed");

        let names: Vec<_> = groups.iter().filter_map(|g| g.name()).collect();
        assert_eq!(names, vec!["rg-a", "rg-b", "rg-c"]);
        assert!(groups
            .iter()
            .all(|g| g.resource_type() == Some("Microsoft.Resources/subscriptions/resourceGroups")));
    }

    /// Test a nextLink pointing at another host is refused
    #[tokio::test]
    async fn test_foreign_next_link_is_refused() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(groups_path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [group("rg-a")],
                "nextLink": "https://attacker.example.com/steal"
            })))
            .mount(&server)
            .await;

        let err = manager(&server).enumerate().await.unwrap_err();
        assert!(matches!(
            err,
            GovernanceError::FatalApi {
                source: AdapterError::Other(_),
                ..
            }
        ));
    }

    /// Test rate limiting is retried with backoff
    #[tokio::test]
    async fn test_429_is_retried() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(groups_path()))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": {"code": "TooManyRequests", "message": "Rate limit exceeded"}
            })))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(groups_path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [group("rg-a")]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let groups = manager(&server).enumerate().await.expect("retry should succeed");
        assert_eq!(groups.len(), 1);
    }

    /// Test 403 is not retried and surfaces as a fatal error
    #[tokio::test]
    async fn test_403_is_fatal() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(groups_path()))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {
                    "code": "AuthorizationFailed",
                    "message": "The client does not have authorization"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = manager(&server).enumerate().await.unwrap_err();
        match err {
            GovernanceError::FatalApi {
                source: AdapterError::Status { status, code, .. },
                ..
            } => {
                assert_eq!(status, 403);
                assert_eq!(code.as_deref(), Some("AuthorizationFailed"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    /// Test the resources-in-group listing used by the emptiness check
    #[tokio::test]
    async fn test_group_resources_stream_stops_early() {
        let server = MockServer::start().await;
        let next_link = format!(
            "{}/subscriptions/{}/resourceGroups/rg-a/resources?api-version=2021-04-01&$skiptoken=2",
            server.uri(),
            SUBSCRIPTION
        );

        Mock::given(method("GET"))
            .and(path(format!(
                "/subscriptions/{}/resourceGroups/rg-a/resources",
                SUBSCRIPTION
            )))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{"id": "x", "name": "sa1"}],
                "nextLink": next_link
            })))
            .expect(1)
            .mount(&server)
            .await;

        let manager = manager(&server);
        let mut children =
            manager.list_lazy(ResourceKind::new(GROUP_RESOURCES).within("rg-a"));
        let first = children.try_next().await.unwrap();
        assert_eq!(first.unwrap()["name"], "sa1");
    }
}

/// Test module for get and delete
mod item_tests {
    use super::*;

    /// Test 404 on get maps to not-found
    #[tokio::test]
    async fn test_get_404_is_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(group_path("rg-gone")))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {
                    "code": "ResourceGroupNotFound",
                    "message": "Resource group 'rg-gone' could not be found."
                }
            })))
            .mount(&server)
            .await;

        let lookup = manager(&server).get_by_ids(&["rg-gone"]).await;
        assert!(lookup.records.is_empty());
        assert!(matches!(lookup.aborted, Some(GovernanceError::NotFound { .. })));
    }

    /// Test get by full id resolves the group name
    #[tokio::test]
    async fn test_get_by_full_id() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(group_path("rg-a")))
            .respond_with(ResponseTemplate::new(200).set_body_json(group("rg-a")))
            .expect(1)
            .mount(&server)
            .await;

        let id = format!("/subscriptions/{}/resourceGroups/rg-a", SUBSCRIPTION);
        let lookup = manager(&server).get_by_ids(&[id]).await;
        assert_eq!(lookup.records.len(), 1);
        assert_eq!(
            lookup.records[0].resource_type(),
            Some("Microsoft.Resources/subscriptions/resourceGroups")
        );
    }

    /// Test delete accepts 202 with an empty body
    #[tokio::test]
    async fn test_delete_accepted() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path(group_path("rg-a")))
            .and(bearer_token("test-token"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let deletion = manager(&server).delete("rg-a").await.unwrap();
        assert_eq!(deletion, Deletion::Deleted);
    }

    /// Test delete of a missing group is already satisfied
    #[tokio::test]
    async fn test_delete_404_is_already_absent() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path(group_path("rg-gone")))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let deletion = manager(&server).delete("rg-gone").await.unwrap();
        assert_eq!(deletion, Deletion::AlreadyAbsent);
    }

    /// Test delete is attempted once on 503
    #[tokio::test]
    async fn test_delete_is_not_retried() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path(group_path("rg-a")))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let err = manager(&server).delete("rg-a").await.unwrap_err();
        assert!(err.is_transient());
    }

    /// Test the client rejects kinds it does not serve
    #[tokio::test]
    async fn test_unsupported_kind() {
        let server = MockServer::start().await;
        let client = client(&server);

        let err = ResourceClient::delete(
            &client,
            &ResourceKind::new(GROUP_RESOURCES).within("rg-a"),
            "x",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AdapterError::Other(_)));

        let err = ResourceClient::get(&client, &ResourceKind::new("virtualMachines"), "vm")
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Other(_)));
    }
}
