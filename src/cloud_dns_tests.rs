// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the Cloud DNS REST client.

#[cfg(test)]
mod tests {
    use crate::auth::{TokenProvider, TokenSource};
    use crate::cloud_dns::CloudDnsClient;
    use crate::dns_errors::DnsApiError;
    use crate::record_store::{
        Change, ChangeStatus, DnsApi, ListFilter, RecordStore, ResourceRecordSet,
    };
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ZONE_PATH: &str = "/dns/v1/projects/test-project/managedZones/private-zone";
    const NAME: &str = "web-1.web.svc.internal.";

    fn client(server: &MockServer) -> CloudDnsClient {
        let tokens = Arc::new(TokenProvider::new(
            TokenSource::Fixed("test-token".to_string()),
            reqwest::Client::new(),
        ));
        CloudDnsClient::new(
            reqwest::Client::new(),
            tokens,
            &server.uri(),
            "test-project",
            "private-zone",
        )
        .unwrap()
    }

    fn rrset_json(name: &str, ip: &str) -> serde_json::Value {
        serde_json::json!({
            "kind": "dns#resourceRecordSet",
            "name": name,
            "type": "A",
            "ttl": 60,
            "rrdatas": [ip],
        })
    }

    #[tokio::test]
    async fn test_list_record_sets_sends_filter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{ZONE_PATH}/rrsets")))
            .and(query_param("name", NAME))
            .and(query_param("type", "A"))
            .and(query_param("maxResults", "1"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "kind": "dns#resourceRecordSetsListResponse",
                "rrsets": [rrset_json(NAME, "10.0.0.5")],
            })))
            .expect(1)
            .mount(&server)
            .await;

        let page = client(&server)
            .list_record_sets(&ListFilter {
                name: Some(NAME.to_string()),
                record_type: Some("A".to_string()),
                max_results: Some(1),
                page_token: None,
            })
            .await
            .unwrap();

        assert_eq!(page.rrsets, vec![ResourceRecordSet::a_record(NAME, "10.0.0.5")]);
        assert_eq!(page.next_page_token, None);
    }

    #[tokio::test]
    async fn test_list_record_sets_empty_zone() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{ZONE_PATH}/rrsets")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "kind": "dns#resourceRecordSetsListResponse"
            })))
            .mount(&server)
            .await;

        let page = client(&server)
            .list_record_sets(&ListFilter::default())
            .await
            .unwrap();
        assert!(page.rrsets.is_empty());
    }

    #[tokio::test]
    async fn test_list_all_follows_page_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{ZONE_PATH}/rrsets")))
            .and(query_param("pageToken", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "rrsets": [rrset_json("b.svc.internal.", "10.0.0.2")],
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{ZONE_PATH}/rrsets")))
            .and(query_param("maxResults", "500"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "rrsets": [rrset_json("a.svc.internal.", "10.0.0.1")],
                "nextPageToken": "page-2",
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        let store = RecordStore::new(Arc::new(client(&server)), CancellationToken::new());
        let all = store.list_all().await.unwrap();

        let names: Vec<_> = all.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a.svc.internal.", "b.svc.internal."]);
    }

    #[tokio::test]
    async fn test_create_change_posts_additions() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{ZONE_PATH}/changes")))
            .and(body_json(serde_json::json!({
                "additions": [{
                    "name": NAME,
                    "type": "A",
                    "ttl": 60,
                    "rrdatas": ["10.0.0.5"],
                }],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "kind": "dns#change",
                "id": "17",
                "status": "pending",
                "additions": [rrset_json(NAME, "10.0.0.5")],
            })))
            .expect(1)
            .mount(&server)
            .await;

        let submitted = client(&server)
            .create_change(&Change {
                additions: vec![ResourceRecordSet::a_record(NAME, "10.0.0.5")],
                ..Change::default()
            })
            .await
            .unwrap();

        assert_eq!(submitted.id.as_deref(), Some("17"));
        assert_eq!(submitted.status, Some(ChangeStatus::Pending));
    }

    #[tokio::test]
    async fn test_get_change() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{ZONE_PATH}/changes/17")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "17",
                "status": "done",
            })))
            .mount(&server)
            .await;

        let change = client(&server).get_change("17").await.unwrap();
        assert!(change.is_done());
    }

    #[tokio::test]
    async fn test_conflict_maps_to_http_error_with_provider_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{ZONE_PATH}/changes")))
            .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
                "error": {
                    "code": 409,
                    "message": "The resource 'entity.change.additions[0]' named 'web-1.web.svc.internal. (A)' already exists",
                }
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .create_change(&Change::default())
            .await
            .unwrap_err();

        match &err {
            DnsApiError::Http {
                status,
                reason,
                message,
            } => {
                assert_eq!(*status, 409);
                assert_eq!(*reason, "RecordAlreadyExists");
                assert!(message.contains("already exists"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_server_error_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{ZONE_PATH}/changes/1")))
            .respond_with(ResponseTemplate::new(503).set_body_string("backend unavailable"))
            .mount(&server)
            .await;

        let err = client(&server).get_change("1").await.unwrap_err();

        assert!(matches!(
            err,
            DnsApiError::Http {
                status: 503,
                reason: "CloudDnsUnavailable",
                ..
            }
        ));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_undecodable_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{ZONE_PATH}/changes/1")))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client(&server).get_change("1").await.unwrap_err();
        assert!(matches!(err, DnsApiError::Decode(_)));
    }

    fn metadata_client(server: &MockServer) -> CloudDnsClient {
        let tokens = Arc::new(TokenProvider::new(
            TokenSource::Metadata {
                base_url: server.uri(),
            },
            reqwest::Client::new(),
        ));
        CloudDnsClient::new(
            reqwest::Client::new(),
            tokens,
            &server.uri(),
            "test-project",
            "private-zone",
        )
        .unwrap()
    }

    async fn mount_token(server: &MockServer, token: &str, times: Option<u64>) {
        let mock = Mock::given(method("GET"))
            .and(path("/instance/service-accounts/default/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": token,
                "expires_in": 3600,
                "token_type": "Bearer",
            })));
        match times {
            Some(n) => mock.up_to_n_times(n).mount(server).await,
            None => mock.mount(server).await,
        }
    }

    #[tokio::test]
    async fn test_rejected_token_is_refreshed_and_request_resent() {
        let server = MockServer::start().await;
        mount_token(&server, "revoked-token", Some(1)).await;
        mount_token(&server, "fresh-token", None).await;
        Mock::given(method("GET"))
            .and(path(format!("{ZONE_PATH}/changes/5")))
            .and(header("authorization", "Bearer revoked-token"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{ZONE_PATH}/changes/5")))
            .and(header("authorization", "Bearer fresh-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "5",
                "status": "done",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let change = metadata_client(&server).get_change("5").await.unwrap();

        assert!(change.is_done());
    }

    #[tokio::test]
    async fn test_second_unauthorized_is_returned() {
        let server = MockServer::start().await;
        mount_token(&server, "revoked-token", None).await;
        Mock::given(method("GET"))
            .and(path(format!("{ZONE_PATH}/changes/5")))
            .respond_with(ResponseTemplate::new(401))
            .expect(2)
            .mount(&server)
            .await;

        let err = metadata_client(&server).get_change("5").await.unwrap_err();

        assert!(matches!(err, DnsApiError::Http { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_connection_failure_is_transport_error() {
        let tokens = Arc::new(TokenProvider::new(
            TokenSource::Fixed("t".to_string()),
            reqwest::Client::new(),
        ));
        let client = CloudDnsClient::new(
            reqwest::Client::new(),
            tokens,
            "http://127.0.0.1:1",
            "p",
            "z",
        )
        .unwrap();

        let err = client.get_change("1").await.unwrap_err();
        assert!(matches!(err, DnsApiError::Transport(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_invalid_endpoint() {
        let tokens = Arc::new(TokenProvider::new(
            TokenSource::Fixed("t".to_string()),
            reqwest::Client::new(),
        ));
        assert!(CloudDnsClient::new(reqwest::Client::new(), tokens, "not a url", "p", "z").is_err());
    }
}
