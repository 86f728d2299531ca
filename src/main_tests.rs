// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `main.rs` - project resolution and graceful shutdown

#[cfg(test)]
mod tests {
    use crate::{resolve_project, wait_for_exit};
    use private_dns::auth::ServiceAccountKey;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn key(project_id: Option<&str>) -> ServiceAccountKey {
        ServiceAccountKey {
            client_email: "dns@my-project.iam.gserviceaccount.com".to_string(),
            private_key: String::new(),
            token_uri: None,
            project_id: project_id.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_flag_wins_over_key_and_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("from-metadata"))
            .expect(0)
            .mount(&server)
            .await;

        let project = resolve_project(
            Some("from-flag"),
            Some(&key(Some("from-key"))),
            &reqwest::Client::new(),
            &server.uri(),
        )
        .await
        .unwrap();

        assert_eq!(project, "from-flag");
    }

    #[tokio::test]
    async fn test_key_project_used_without_flag() {
        let server = MockServer::start().await;

        let project = resolve_project(
            Some("  "),
            Some(&key(Some("from-key"))),
            &reqwest::Client::new(),
            &server.uri(),
        )
        .await
        .unwrap();

        assert_eq!(project, "from-key");
    }

    #[tokio::test]
    async fn test_metadata_server_is_the_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/project/project-id"))
            .and(header("Metadata-Flavor", "Google"))
            .respond_with(ResponseTemplate::new(200).set_body_string("from-metadata\n"))
            .expect(1)
            .mount(&server)
            .await;

        let project = resolve_project(None, Some(&key(None)), &reqwest::Client::new(), &server.uri())
            .await
            .unwrap();

        assert_eq!(project, "from-metadata");
    }

    #[tokio::test]
    async fn test_missing_project_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = resolve_project(None, None, &reqwest::Client::new(), &server.uri())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("--project not set"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_exit_returns_when_task_finishes() {
        let handle = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(1)).await;
        });

        wait_for_exit("short task", handle).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_exit_gives_up_after_grace_period() {
        let handle = tokio::spawn(std::future::pending::<()>());
        let start = tokio::time::Instant::now();

        wait_for_exit("stuck task", handle).await;

        assert!(start.elapsed() >= Duration::from_secs(10));
    }

    /// Test that signal handling works with tokio::select!
    #[tokio::test]
    async fn test_select_with_signal_and_task() {
        let result = tokio::select! {
            () = tokio::time::sleep(Duration::from_millis(10)) => "signal",
            () = tokio::time::sleep(Duration::from_secs(10)) => "task",
        };

        assert_eq!(result, "signal", "select! should complete on signal branch first");
    }

    /// Test that SIGTERM signal handler can be created on Unix platforms
    #[tokio::test]
    #[cfg(unix)]
    async fn test_sigterm_signal_handler_creation() {
        use tokio::signal::unix::{signal, SignalKind};

        assert!(signal(SignalKind::terminate()).is_ok());
    }
}
