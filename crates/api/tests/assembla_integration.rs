use assembla_api::{
    ApiClient, ApiError, Assembla, AssemblaConfig, AttachmentFile, NewTicket, TicketUpdate,
};
use std::io::Write;
use wiremock::matchers::{body_json, body_string_contains, header, method, path};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

/// Matches a multipart body carrying a text field `name` with exactly `value`.
struct FormField {
    name: &'static str,
    value: String,
}

impl Match for FormField {
    fn matches(&self, request: &Request) -> bool {
        let body = String::from_utf8_lossy(&request.body);
        let needle = format!("name=\"{}\"\r\n\r\n{}\r\n", self.name, self.value);
        body.contains(&needle)
    }
}

fn config_for(server: &MockServer) -> AssemblaConfig {
    AssemblaConfig::new("test-key", "test-secret", "demo")
        .with_base_url(format!("{}/v1/", server.uri()))
}

async fn mount_space_lists(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v1/spaces/demo/users.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"id": "u-1", "name": "Jane Doe", "login": "jdoe"},
            {"id": "u-2", "name": null, "login": "bot"}
        ])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/spaces/demo/milestones/all.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"id": 11, "title": "Sprint 1"},
            {"id": 12, "title": "Sprint 2"}
        ])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_credentials_sent_as_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/spaces/demo/tickets/1.json"))
        .and(header("X-Api-Key", "test-key"))
        .and(header("X-Api-Secret", "test-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": 1001, "number": 1, "summary": "First"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let assembla = Assembla::new(config_for(&mock_server)).unwrap();
    let ticket = assembla.get_ticket(1).await.unwrap().unwrap();

    assert_eq!(ticket.id, 1001);
    assert_eq!(ticket.summary, "First");
}

#[tokio::test]
async fn test_connect_loads_users_and_milestones() {
    let mock_server = MockServer::start().await;
    mount_space_lists(&mock_server).await;

    let assembla = Assembla::connect(config_for(&mock_server)).await.unwrap();

    assert_eq!(assembla.users().len(), 2);
    assert_eq!(assembla.user_name("u-1"), Some("Jane Doe"));
    assert_eq!(assembla.user_name("u-2"), Some("bot"));
    assert_eq!(assembla.milestone_title(12), Some("Sprint 2"));
}

#[tokio::test]
async fn test_connect_with_empty_space() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/spaces/demo/users.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"id": "u-1", "name": "Jane Doe"}
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/spaces/demo/milestones/all.json"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let assembla = Assembla::connect(config_for(&mock_server)).await.unwrap();

    assert_eq!(assembla.users().len(), 1);
    assert!(assembla.milestones().is_empty());
}

#[tokio::test]
async fn test_refresh_users_with_blank_body() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/spaces/demo/users.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .mount(&mock_server)
        .await;

    let mut assembla = Assembla::new(config_for(&mock_server)).unwrap();
    let users = assembla.refresh_users().await.unwrap();

    assert!(users.is_empty());
}

#[tokio::test]
async fn test_connect_fails_on_bad_credentials() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/spaces/demo/users.json"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&mock_server)
        .await;

    let result = Assembla::connect(config_for(&mock_server)).await;
    assert!(matches!(
        result,
        Err(ApiError::AuthenticationFailed { .. })
    ));
}

#[tokio::test]
async fn test_create_ticket_wraps_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/spaces/demo/tickets.json"))
        .and(body_json(serde_json::json!({
            "ticket": {
                "summary": "Crash on save",
                "description": "Steps to reproduce",
                "assigned_to_id": "u-1",
                "milestone_id": 11
            }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "id": 2001,
            "number": 17,
            "summary": "Crash on save",
            "description": "Steps to reproduce",
            "status": "New",
            "state": 1
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let assembla = Assembla::new(config_for(&mock_server)).unwrap();
    let ticket = NewTicket {
        description: Some("Steps to reproduce".to_string()),
        assigned_to_id: Some("u-1".to_string()),
        milestone_id: Some(11),
        ..NewTicket::new("Crash on save")
    };

    let created = assembla.create_ticket(&ticket).await.unwrap();
    assert_eq!(created.number, 17);
    assert_eq!(created.status.as_deref(), Some("New"));
    assert!(!created.is_closed());
}

#[tokio::test]
async fn test_update_ticket_accepts_empty_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/v1/spaces/demo/tickets/17.json"))
        .and(body_json(serde_json::json!({"ticket": {"status": "Fixed"}})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let assembla = Assembla::new(config_for(&mock_server)).unwrap();
    let update = TicketUpdate {
        status: Some("Fixed".to_string()),
        ..Default::default()
    };

    assert!(assembla.update_ticket(17, &update).await.is_ok());
}

#[tokio::test]
async fn test_get_missing_ticket_is_none() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/spaces/demo/tickets/404.json"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let assembla = Assembla::new(config_for(&mock_server)).unwrap();
    assert!(assembla.get_ticket(404).await.unwrap().is_none());
}

#[tokio::test]
async fn test_get_ticket_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/spaces/demo/tickets/5.json"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&mock_server)
        .await;

    let assembla = Assembla::new(config_for(&mock_server)).unwrap();
    match assembla.get_ticket(5).await {
        Err(ApiError::ServerError { status, message }) => {
            assert_eq!(status, 503);
            assert_eq!(message, "maintenance");
        }
        other => panic!("expected server error, got {:?}", other.map(|t| t.map(|t| t.number))),
    }
}

#[tokio::test]
async fn test_add_comment_posts_after_lookup() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/spaces/demo/tickets/17.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": 2001, "number": 17, "summary": "Crash on save"
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/spaces/demo/tickets/17/ticket_comments.json"))
        .and(body_json(serde_json::json!({
            "ticket_comment": {"comment": "Reproduced with \"quotes\""}
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "id": 9,
            "ticket_id": 2001,
            "comment": "Reproduced with \"quotes\"",
            "user_id": "u-1"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let assembla = Assembla::new(config_for(&mock_server)).unwrap();
    let comment = assembla
        .add_comment(17, "Reproduced with \"quotes\"")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(comment.ticket_id, 2001);
}

#[tokio::test]
async fn test_add_comment_to_missing_ticket() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/spaces/demo/tickets/99.json"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/spaces/demo/tickets/99/ticket_comments.json"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&mock_server)
        .await;

    let assembla = Assembla::new(config_for(&mock_server)).unwrap();
    assert!(assembla.add_comment(99, "hello").await.unwrap().is_none());
}

#[tokio::test]
async fn test_add_attachment_multipart() {
    let mock_server = MockServer::start().await;
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "crash log contents").unwrap();
    let file_name = format!(
        "filename=\"{}\"",
        file.path().file_name().unwrap().to_string_lossy()
    );

    Mock::given(method("POST"))
        .and(path("/v1/spaces/demo/documents.json"))
        .and(FormField {
            name: "document[attachable_type]",
            value: "Ticket".to_string(),
        })
        .and(FormField {
            name: "document[attachable_id]",
            value: "2001".to_string(),
        })
        .and(body_string_contains(file_name.as_str()))
        .and(body_string_contains("Content-Type: text/plain"))
        .and(body_string_contains("crash log contents"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "id": "doc-1",
            "name": "crash.log",
            "content_type": "text/plain",
            "attachable_id": 2001
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let assembla = Assembla::new(config_for(&mock_server)).unwrap();
    let attachment = AttachmentFile::new(file.path()).with_mime_type("text/plain");
    let document = assembla.add_attachment(2001, &attachment).await.unwrap();

    assert_eq!(document.id, "doc-1");
    assert_eq!(document.attachable_id, Some(2001));
}

#[tokio::test]
async fn test_add_attachment_missing_file() {
    let mock_server = MockServer::start().await;

    let assembla = Assembla::new(config_for(&mock_server)).unwrap();
    let attachment = AttachmentFile::new("/nonexistent/file.txt");
    let result = assembla.add_attachment(2001, &attachment).await;

    assert!(matches!(result, Err(ApiError::Attachment { .. })));
}

#[tokio::test]
async fn test_status_mapping() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/forbidden"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/invalid"))
        .respond_with(ResponseTemplate::new(422).set_body_string("summary can't be blank"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/throttled"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "12"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/garbled"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&mock_server)
        .await;

    let client = ApiClient::new(format!("{}/v1", mock_server.uri()))
        .unwrap()
        .with_api_key("k", "s");

    let forbidden: Result<serde_json::Value, _> = client.get("/forbidden").await;
    assert!(matches!(
        forbidden,
        Err(ApiError::AuthenticationFailed { .. })
    ));

    let invalid: Result<serde_json::Value, _> =
        client.post("invalid", &serde_json::json!({})).await;
    match invalid {
        Err(ApiError::BadRequest { message }) => assert!(message.contains("blank")),
        other => panic!("expected bad request, got {:?}", other),
    }

    let throttled: Result<serde_json::Value, _> = client.get("throttled").await;
    assert!(matches!(
        throttled,
        Err(ApiError::RateLimitExceeded { retry_after: 12 })
    ));

    let garbled: Result<serde_json::Value, _> = client.get("garbled").await;
    assert!(matches!(garbled, Err(ApiError::InvalidResponse(_))));
}
