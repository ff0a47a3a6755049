use serde_json::json;
use syndicate::github::{GithubRepository, GithubSettings};
use syndicate_core::contract::{FileStatus, Repository, TreeEntry};
use syndicate_core::error::RepositoryError;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn repository(server: &MockServer) -> GithubRepository {
    let settings = GithubSettings {
        token: "fake_token".into(),
        api_url: server.uri(),
    };
    GithubRepository::new(&settings, "herp/derp").expect("client should build")
}

#[tokio::test]
async fn changed_files_reads_commit_file_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/herp/derp/commits/abc"))
        .and(header("authorization", "Bearer fake_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sha": "abc",
            "files": [
                {"filename": "posts/a.md", "status": "added", "additions": 3},
                {"filename": "posts/b.md", "status": "removed"},
                {"filename": "posts/c.md", "status": "renamed"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let files = repository(&server).changed_files("abc").await.unwrap();
    assert_eq!(files.len(), 3);
    assert_eq!(files[0].filename, "posts/a.md");
    assert_eq!(files[0].status, FileStatus::Added);
    assert!(files[1].status.is_deleted());
    assert!(!files[2].status.is_deleted());
}

#[tokio::test]
async fn changed_files_follows_full_pages() {
    let server = MockServer::start().await;
    let full_page: Vec<_> = (0..300)
        .map(|i| json!({"filename": format!("assets/{i}.png"), "status": "added"}))
        .collect();
    Mock::given(method("GET"))
        .and(path("/repos/herp/derp/commits/big"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"files": full_page})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/herp/derp/commits/big"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [{"filename": "posts/late.md", "status": "added"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let files = repository(&server).changed_files("big").await.unwrap();
    assert_eq!(files.len(), 301);
    assert_eq!(files[300].filename, "posts/late.md");
}

#[tokio::test]
async fn requests_identify_the_client() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/herp/derp/commits/abc"))
        .and(header(
            "user-agent",
            concat!("syndicate/", env!("CARGO_PKG_VERSION")),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"files": []})))
        .expect(1)
        .mount(&server)
        .await;

    let files = repository(&server).changed_files("abc").await.unwrap();
    assert!(files.is_empty());
}

#[tokio::test]
async fn file_contents_encodes_awkward_filenames() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/herp/derp/contents/posts/why-c%23-is-fun%3F.md"))
        .and(query_param("ref", "sha"))
        .respond_with(ResponseTemplate::new(200).set_body_string("---\ntitle: C#\n---\n"))
        .expect(1)
        .mount(&server)
        .await;

    let raw = repository(&server)
        .file_contents("posts/why-c#-is-fun?.md", "sha")
        .await
        .unwrap();
    assert_eq!(raw, "---\ntitle: C#\n---\n");
}

#[tokio::test]
async fn file_contents_requests_raw_text_at_ref() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/herp/derp/contents/posts/a.md"))
        .and(query_param("ref", "cursor"))
        .and(header("accept", "application/vnd.github.raw"))
        .respond_with(ResponseTemplate::new(200).set_body_string("---\ntitle: A\n---\nbody\n"))
        .expect(1)
        .mount(&server)
        .await;

    let raw = repository(&server)
        .file_contents("posts/a.md", "cursor")
        .await
        .unwrap();
    assert_eq!(raw, "---\ntitle: A\n---\nbody\n");
}

#[tokio::test]
async fn git_objects_are_created_with_expected_payloads() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/herp/derp/git/blobs"))
        .and(body_json(json!({"content": "hello", "encoding": "utf-8"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"sha": "blob-sha", "url": "x"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/repos/herp/derp/git/trees"))
        .and(body_json(json!({
            "base_tree": "base",
            "tree": [{"path": "posts/a.md", "mode": "100644", "type": "blob", "sha": "blob-sha"}]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"sha": "tree-sha"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/repos/herp/derp/git/commits"))
        .and(body_json(json!({
            "message": "(syndicate): adding IDs for dev",
            "tree": "tree-sha",
            "parents": ["base"]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"sha": "commit-sha"})))
        .expect(1)
        .mount(&server)
        .await;

    let repo = repository(&server);
    let blob = repo.create_blob("hello").await.unwrap();
    assert_eq!(blob, "blob-sha");
    let tree = repo
        .create_tree(vec![TreeEntry::file("posts/a.md", blob)], "base")
        .await
        .unwrap();
    assert_eq!(tree, "tree-sha");
    let commit = repo
        .create_commit("(syndicate): adding IDs for dev", &tree, vec!["base".into()])
        .await
        .unwrap();
    assert_eq!(commit, "commit-sha");
}

#[tokio::test]
async fn update_ref_never_forces() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/repos/herp/derp/git/refs/heads/main"))
        .and(body_json(json!({"sha": "commit-sha", "force": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ref": "refs/heads/main"})))
        .expect(1)
        .mount(&server)
        .await;

    repository(&server)
        .update_ref("refs/heads/main", "commit-sha")
        .await
        .unwrap();
}

#[tokio::test]
async fn rejected_requests_carry_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/repos/herp/derp/git/refs/heads/main"))
        .respond_with(
            ResponseTemplate::new(422).set_body_json(json!({"message": "Update is not a fast forward"})),
        )
        .mount(&server)
        .await;

    let result = repository(&server)
        .update_ref("refs/heads/main", "commit-sha")
        .await;
    match result {
        Err(RepositoryError::Rejected {
            operation,
            status,
            body,
        }) => {
            assert_eq!(operation, "update ref");
            assert_eq!(status, 422);
            assert!(body.contains("fast forward"));
        }
        other => panic!("expected a rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn undecodable_response_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/herp/derp/git/blobs"))
        .respond_with(ResponseTemplate::new(201).set_body_string("not json"))
        .mount(&server)
        .await;

    let result = repository(&server).create_blob("hello").await;
    assert!(matches!(result, Err(RepositoryError::Decode(_))));
}
