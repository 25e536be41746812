//! Torbox client tests
//!
//! Cache checks, magnet listing with polling, and download link errors
//! against a mocked Torbox API.

use mockito::{Matcher, Server};
use streamdebrid::debrid::{Credentials, DebridError, DebridProvider, PollPolicy, Torbox};
use streamdebrid::models::{magnet_from_hash, DebridFile, Torrent};

const API_KEY: &str = "test_key";
const HASH: &str = "0123456789abcdef0123456789abcdef01234567";

fn client(server: &Server) -> Torbox {
    Torbox::with_base_url(Credentials::new(API_KEY), server.url()).with_poll_policy(PollPolicy::immediate(5))
}

fn file(id: &str) -> DebridFile {
    DebridFile {
        name: "movie.mkv".into(),
        size: 1,
        id: id.into(),
        url: String::new(),
        ready: true,
    }
}

// =============================================================================
// Cache Check Tests
// =============================================================================

#[tokio::test]
async fn test_check_cached_returns_only_true_hashes() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/torrents/checkcached")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("hash".into(), "abc123,def456".into()),
            Matcher::UrlEncoded("format".into(), "list".into()),
        ]))
        .match_header("authorization", "Bearer test_key")
        .match_header("accept", "application/json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"success": true, "data": {"abc123": true, "def456": false}}"#)
        .create_async()
        .await;

    let torrents = vec![Torrent::new("abc123"), Torrent::new("def456")];
    let cached = client(&server).check_cached(&torrents).await;

    mock.assert_async().await;
    assert_eq!(cached.into_iter().collect::<Vec<_>>(), vec!["abc123"]);
}

#[tokio::test]
async fn test_check_cached_result_is_deduplicated_subset() {
    let mut server = Server::new_async().await;

    // Duplicate input collapses to one requested hash; the unrequested one is dropped
    let mock = server
        .mock("GET", "/torrents/checkcached")
        .match_query(Matcher::UrlEncoded("hash".into(), HASH.into()))
        .with_status(200)
        .with_body(format!(
            r#"{{"data": {{"{}": true, "ffffffffffffffffffffffffffffffffffffffff": true}}}}"#,
            HASH.to_uppercase()
        ))
        .expect(1)
        .create_async()
        .await;

    let torrents = vec![Torrent::new(HASH), Torrent::new(HASH.to_uppercase())];
    let cached = client(&server).check_cached(&torrents).await;

    mock.assert_async().await;
    assert_eq!(cached.len(), 1);
    assert!(cached.contains(HASH));
}

#[tokio::test]
async fn test_check_cached_batches_of_50() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/torrents/checkcached")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"data": {}}"#)
        .expect(3)
        .create_async()
        .await;

    let torrents: Vec<Torrent> = (0..120).map(|i| Torrent::new(format!("{:040x}", i))).collect();
    let cached = client(&server).check_cached(&torrents).await;

    mock.assert_async().await;
    assert!(cached.is_empty());
}

#[tokio::test]
async fn test_check_cached_failed_batch_is_skipped() {
    let mut server = Server::new_async().await;

    let hashes: Vec<String> = (0..60).map(|i| format!("{:040x}", i)).collect();
    let first_batch = hashes[..50].join(",");
    let second_batch = hashes[50..].join(",");

    let failing = server
        .mock("GET", "/torrents/checkcached")
        .match_query(Matcher::UrlEncoded("hash".into(), first_batch))
        .with_status(500)
        .with_body(r#"{"detail": "Internal error"}"#)
        .create_async()
        .await;

    let working = server
        .mock("GET", "/torrents/checkcached")
        .match_query(Matcher::UrlEncoded("hash".into(), second_batch))
        .with_status(200)
        .with_body(format!(r#"{{"data": {{"{}": true}}}}"#, hashes[55]))
        .create_async()
        .await;

    let torrents: Vec<Torrent> = hashes.iter().map(Torrent::new).collect();
    let cached = client(&server).check_cached(&torrents).await;

    failing.assert_async().await;
    working.assert_async().await;
    assert_eq!(cached.len(), 1);
    assert!(cached.contains(&hashes[55]));
}

#[tokio::test]
async fn test_check_cached_expired_key_degrades_to_empty() {
    let mut server = Server::new_async().await;

    let _mock = server
        .mock("GET", "/torrents/checkcached")
        .match_query(Matcher::Any)
        .with_status(401)
        .create_async()
        .await;

    let cached = client(&server).check_cached(&[Torrent::new(HASH)]).await;
    assert!(cached.is_empty());
}

// =============================================================================
// File Listing Tests
// =============================================================================

#[tokio::test]
async fn test_files_from_magnet() {
    let mut server = Server::new_async().await;
    let magnet = magnet_from_hash(HASH);

    let create = server
        .mock("POST", "/torrents/create")
        .match_header("authorization", "Bearer test_key")
        .match_body(Matcher::Regex(format!(r"magnet:\?xt=urn:btih:{}", HASH)))
        .with_status(200)
        .with_body(r#"{"success": true, "data": {"torrent_id": 42, "hash": "x"}}"#)
        .create_async()
        .await;

    let list = server
        .mock("GET", "/torrents/mylist")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            r#"{"data": [
                {"id": 7, "files": [{"id": 0, "name": "other.mkv", "size": 1}]},
                {"id": 42, "files": [
                    {"id": 0, "name": "Movie/movie.mkv", "size": 4000000000},
                    {"id": 1, "name": "Movie/sample.mkv", "size": 30000000}
                ]}
            ]}"#,
        )
        .create_async()
        .await;

    let files = client(&server).files_from_magnet(&magnet, HASH).await.unwrap();

    create.assert_async().await;
    list.assert_async().await;

    assert_eq!(files.len(), 2);
    assert_eq!(files[0].name, "Movie/movie.mkv");
    assert_eq!(files[0].size, 4_000_000_000);
    assert_eq!(files[0].id, "42:0");
    assert_eq!(files[1].id, "42:1");
    assert!(files.iter().all(|f| f.ready && f.url.is_empty()));
}

#[tokio::test]
async fn test_files_from_hash_matches_files_from_magnet() {
    let mut server = Server::new_async().await;

    let create = server
        .mock("POST", "/torrents/create")
        .match_body(Matcher::Regex(format!(r"magnet:\?xt=urn:btih:{}", HASH)))
        .with_status(200)
        .with_body(r#"{"success": true, "data": {"torrent_id": 9}}"#)
        .expect(2)
        .create_async()
        .await;

    let _list = server
        .mock("GET", "/torrents/mylist")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"data": [{"id": 9, "files": [{"id": 3, "name": "a.mkv", "size": 10}]}]}"#)
        .create_async()
        .await;

    let torbox = client(&server);
    let from_hash = torbox.files_from_hash(HASH).await.unwrap();
    let from_magnet = torbox.files_from_magnet(&magnet_from_hash(HASH), HASH).await.unwrap();

    create.assert_async().await;
    assert_eq!(from_hash, from_magnet);
}

#[tokio::test]
async fn test_files_polling_stops_after_five_attempts() {
    let mut server = Server::new_async().await;

    let _create = server
        .mock("POST", "/torrents/create")
        .with_status(200)
        .with_body(r#"{"success": true, "data": {"torrent_id": 42}}"#)
        .create_async()
        .await;

    // Torrent present but metadata not resolved yet
    let list = server
        .mock("GET", "/torrents/mylist")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"data": [{"id": 42, "files": []}]}"#)
        .expect(5)
        .create_async()
        .await;

    let result = client(&server).files_from_hash(HASH).await;

    list.assert_async().await;
    match result {
        Err(DebridError::FilesUnavailable { hash }) => assert_eq!(hash, HASH),
        other => panic!("Expected FilesUnavailable, got {:?}", other),
    }
}

#[tokio::test]
async fn test_files_polling_respects_custom_budget() {
    let mut server = Server::new_async().await;

    let _create = server
        .mock("POST", "/torrents/create")
        .with_status(200)
        .with_body(r#"{"success": true, "data": {"torrent_id": 42}}"#)
        .create_async()
        .await;

    let list = server
        .mock("GET", "/torrents/mylist")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"data": null}"#)
        .expect(2)
        .create_async()
        .await;

    let torbox = Torbox::with_base_url(Credentials::new(API_KEY), server.url())
        .with_poll_policy(PollPolicy::immediate(2));
    let result = torbox.files_from_hash(HASH).await;

    list.assert_async().await;
    assert!(matches!(result, Err(DebridError::FilesUnavailable { .. })));
}

#[tokio::test]
async fn test_create_failure_is_provider_error() {
    let mut server = Server::new_async().await;

    let _create = server
        .mock("POST", "/torrents/create")
        .with_status(200)
        .with_body(r#"{"success": false, "data": null, "detail": "Invalid magnet"}"#)
        .create_async()
        .await;

    let list = server
        .mock("GET", "/torrents/mylist")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let result = client(&server).files_from_hash(HASH).await;

    list.assert_async().await;
    assert!(matches!(result, Err(DebridError::Provider { .. })));
}

#[tokio::test]
async fn test_files_from_buffer_is_unsupported() {
    let server = Server::new_async().await;
    let result = client(&server).files_from_buffer(b"d8:announce", HASH).await;
    assert!(matches!(result, Err(DebridError::UnsupportedOperation { .. })));
}

// =============================================================================
// Download Link Tests
// =============================================================================

#[tokio::test]
async fn test_resolve_download_url() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/torrents/requestdl")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("token".into(), API_KEY.into()),
            Matcher::UrlEncoded("torrent_id".into(), "42".into()),
            Matcher::UrlEncoded("file_id".into(), "7".into()),
            Matcher::UrlEncoded("zip".into(), "false".into()),
        ]))
        .match_header("authorization", "Bearer test_key")
        .with_status(200)
        .with_body(r#"{"success": true, "detail": "", "data": "https://store.torbox.app/dl/abc"}"#)
        .create_async()
        .await;

    let url = client(&server).resolve_download_url(&file("42:7")).await.unwrap();

    mock.assert_async().await;
    assert_eq!(url, "https://store.torbox.app/dl/abc");
}

#[tokio::test]
async fn test_resolve_processing_is_not_ready() {
    let mut server = Server::new_async().await;

    let _mock = server
        .mock("GET", "/torrents/requestdl")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"success": false, "detail": "Torrent is still processing.", "data": null}"#)
        .create_async()
        .await;

    let err = client(&server).resolve_download_url(&file("42:7")).await.unwrap_err();
    assert!(matches!(err, DebridError::NotReady));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_resolve_401_is_expired_regardless_of_body() {
    for status in [401, 403] {
        let mut server = Server::new_async().await;

        let _mock = server
            .mock("GET", "/torrents/requestdl")
            .match_query(Matcher::Any)
            .with_status(status)
            .with_body(r#"{"success": false, "detail": "still processing"}"#)
            .create_async()
            .await;

        let err = client(&server).resolve_download_url(&file("42:7")).await.unwrap_err();
        assert!(
            matches!(err, DebridError::ExpiredCredential),
            "status {} gave {:?}",
            status,
            err
        );
    }
}

#[tokio::test]
async fn test_resolve_error_carries_provider_message() {
    let mut server = Server::new_async().await;

    let _mock = server
        .mock("GET", "/torrents/requestdl")
        .match_query(Matcher::Any)
        .with_status(400)
        .with_body(r#"{"success": false, "detail": "File not found."}"#)
        .create_async()
        .await;

    let err = client(&server).resolve_download_url(&file("42:7")).await.unwrap_err();
    match err {
        DebridError::Provider { provider, message } => {
            assert_eq!(provider, "Torbox");
            assert_eq!(message, "File not found.");
        }
        other => panic!("Expected Provider error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_resolve_non_json_error() {
    let mut server = Server::new_async().await;

    let _mock = server
        .mock("GET", "/torrents/requestdl")
        .match_query(Matcher::Any)
        .with_status(502)
        .with_body("<html>Bad Gateway</html>")
        .create_async()
        .await;

    let err = client(&server).resolve_download_url(&file("42:7")).await.unwrap_err();
    assert_eq!(err.to_string(), "Torbox error: Torbox API error: 502");
}

#[tokio::test]
async fn test_resolve_invalid_file_id_makes_no_request() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/torrents/requestdl")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let result = client(&server).resolve_download_url(&file("not-an-id")).await;

    mock.assert_async().await;
    assert!(matches!(result, Err(DebridError::Provider { .. })));
}

// =============================================================================
// Identity Tests
// =============================================================================

#[test]
fn test_user_hash_is_md5_of_key() {
    let torbox = Torbox::new(Credentials::new("secret"));
    assert_eq!(torbox.user_hash(), "5ebe2294ecd0e0f08eab7690d2a6ee69");
    assert_eq!(torbox.descriptor().id, "torbox");
}

// =============================================================================
// Magnet Resolve Tests
// =============================================================================

#[tokio::test]
async fn test_resolve_magnet_picks_largest_file() {
    let mut server = Server::new_async().await;
    let magnet = magnet_from_hash(HASH);

    let create = server
        .mock("POST", "/torrents/create")
        .match_body(Matcher::Regex(format!(r"magnet:\?xt=urn:btih:{}", HASH)))
        .with_status(200)
        .with_body(r#"{"success": true, "data": {"torrent_id": 42}}"#)
        .create_async()
        .await;

    let _list = server
        .mock("GET", "/torrents/mylist")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            r#"{"data": [{"id": 42, "files": [
                {"id": 0, "name": "Movie/sample.mkv", "size": 30000000},
                {"id": 1, "name": "Movie/movie.mkv", "size": 4000000000},
                {"id": 2, "name": "Movie/movie.nfo", "size": 2048}
            ]}]}"#,
        )
        .create_async()
        .await;

    let requestdl = server
        .mock("GET", "/torrents/requestdl")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("torrent_id".into(), "42".into()),
            Matcher::UrlEncoded("file_id".into(), "1".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"success": true, "data": "https://store.torbox.app/dl/movie"}"#)
        .create_async()
        .await;

    let url = client(&server).resolve_magnet(&magnet, HASH).await.unwrap();

    create.assert_async().await;
    requestdl.assert_async().await;
    assert_eq!(url, "https://store.torbox.app/dl/movie");
}

#[tokio::test]
async fn test_resolve_magnet_processing_is_not_ready() {
    let mut server = Server::new_async().await;

    let _create = server
        .mock("POST", "/torrents/create")
        .with_status(200)
        .with_body(r#"{"success": true, "data": {"torrent_id": 42}}"#)
        .create_async()
        .await;

    let _list = server
        .mock("GET", "/torrents/mylist")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"data": [{"id": 42, "files": [{"id": 0, "name": "a.mkv", "size": 1}]}]}"#)
        .create_async()
        .await;

    let _requestdl = server
        .mock("GET", "/torrents/requestdl")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"success": false, "detail": "Torrent is processing", "data": null}"#)
        .create_async()
        .await;

    let err = client(&server)
        .resolve_magnet(&magnet_from_hash(HASH), HASH)
        .await
        .unwrap_err();
    assert!(matches!(err, DebridError::NotReady));
}
