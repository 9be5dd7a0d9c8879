use std::time::Duration;

use coverfetch_service::caching::CoverError;
use coverfetch_test::HitCounter;
use reqwest::Url;

use crate::{cached_covers, entity, setup_service};

#[tokio::test]
async fn test_status_errors() {
    let server = HitCounter::new();
    let (service, covers_dir) = setup_service(vec![server.source(1, &[])], |_| {});

    let cases = [
        ("respond_statuscode/404/cover.jpg", CoverError::NotFound),
        (
            "respond_statuscode/403/cover.jpg",
            CoverError::PermissionDenied("403 Forbidden".into()),
        ),
        (
            "respond_statuscode/401/cover.jpg",
            CoverError::PermissionDenied("401 Unauthorized".into()),
        ),
        (
            "respond_statuscode/500/cover.jpg",
            CoverError::DownloadError("500 Internal Server Error".into()),
        ),
    ];

    for (path, expected) in cases {
        for kept in [true, false] {
            let entity = entity(&server.url(path), kept);
            let result = service.resolve(&entity, None).await;
            assert_eq!(result.unwrap_err(), expected, "{path}, kept: {kept}");
        }
    }

    assert_eq!(cached_covers(&covers_dir), 0);
}

#[tokio::test]
async fn test_empty_body() {
    let server = HitCounter::new();
    let (service, covers_dir) = setup_service(vec![server.source(1, &[])], |_| {});

    for kept in [true, false] {
        let entity = entity(&server.url("empty/cover.jpg"), kept);
        let result = service.resolve(&entity, None).await;
        assert_eq!(result.unwrap_err(), CoverError::EmptyBody);
    }

    assert_eq!(cached_covers(&covers_dir), 0);
}

#[tokio::test]
async fn test_head_timeout() {
    let server = HitCounter::new();
    let (service, _covers_dir) = setup_service(vec![server.source(1, &[])], |config| {
        config.head_timeout = Duration::from_millis(100);
    });
    let entity = entity(&server.url("delay/1s/covers/slow.jpg"), true);

    let result = service.resolve(&entity, None).await;
    assert_eq!(
        result.unwrap_err(),
        CoverError::Timeout(Duration::from_millis(100))
    );
}

#[tokio::test]
async fn test_connection_refused() {
    let (service, _covers_dir) = setup_service(vec![], |_| {});

    // Bind and immediately release a port, so nothing is listening on it.
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let url: Url = format!("http://127.0.0.1:{port}/cover.jpg").parse().unwrap();

    let result = service.resolve(&entity(&url, true), None).await;
    assert!(matches!(result, Err(CoverError::DownloadError(_))), "{result:?}");
}
