use coverfetch_service::covers::ServedFrom;
use coverfetch_sources::{EntityId, SourceId};
use coverfetch_test::{HitCounter, cover_body};

use crate::{cached_covers, entity, setup_service};

#[tokio::test]
async fn test_kept_cover_is_fetched_once() {
    let server = HitCounter::new();
    let (service, covers_dir) = setup_service(vec![server.source(1, &[])], |_| {});
    let entity = entity(&server.url("covers/one.jpg"), true);

    let cover = service.resolve(&entity, None).await.unwrap();
    assert_eq!(cover.served_from(), ServedFrom::Network);
    assert_eq!(cover.into_bytes().await.unwrap(), cover_body("one.jpg"));

    let cover = service.resolve(&entity, None).await.unwrap();
    assert_eq!(cover.served_from(), ServedFrom::Disk);
    assert_eq!(cover.into_bytes().await.unwrap(), cover_body("one.jpg"));

    assert_eq!(server.accesses(), 1);
    assert_eq!(cached_covers(&covers_dir), 1);
}

#[tokio::test]
async fn test_unkept_cover_is_streamed() {
    let server = HitCounter::new();
    let (service, covers_dir) = setup_service(vec![server.source(1, &[])], |_| {});
    let entity = entity(&server.url("covers/one.jpg"), false);

    for _ in 0..2 {
        let cover = service.resolve(&entity, None).await.unwrap();
        assert_eq!(cover.served_from(), ServedFrom::Network);
        assert_eq!(cover.into_bytes().await.unwrap(), cover_body("one.jpg"));
    }

    assert_eq!(server.accesses(), 2);
    assert_eq!(cached_covers(&covers_dir), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests() {
    let server = HitCounter::new();
    let (service, _covers_dir) = setup_service(vec![server.source(1, &[])], |_| {});
    let entity = entity(&server.url("covers/shared.jpg"), true);

    let requests = (0..8).map(|_| {
        let service = service.clone();
        let entity = entity.clone();
        tokio::spawn(async move { service.resolve(&entity, None).await?.into_bytes().await })
    });

    for result in futures::future::join_all(requests).await {
        assert_eq!(result.unwrap().unwrap(), cover_body("shared.jpg"));
    }
    assert_eq!(server.accesses(), 1);
}

#[tokio::test]
async fn test_source_headers() {
    let server = HitCounter::new();
    let source = server.source(1, &[("Referer", "https://example.com/")]);
    let (service, _covers_dir) = setup_service(vec![source], |_| {});
    let entity = entity(&server.url("echo_headers/cover.jpg"), false);

    let cover = service.resolve(&entity, None).await.unwrap();
    assert_eq!(
        cover.into_bytes().await.unwrap(),
        "user-agent=[] referer=[https://example.com/]"
    );
}

#[tokio::test]
async fn test_unknown_source_sends_no_headers() {
    let server = HitCounter::new();
    let (service, _covers_dir) = setup_service(vec![], |_| {});
    let entity = coverfetch_sources::Entity::new(
        EntityId::new(1),
        SourceId::new(9),
        server.url("echo_headers/cover.jpg").as_str(),
    );

    let cover = service.resolve(&entity, None).await.unwrap();
    let body = cover.into_bytes().await.unwrap();
    let body = std::str::from_utf8(&body).unwrap();
    assert!(body.starts_with("user-agent=[coverfetch/"), "{body}");
    assert!(body.ends_with("referer=[<none>]"), "{body}");
}

#[tokio::test]
async fn test_redirects_are_followed() {
    let server = HitCounter::new();
    let (service, _covers_dir) = setup_service(vec![server.source(1, &[])], |_| {});
    let entity = entity(&server.url("redirect/covers/moved.jpg"), true);

    let cover = service.resolve(&entity, None).await.unwrap();
    assert_eq!(cover.into_bytes().await.unwrap(), cover_body("moved.jpg"));
    assert_eq!(server.accesses(), 2);
}

#[tokio::test]
async fn test_origin_override() {
    let server = HitCounter::new();
    let (service, _covers_dir) = setup_service(vec![server.source(1, &[])], |_| {});
    let entity = entity(&server.url("covers/original.jpg"), true);
    let other = server.url("covers/other.jpg");

    let cover = service.resolve(&entity, Some(other.as_str())).await.unwrap();
    assert_eq!(cover.into_bytes().await.unwrap(), cover_body("other.jpg"));
    assert_eq!(
        server.all_hits(),
        vec![("/covers/other.jpg".to_owned(), 1)]
    );
}
