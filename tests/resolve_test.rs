//! End-to-end resolution against mock provider sites.

mod common;

use common::{test_config, TestHarness, JAVBUS_DETAIL, JAVBUS_SEARCH, JAVDB_DETAIL, JAVDB_SEARCH};
use metaforge_common::ImageKind;
use metaforge_db::queries::records;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_javbus(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/search/ABC-123&type=1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(JAVBUS_SEARCH))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ABC-123"))
        .respond_with(ResponseTemplate::new(200).set_body_string(JAVBUS_DETAIL))
        .mount(server)
        .await;
}

async fn mount_javdb(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "ABC-123"))
        .respond_with(ResponseTemplate::new(200).set_body_string(JAVDB_SEARCH))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v/xyz"))
        .respond_with(ResponseTemplate::new(200).set_body_string(JAVDB_DETAIL))
        .mount(server)
        .await;
}

#[tokio::test]
async fn resolve_merges_secondary_provider() {
    let javbus = MockServer::start().await;
    let javdb = MockServer::start().await;
    mount_javbus(&javbus).await;
    mount_javdb(&javdb).await;

    let h = TestHarness::with_config(test_config(&[
        ("javbus", javbus.uri().as_str()),
        ("javdb", javdb.uri().as_str()),
    ]));

    let res = h
        .services
        .orchestrator
        .resolve("/media/abc-123.mp4")
        .await
        .expect("title should resolve");

    let record = &res.record;
    assert_eq!(record.provider, "javbus");
    assert_eq!(record.remote_ref, format!("{}/ABC-123", javbus.uri()));
    assert_eq!(record.title, "Right Title");
    assert_eq!(record.maker, "Maker Co");
    // Filled from the secondary source.
    assert_eq!(record.rating, Some(8.5));
    assert_eq!(record.genres, vec!["Drama", "Action"]);
    assert_eq!(record.actors, vec!["Alice", "Carol"]);
    assert_eq!(record.samples, vec![format!("{}/samples/ab/xyz_1.jpg", javdb.uri())]);
    assert_eq!(res.display_name, "ABC-123 Right Title");

    let cover = format!("{}/pics/cover/abc_b.jpg", javbus.uri());
    assert_eq!(res.images[0].kind, ImageKind::Primary);
    assert_eq!(res.images[0].url, h.services.links.local_url(&cover, ImageKind::Primary));
    assert_eq!(res.images.last().unwrap().kind, ImageKind::Thumb);

    let conn = h.conn();
    let stored = records::find_record(&conn, "javbus", &record.remote_ref)
        .unwrap()
        .unwrap();
    assert_eq!(stored.record.rating, Some(8.5));
    assert!(records::find_record(&conn, "javdb", &format!("{}/v/xyz", javdb.uri()))
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn resolve_skips_unreachable_provider() {
    let javdb = MockServer::start().await;
    mount_javdb(&javdb).await;

    // Nothing listens on port 9 of localhost.
    let h = TestHarness::with_config(test_config(&[
        ("javbus", "http://127.0.0.1:9/"),
        ("javdb", javdb.uri().as_str()),
    ]));

    let res = h.services.orchestrator.resolve("ABC-123").await.unwrap();
    assert_eq!(res.record.provider, "javdb");
    assert_eq!(res.record.actors, vec!["Alice", "Carol"]);
}

#[tokio::test]
async fn resolve_unknown_title() {
    let javbus = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&javbus)
        .await;

    let h = TestHarness::with_config(test_config(&[("javbus", javbus.uri().as_str())]));
    assert!(h.services.orchestrator.resolve("ZZZ-999").await.is_none());
}

#[tokio::test]
async fn resolve_ignores_non_title_names() {
    let javbus = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&javbus)
        .await;

    let h = TestHarness::with_config(test_config(&[("javbus", javbus.uri().as_str())]));
    assert!(h
        .services
        .orchestrator
        .resolve("Family Holiday Videos")
        .await
        .is_none());
}

#[tokio::test]
async fn resolve_applies_post_processing() {
    let javbus = MockServer::start().await;
    mount_javbus(&javbus).await;

    let mut config = test_config(&[("javbus", javbus.uri().as_str())]);
    config.resolve.subtitle_genre = true;
    config.resolve.title_format = "[{num}] {title} ({year})".to_string();
    config.resolve.genre_replace.insert("Drama".into(), "剧情".into());
    let h = TestHarness::with_config(config);

    let res = h.services.orchestrator.resolve("ABC-123-C.mkv").await.unwrap();
    assert_eq!(res.display_name, "[ABC-123] Right Title (2021)");
    assert_eq!(res.record.genres, vec!["剧情", "中文字幕"]);
}
