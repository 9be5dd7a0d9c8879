use coverfetch_service::config::Config;
use coverfetch_service::covers::CoverService;
use coverfetch_sources::{Entity, EntityId, SourceConfig, SourceId};
use coverfetch_test::TempDir;
use reqwest::Url;

/// Creates a [`CoverService`] which stores its covers in a fresh temporary directory.
///
/// The returned [`TempDir`] has to be held for the duration of the test.
pub fn setup_service(
    sources: Vec<SourceConfig>,
    update_config: impl FnOnce(&mut Config),
) -> (CoverService, TempDir) {
    coverfetch_test::setup();

    let covers_dir = coverfetch_test::tempdir();
    let mut config = Config {
        covers_dir: covers_dir.path().join("covers"),
        custom_covers_dir: Some(covers_dir.path().join("custom")),
        sources: sources.into(),
        ..Config::default()
    };
    update_config(&mut config);

    let sources = coverfetch_service::sources::from_config(&config).unwrap();
    let service = CoverService::from_config(&config, sources).unwrap();

    (service, covers_dir)
}

/// An entity of source `1` whose cover lives at `url`.
pub fn entity(url: &Url, kept: bool) -> Entity {
    Entity::new(EntityId::new(1), SourceId::new(1), url.as_str()).kept(kept)
}

/// The number of files in the covers directory.
pub fn cached_covers(covers_dir: &TempDir) -> usize {
    match std::fs::read_dir(covers_dir.path().join("covers")) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    }
}
