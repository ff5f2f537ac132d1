//! Settings loading through to working cache and orchestrator instances

use std::io::Write;
use textproc_core::cache::TieredCache;
use textproc_core::config::{ConfigurationError, SettingsLoader};
use textproc_core::errors::{AppResult, ServiceError};
use textproc_core::resilience::{ResilienceOrchestrator, ResilienceStrategy};

#[tokio::test]
async fn test_environment_builds_working_components() -> AppResult<()> {
    let settings = SettingsLoader::from_vars([
        ("APP_ENV", "development"),
        ("CACHE_PRESET", "development"),
        ("RESILIENCE_PRESET", "development"),
        ("SUMMARIZE_RESILIENCE_STRATEGY", "critical"),
    ])
    .with_config_directory("does-not-exist")
    .load()?;

    let cache = TieredCache::new(settings.resolve_cache_config()?);
    let orchestrator = ResilienceOrchestrator::try_new(settings.resolve_resilience_config()?)?;

    assert_eq!(
        orchestrator.operation_strategy("summarize"),
        ResilienceStrategy::Critical
    );

    let summary = orchestrator
        .execute("summarize", || async { Ok::<_, ServiceError>("short".to_string()) })
        .await?;
    cache.set("summarize:1", &summary, None).await;
    assert_eq!(cache.get::<String>("summarize:1").await, Some(summary));
    Ok(())
}

#[test]
fn test_file_and_custom_json_layering() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
[cache]
preset = "production"

[resilience]
preset = "simple"
default_strategy = "conservative"
"#
    )
    .unwrap();

    let settings = SettingsLoader::from_vars([
        ("CACHE_CUSTOM_CONFIG", r#"{"compression_threshold": 4096}"#),
        ("RESILIENCE_CUSTOM_CONFIG", r#"{"retry_attempts": 4}"#),
    ])
    .with_file(file.path())
    .load()
    .unwrap();

    let cache_config = settings.resolve_cache_config().unwrap();
    assert_eq!(cache_config.compression_threshold, 4096);

    let resilience = settings.resolve_resilience_config().unwrap();
    assert_eq!(resilience.default_strategy, ResilienceStrategy::Conservative);
    assert_eq!(
        resilience
            .strategy_config(ResilienceStrategy::Conservative)
            .retry
            .max_attempts,
        4
    );
}

#[test]
fn test_unknown_preset_lists_alternatives() {
    let settings = SettingsLoader::from_vars([("CACHE_PRESET", "turbo")])
        .with_config_directory("does-not-exist")
        .load()
        .unwrap();

    match settings.resolve_cache_config() {
        Err(ConfigurationError::UnknownPreset { name, available }) => {
            assert_eq!(name, "turbo");
            assert!(available.iter().any(|preset| preset == "production"));
        }
        other => panic!("expected unknown preset error, got {other:?}"),
    }
}

#[test]
fn test_bad_strategy_is_rejected() {
    let settings = SettingsLoader::from_vars([("DEFAULT_RESILIENCE_STRATEGY", "reckless")])
        .with_config_directory("does-not-exist")
        .load()
        .unwrap();

    assert!(settings.resolve_resilience_config().is_err());
}
