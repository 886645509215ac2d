//! Configuration files, environment lookup and validated updates.

use anyhow::Result;
use std::path::PathBuf;

use typst_prep::test_utils::{TestProject, init_test_logging};
use typst_prep::{ConfigUpdate, TypstConfig, TypstError, TypstService};

#[test]
fn test_toml_file_update() -> Result<()> {
    init_test_logging(None);
    let project = TestProject::new()?;
    let scratch = project.path().join("tmp/typst");
    let file = project.write(
        "typst-prep.toml",
        &format!(
            "format = \"svg\"\ntimeout = \"15\"\nworking_directory = \"{}\"\nfont_paths = [\"/fonts/a\", \"/fonts/b\"]\ndebug = true\n",
            scratch.display()
        ),
    )?;

    let mut config = project.config();
    config.apply(ConfigUpdate::from_toml_file(&file)?);
    let service = TypstService::new(config)?;

    let config = service.config();
    assert_eq!(config.format, "svg");
    assert_eq!(config.timeout, 15);
    assert_eq!(config.working_directory, scratch);
    assert_eq!(config.font_paths, vec![PathBuf::from("/fonts/a"), PathBuf::from("/fonts/b")]);
    assert!(config.debug);
    assert!(scratch.is_dir());
    assert!(project.debug_dir().is_dir());
    Ok(())
}

#[test]
fn test_invalid_field_values_fall_back_to_defaults() -> Result<()> {
    let update = ConfigUpdate::from_toml_str("bin_path = \"typst;id\"\ntimeout = [1]\nformat = \"\"\n")?;
    let mut config = TypstConfig::with_base_path("/srv/app");
    config.bin_path = "/opt/typst".to_string();
    config.timeout = 5;

    config.apply(update);

    assert_eq!(config.bin_path, "typst");
    assert_eq!(config.timeout, 60);
    assert_eq!(config.format, "pdf");
    Ok(())
}

#[test]
fn test_malformed_file_is_config_error() -> Result<()> {
    let project = TestProject::new()?;
    let file = project.write("broken.toml", "format = \n")?;

    let err = TypstService::load(Some(&file)).unwrap_err();

    assert!(matches!(err, TypstError::ConfigError { .. }), "{err:?}");
    Ok(())
}

#[test]
fn test_base_path_change_moves_derived_directories() -> Result<()> {
    let project = TestProject::new()?;
    let mut service = TypstService::new(project.config())?;
    let moved = project.path().join("moved");

    service.set_config(ConfigUpdate {
        base_path: Some(moved.to_string_lossy().into_owned()),
        ..ConfigUpdate::default()
    })?;

    let config = service.config();
    assert_eq!(config.working_directory, moved.join("storage/typst"));
    assert_eq!(config.template_root(), moved.join("resources/typst"));
    assert_eq!(config.effective_root(), moved.as_path());
    assert!(config.working_directory.is_dir());
    Ok(())
}

#[test]
fn test_environment_lookup() {
    let update = ConfigUpdate::from_lookup(|key| match key {
        "TYPST_TIMEOUT" => Some("0".to_string()),
        "TYPST_ROOT" => Some(String::new()),
        "TYPST_DEBUG" => Some("yes".to_string()),
        _ => None,
    });
    let mut config = TypstConfig::with_base_path("/srv/app");
    config.root = Some(PathBuf::from("/srv/app/docs"));

    config.apply(update);

    assert_eq!(config.timeout_duration(), None);
    assert_eq!(config.root, None);
    assert!(config.debug);
    assert_eq!(config.bin_path, "typst");
}
