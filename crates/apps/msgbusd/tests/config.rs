use std::io::Write;

use msgbusd::load_config;

#[test]
fn missing_file_surfaces_as_a_config_read_error() {
    let err = load_config("/nonexistent/msgbusd.toml").unwrap_err();
    assert!(matches!(err, msgbusd::DaemonError::ConfigRead(_)));
}

#[test]
fn malformed_toml_surfaces_as_a_config_parse_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "not = [valid").unwrap();
    let err = load_config(file.path()).unwrap_err();
    assert!(matches!(err, msgbusd::DaemonError::ConfigParse(_)));
}

#[test]
fn well_formed_file_overrides_only_the_keys_it_names() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
        [router]
        id_major = 3
        id_count = 16
        "#
    )
    .unwrap();
    let config = load_config(file.path()).unwrap();
    let router = config.router_config();
    assert_eq!(router.id_major, 3);
    assert_eq!(router.id_count, 16);
    assert_eq!(router.id_minor, msgbus_router::RouterConfig::default().id_minor);
}
