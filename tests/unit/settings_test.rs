// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 配置设置测试模块
///
/// 测试配置文件加载与到门面配置的转换

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use storelayer::config::settings::Settings;
    use storelayer::infrastructure::cache::DeploymentMode;

    #[test]
    fn test_config_loading_from_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("Failed to create temp file");
        writeln!(
            file,
            r#"
[cache]
addresses = ["n1:7000", "n2:7001", "n3:7002"]
password = "secret"
read_timeout_ms = 250

[database]
url = "sqlite::memory:"
max_open_conns = 4
log_queries = true
skip_default_transaction = true
"#
        )
        .unwrap();

        let settings = Settings::from_file(file.path()).expect("Failed to load settings");

        let cache = settings.cache.to_options();
        assert_eq!(cache.addresses.len(), 3);
        assert_eq!(cache.password.as_deref(), Some("secret"));
        assert_eq!(cache.read_timeout, Duration::from_millis(250));
        // 未在文件中出现的字段取默认值
        assert_eq!(cache.dial_timeout, Duration::from_millis(5000));
        assert!(cache.deployment_mode().unwrap().is_cluster());

        let database = settings.database.to_options();
        assert_eq!(database.connection_string, "sqlite::memory:");
        assert_eq!(database.max_open_conns, 4);
        assert_eq!(database.max_idle_conns, 10);
        assert!(database.log_queries);
        assert!(database.skip_default_transaction);
        assert!(database.use_prepared_stmt);
    }

    #[test]
    fn test_defaults_describe_local_standalone_cache() {
        let file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("Failed to create temp file");

        let settings = Settings::from_file(file.path()).expect("Failed to load settings");
        assert_eq!(
            settings.cache.to_options().deployment_mode().unwrap(),
            DeploymentMode::Standalone("127.0.0.1:6379".to_string())
        );
        assert_eq!(
            settings.database.to_options().max_lifetime,
            Duration::from_secs(3600)
        );
    }

    #[test]
    fn test_legacy_address_is_honoured_from_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("Failed to create temp file");
        writeln!(
            file,
            r#"
[cache]
address = "legacy:6379"
"#
        )
        .unwrap();

        let settings = Settings::from_file(file.path()).expect("Failed to load settings");
        assert!(settings.cache.addresses.is_empty());
        assert_eq!(
            settings.cache.to_options().deployment_mode().unwrap(),
            DeploymentMode::Standalone("legacy:6379".to_string())
        );
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(Settings::from_file(&missing).is_err());
    }
}
