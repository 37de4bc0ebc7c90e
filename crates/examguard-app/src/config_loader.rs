//! 설정 로드.
//!
//! 기본값 → TOML 파일(선택) → `EXAMGUARD_` 환경변수 순으로 덮어쓴다.
//! 중첩 키는 `__`로 구분한다 (예: `EXAMGUARD_SESSION__VIOLATION_LIMIT=10`).

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use directories::ProjectDirs;
use examguard_core::config::AppConfig;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const ENV_PREFIX: &str = "EXAMGUARD";
const DB_FILE_NAME: &str = "examguard.db";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "examguard", "examguard")
}

/// 플랫폼별 기본 설정 파일 경로
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|p| p.config_dir().join("config.toml"))
}

/// 설정 로드. `path`가 주어지면 파일이 반드시 있어야 한다
pub fn load(path: Option<&Path>) -> Result<AppConfig> {
    load_with_env(path, None)
}

/// 환경변수 원본을 지정해 설정 로드 (`None`이면 프로세스 환경)
pub fn load_with_env(path: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<AppConfig> {
    let mut builder = Config::builder();

    match path {
        Some(path) => {
            info!("설정 파일: {}", path.display());
            builder = builder.add_source(File::from(path).required(true));
        }
        None => {
            if let Some(default_path) = default_config_path() {
                debug!("기본 설정 파일 확인: {}", default_path.display());
                builder = builder.add_source(File::from(default_path).required(false));
            }
        }
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .source(env),
    );

    let config: AppConfig = builder
        .build()
        .context("설정 로드 실패")?
        .try_deserialize()
        .context("설정 형식 오류")?;
    Ok(config)
}

/// 데이터베이스 경로 결정
///
/// 우선순위: CLI `--data-dir` → 설정 `storage.db_path` → 플랫폼 데이터 디렉토리 → 현재 디렉토리
pub fn resolve_db_path(config: &AppConfig, data_dir: Option<&Path>) -> PathBuf {
    data_dir
        .map(|d| d.join(DB_FILE_NAME))
        .or_else(|| config.storage.db_path.clone())
        .or_else(|| project_dirs().map(|p| p.data_dir().join(DB_FILE_NAME)))
        .unwrap_or_else(|| PathBuf::from(DB_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> Option<HashMap<String, String>> {
        Some(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[server]
base_url = "https://exam.example.com"

[session]
violation_limit = 3
time_budget_secs = 600
"#,
        )
        .unwrap();

        let config = load_with_env(Some(&path), env(&[])).unwrap();
        assert_eq!(config.server.base_url, "https://exam.example.com");
        assert_eq!(config.session.violation_limit, 3);
        assert_eq!(config.session.time_budget_secs, 600);
        assert_eq!(config.session.warning_display_secs, 5);
        assert_eq!(config.storage.snapshot_key, "testState");
    }

    #[test]
    fn environment_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[session]\nviolation_limit = 3\n").unwrap();

        let config = load_with_env(
            Some(&path),
            env(&[
                ("EXAMGUARD_SESSION__VIOLATION_LIMIT", "10"),
                ("EXAMGUARD_CHANNEL__ENABLED", "false"),
            ]),
        )
        .unwrap();
        assert_eq!(config.session.violation_limit, 10);
        assert!(!config.channel.enabled);
    }

    #[test]
    fn missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_with_env(Some(&dir.path().join("absent.toml")), env(&[]));
        assert!(result.is_err());
    }

    #[test]
    fn db_path_precedence() {
        let mut config = AppConfig::default_config();
        config.storage.db_path = Some(PathBuf::from("/var/lib/examguard/exam.db"));

        let from_cli = resolve_db_path(&config, Some(Path::new("/tmp/eg")));
        assert_eq!(from_cli, PathBuf::from("/tmp/eg").join("examguard.db"));

        let from_config = resolve_db_path(&config, None);
        assert_eq!(from_config, PathBuf::from("/var/lib/examguard/exam.db"));
    }
}
