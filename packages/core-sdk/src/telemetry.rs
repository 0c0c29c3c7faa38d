use std::{fs::OpenOptions, io::Write, path::PathBuf};

use anyhow::Result;
use once_cell::sync::Lazy;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::models::{StyleSuggestion, SuggestionSource};

static TELEMETRY_ENABLED: Lazy<std::sync::RwLock<bool>> =
    Lazy::new(|| std::sync::RwLock::new(false));

static LOG_DIR: Lazy<std::sync::RwLock<PathBuf>> =
    Lazy::new(|| std::sync::RwLock::new(PathBuf::from("logs")));

/**
 * \brief 更新遥测开关状态。
 */
pub fn set_enabled(enabled: bool) {
    if let Ok(mut guard) = TELEMETRY_ENABLED.write() {
        *guard = enabled;
    }
}

/**
 * \brief 查询当前遥测开关状态。
 */
pub fn is_enabled() -> bool {
    TELEMETRY_ENABLED.read().map(|g| *g).unwrap_or(false)
}

/**
 * \brief 修改审计日志目录（默认 `logs/`）。
 */
pub fn set_log_dir(dir: impl Into<PathBuf>) {
    if let Ok(mut guard) = LOG_DIR.write() {
        *guard = dir.into();
    }
}

/**
 * \brief 记录常规事件。
 */
pub fn log_event(category: &str, message: &str) {
    if !is_enabled() {
        return;
    }
    if let Err(err) = write_line("INFO", category, message) {
        tracing::warn!("telemetry write failed: {}", err);
    }
}

/**
 * \brief 记录错误事件。
 */
pub fn log_error(category: &str, message: &str) {
    if !is_enabled() {
        return;
    }
    if let Err(err) = write_line("ERROR", category, message) {
        tracing::warn!("telemetry write failed: {}", err);
    }
}

/**
 * \brief 记录一次建议结果（来源、图标、颜色），不记录分类名称本身。
 */
pub fn record_suggestion(category: &str, suggestion: &StyleSuggestion) {
    let source = match suggestion.source() {
        SuggestionSource::Gateway => "gateway",
        SuggestionSource::Repaired => "repaired",
        SuggestionSource::Local => "local",
    };
    log_event(
        category,
        &format!(
            "source={} icon={} color={}",
            source,
            suggestion.icon(),
            suggestion.color()
        ),
    );
}

fn current_log_dir() -> PathBuf {
    LOG_DIR
        .read()
        .map(|g| g.clone())
        .unwrap_or_else(|_| PathBuf::from("logs"))
}

fn write_line(level: &str, category: &str, message: &str) -> Result<()> {
    let log_dir = current_log_dir();
    if !log_dir.exists() {
        std::fs::create_dir_all(&log_dir)?;
    }
    let timestamp = OffsetDateTime::now_utc().format(&Rfc3339)?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("tareas.log"))?;
    writeln!(file, "{} [{}] {} - {}", timestamp, level, category, message)?;
    Ok(())
}
