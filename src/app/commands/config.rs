use crate::app::state::AppState;
use crate::config::config_keys;

use super::common::map_api_error;

// ==========================================
// 配置
// ==========================================

/// 全部全局键值
pub async fn get_config_snapshot(state: &AppState) -> Result<String, String> {
    state
        .config_manager
        .get_config_snapshot()
        .map_err(|e| map_api_error(e.into()))
}

/// 保存已知配置键;策略在下次启动时重新加载
pub async fn update_config(state: &AppState, key: String, value: String) -> Result<String, String> {
    let known = [
        config_keys::JUSTIFICATION_MIN_LENGTH,
        config_keys::LINE_LOCK_TIMEOUT_MS,
        config_keys::OPERATING_EXERCICE,
        config_keys::ALERT_THRESHOLD_PCT,
    ];
    if !known.contains(&key.as_str()) {
        return Err(format!("unknown config key: {}", key));
    }

    state
        .config_manager
        .set_global_config_value(&key, value.trim())
        .map_err(|e| map_api_error(e.into()))?;
    tracing::info!(key = %key, value = %value, "config updated");

    Ok("{}".to_string())
}
