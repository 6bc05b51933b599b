//! 负责处理应用的持久化配置。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::info;

/// SoundCloud 的配置项。
///
/// 抓取到的 Client ID 连同抓取时间一起落盘，
/// 进程重启后可以直接复用仍在有效期内的凭据。
#[derive(Serialize, Deserialize, Debug)]
pub(crate) struct SoundcloudConfig {
    /// 缓存的 SoundCloud Client ID。
    pub client_id: String,
    /// 上一次成功抓取的时间。
    pub fetched_at: DateTime<Utc>,
}

/// 获取应用配置目录下指定文件的完整路径。
///
/// # 参数
/// * `filename` - 目标配置文件的名称，例如 "soundcloud_config.json"。
pub(crate) fn get_config_file_path(filename: &str) -> Result<PathBuf, std::io::Error> {
    if let Some(mut config_dir) = dirs::config_dir() {
        config_dir.push("music-aggregator");
        fs::create_dir_all(&config_dir)?;
        config_dir.push(filename);
        Ok(config_dir)
    } else {
        Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "无法找到用户配置目录",
        ))
    }
}

/// 从文件加载 SoundCloud 的配置。
pub(crate) fn load_soundcloud_config() -> Result<SoundcloudConfig, Box<dyn std::error::Error>> {
    let config_path = get_config_file_path("soundcloud_config.json")?;
    let content = fs::read_to_string(config_path)?;
    let config: SoundcloudConfig = serde_json::from_str(&content)?;
    info!("[SOUNDCLOUD] 已从缓存加载 Client ID。");
    Ok(config)
}

/// 将 SoundCloud 的配置实例序列化为 JSON 并保存到文件。
pub(crate) fn save_soundcloud_config(
    config: &SoundcloudConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = get_config_file_path("soundcloud_config.json")?;
    let content = serde_json::to_string_pretty(config)?;
    fs::write(config_path, content)?;
    info!("[SOUNDCLOUD] 已将 Client ID 保存到本地。");
    Ok(())
}
