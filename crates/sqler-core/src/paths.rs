use std::path::PathBuf;

/// 获取 sqler 根目录（~/.sqler）
///
/// Fallback: 如果 home_dir 失败，使用 ./.sqler
pub fn root_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".sqler"))
        .unwrap_or_else(|| PathBuf::from(".sqler"))
}

/// 获取数据源配置文件路径（~/.sqler/sources.db）
pub fn sources_db() -> PathBuf {
    root_dir().join("sources.db")
}
