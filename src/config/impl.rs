use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwap;

use super::StaticConfig;

static CONFIG: OnceLock<ArcSwap<StaticConfig>> = OnceLock::new();

/// Returns the global configuration.
///
/// Loads `config.toml` + environment on first access if nothing was
/// installed with [`init_config_with`].
pub fn get_config() -> Arc<StaticConfig> {
    CONFIG
        .get_or_init(|| ArcSwap::from_pointee(StaticConfig::load()))
        .load_full()
}

/// 安装已构建好的配置（命令行参数覆盖之后）
pub fn init_config_with(config: StaticConfig) {
    match CONFIG.get() {
        Some(current) => current.store(Arc::new(config)),
        None => {
            let mut pending = Some(config);
            let cell =
                CONFIG.get_or_init(|| ArcSwap::from_pointee(pending.take().unwrap_or_default()));
            // 并发初始化时另一方先写入
            if let Some(config) = pending {
                cell.store(Arc::new(config));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_config_with_replaces_value() {
        let mut config = StaticConfig::default();
        config.shortener.base_url = "https://first.example".to_string();
        init_config_with(config.clone());
        assert_eq!(get_config().shortener.base_url, "https://first.example");

        config.shortener.base_url = "https://second.example".to_string();
        init_config_with(config);
        assert_eq!(get_config().shortener.base_url, "https://second.example");
    }
}
