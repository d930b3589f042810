use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 日志环境配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingEnvironment {
    /// 开发环境
    Development,
    /// 测试环境
    Testing,
    /// 生产环境
    Production,
}

/// 日志格式配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// 人类可读格式
    Pretty,
    /// JSON 格式（当前降级为紧凑格式输出）
    Json,
    /// 紧凑格式
    Compact,
}

/// 日志配置
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// 环境
    pub environment: LoggingEnvironment,
    /// 日志级别
    pub level: Level,
    /// 输出格式
    pub format: LogFormat,
    /// 是否显示目标模块
    pub show_target: bool,
    /// 是否显示线程ID
    pub show_thread_ids: bool,
    /// 是否允许 `RUST_LOG` 覆盖级别
    pub respect_env_filter: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            environment: LoggingEnvironment::Development,
            level: Level::INFO,
            format: LogFormat::Pretty,
            show_target: true,
            show_thread_ids: false,
            respect_env_filter: true,
        }
    }
}

impl LoggingConfig {
    /// 创建开发环境配置
    pub fn development() -> Self {
        Self {
            environment: LoggingEnvironment::Development,
            level: Level::DEBUG,
            format: LogFormat::Pretty,
            show_target: true,
            show_thread_ids: true,
            respect_env_filter: true,
        }
    }

    /// 创建生产环境配置
    pub fn production() -> Self {
        Self {
            environment: LoggingEnvironment::Production,
            level: Level::INFO,
            format: LogFormat::Json,
            show_target: false,
            show_thread_ids: false,
            respect_env_filter: true,
        }
    }

    /// 创建测试环境配置
    pub fn testing() -> Self {
        Self {
            environment: LoggingEnvironment::Testing,
            level: Level::ERROR,
            format: LogFormat::Compact,
            show_target: false,
            show_thread_ids: false,
            respect_env_filter: false,
        }
    }

    /// 按名称选择预设（dev / test / prod），未知名称回退到默认配置
    pub fn for_environment(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "dev" | "development" => Self::development(),
            "test" | "testing" => Self::testing(),
            "prod" | "production" => Self::production(),
            _ => Self::default(),
        }
    }

    /// 覆盖日志级别，无法解析时保持原值
    pub fn with_level(mut self, level: &str) -> Self {
        match Level::from_str(level) {
            Ok(level) => self.level = level,
            Err(_) => eprintln!("⚠️ 无法识别的日志级别 '{}'，保持 {}", level, self.level),
        }
        self
    }

    fn env_filter(&self) -> EnvFilter {
        let fallback = || EnvFilter::new(self.level.as_str().to_ascii_lowercase());
        if self.respect_env_filter {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback())
        } else {
            fallback()
        }
    }
}

/// 初始化日志系统
///
/// 全局 subscriber 已存在时返回错误，调用方可以忽略。
pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let filter = config.env_filter();
    let ansi = config.environment != LoggingEnvironment::Production;

    match config.format {
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer()
                .pretty()
                .with_target(config.show_target)
                .with_thread_ids(config.show_thread_ids)
                .with_ansi(ansi);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()?;
        }
        LogFormat::Json | LogFormat::Compact => {
            let fmt_layer = fmt::layer()
                .compact()
                .with_target(config.show_target)
                .with_thread_ids(config.show_thread_ids)
                .with_ansi(ansi);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()?;
        }
    }

    tracing::debug!(
        environment = ?config.environment,
        level = ?config.level,
        format = ?config.format,
        "Logging system initialized"
    );

    Ok(())
}

/// 操作计时器，用于批量注册、插件加载等耗时操作
pub struct OperationTimer {
    start: Instant,
    operation: String,
}

impl OperationTimer {
    pub fn new(operation: &str) -> Self {
        Self {
            start: Instant::now(),
            operation: operation.to_string(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// 完成计时并记录日志，返回耗时
    pub fn finish(self) -> Duration {
        let duration = self.start.elapsed();
        tracing::debug!(
            operation = %self.operation,
            duration_ms = duration.as_millis() as u64,
            "Operation completed"
        );
        duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_config_creation() {
        let dev_config = LoggingConfig::development();
        assert_eq!(dev_config.environment, LoggingEnvironment::Development);
        assert_eq!(dev_config.level, Level::DEBUG);
        assert_eq!(dev_config.format, LogFormat::Pretty);

        let prod_config = LoggingConfig::production();
        assert_eq!(prod_config.environment, LoggingEnvironment::Production);
        assert_eq!(prod_config.level, Level::INFO);
        assert_eq!(prod_config.format, LogFormat::Json);

        let test_config = LoggingConfig::testing();
        assert_eq!(test_config.environment, LoggingEnvironment::Testing);
        assert_eq!(test_config.level, Level::ERROR);
        assert!(!test_config.respect_env_filter);
    }

    #[test]
    fn test_environment_presets_by_name() {
        assert_eq!(
            LoggingConfig::for_environment("PROD").environment,
            LoggingEnvironment::Production
        );
        assert_eq!(
            LoggingConfig::for_environment("test").environment,
            LoggingEnvironment::Testing
        );
        assert_eq!(LoggingConfig::for_environment("staging").level, Level::INFO);
    }

    #[test]
    fn test_with_level_override() {
        let config = LoggingConfig::production().with_level("trace");
        assert_eq!(config.level, Level::TRACE);

        let config = LoggingConfig::production().with_level("loud");
        assert_eq!(config.level, Level::INFO);
    }

    #[test]
    fn test_operation_timer() {
        let timer = OperationTimer::new("auto_register");
        std::thread::sleep(Duration::from_millis(1));
        assert!(timer.elapsed().as_nanos() > 0);
        assert!(timer.finish() >= Duration::from_millis(1));
    }
}
