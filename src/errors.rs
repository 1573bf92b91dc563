use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShortenerError {
    NotFound(String),
    /// 该 URL 已有可用短码，负载为已存在的短链接
    AlreadyExists(String),
    Deleted(String),
    Validation(String),
    Cancelled(String),
    BackendUnavailable(String),
    DatabaseConfig(String),
    DatabaseOperation(String),
    FileOperation(String),
    Serialization(String),
}

impl ShortenerError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            ShortenerError::NotFound(_) => "E001",
            ShortenerError::AlreadyExists(_) => "E002",
            ShortenerError::Deleted(_) => "E003",
            ShortenerError::Validation(_) => "E004",
            ShortenerError::Cancelled(_) => "E005",
            ShortenerError::BackendUnavailable(_) => "E006",
            ShortenerError::DatabaseConfig(_) => "E007",
            ShortenerError::DatabaseOperation(_) => "E008",
            ShortenerError::FileOperation(_) => "E009",
            ShortenerError::Serialization(_) => "E010",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            ShortenerError::NotFound(_) => "Resource Not Found",
            ShortenerError::AlreadyExists(_) => "Already Exists",
            ShortenerError::Deleted(_) => "Resource Deleted",
            ShortenerError::Validation(_) => "Validation Error",
            ShortenerError::Cancelled(_) => "Operation Cancelled",
            ShortenerError::BackendUnavailable(_) => "Backend Unavailable",
            ShortenerError::DatabaseConfig(_) => "Database Configuration Error",
            ShortenerError::DatabaseOperation(_) => "Database Operation Error",
            ShortenerError::FileOperation(_) => "File Operation Error",
            ShortenerError::Serialization(_) => "Serialization Error",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            ShortenerError::NotFound(msg)
            | ShortenerError::AlreadyExists(msg)
            | ShortenerError::Deleted(msg)
            | ShortenerError::Validation(msg)
            | ShortenerError::Cancelled(msg)
            | ShortenerError::BackendUnavailable(msg)
            | ShortenerError::DatabaseConfig(msg)
            | ShortenerError::DatabaseOperation(msg)
            | ShortenerError::FileOperation(msg)
            | ShortenerError::Serialization(msg) => msg,
        }
    }

    /// 格式化为彩色输出（用于终端日志）
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        format!(
            "{} {} {}\n  {}",
            "[ERROR]".red().bold(),
            self.code().yellow(),
            self.error_type().red(),
            self.message().white()
        )
    }

    /// 格式化为简洁输出
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ShortenerError::NotFound(_))
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, ShortenerError::Deleted(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ShortenerError::Cancelled(_))
    }
}

impl fmt::Display for ShortenerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for ShortenerError {}

// 便捷的构造函数
impl ShortenerError {
    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        ShortenerError::NotFound(msg.into())
    }

    pub fn already_exists<T: Into<String>>(msg: T) -> Self {
        ShortenerError::AlreadyExists(msg.into())
    }

    pub fn deleted<T: Into<String>>(msg: T) -> Self {
        ShortenerError::Deleted(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        ShortenerError::Validation(msg.into())
    }

    pub fn cancelled<T: Into<String>>(msg: T) -> Self {
        ShortenerError::Cancelled(msg.into())
    }

    pub fn backend_unavailable<T: Into<String>>(msg: T) -> Self {
        ShortenerError::BackendUnavailable(msg.into())
    }

    pub fn database_config<T: Into<String>>(msg: T) -> Self {
        ShortenerError::DatabaseConfig(msg.into())
    }

    pub fn database_operation<T: Into<String>>(msg: T) -> Self {
        ShortenerError::DatabaseOperation(msg.into())
    }

    pub fn file_operation<T: Into<String>>(msg: T) -> Self {
        ShortenerError::FileOperation(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        ShortenerError::Serialization(msg.into())
    }
}

// 为常见的错误类型实现 From trait
impl From<sea_orm::DbErr> for ShortenerError {
    fn from(err: sea_orm::DbErr) -> Self {
        ShortenerError::DatabaseOperation(err.to_string())
    }
}

impl From<std::io::Error> for ShortenerError {
    fn from(err: std::io::Error) -> Self {
        ShortenerError::FileOperation(err.to_string())
    }
}

impl From<serde_json::Error> for ShortenerError {
    fn from(err: serde_json::Error) -> Self {
        ShortenerError::Serialization(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ShortenerError {
    fn from(err: tokio::task::JoinError) -> Self {
        ShortenerError::BackendUnavailable(format!("后台任务异常退出: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, ShortenerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_unique() {
        let errors = [
            ShortenerError::not_found("a"),
            ShortenerError::already_exists("a"),
            ShortenerError::deleted("a"),
            ShortenerError::validation("a"),
            ShortenerError::cancelled("a"),
            ShortenerError::backend_unavailable("a"),
            ShortenerError::database_config("a"),
            ShortenerError::database_operation("a"),
            ShortenerError::file_operation("a"),
            ShortenerError::serialization("a"),
        ];
        let codes: std::collections::HashSet<_> = errors.iter().map(|e| e.code()).collect();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_display_uses_simple_format() {
        let err = ShortenerError::deleted("abcdefgh");
        assert_eq!(err.to_string(), "Resource Deleted: abcdefgh");
        assert_eq!(err.message(), "abcdefgh");
    }

    #[test]
    fn test_io_error_maps_to_file_operation() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: ShortenerError = io.into();
        assert!(matches!(err, ShortenerError::FileOperation(_)));
    }

    #[test]
    fn test_predicates() {
        assert!(ShortenerError::not_found("x").is_not_found());
        assert!(ShortenerError::deleted("x").is_deleted());
        assert!(ShortenerError::cancelled("x").is_cancelled());
        assert!(!ShortenerError::validation("x").is_not_found());
    }
}
