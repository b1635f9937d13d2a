use std::fmt;

#[derive(Debug, Clone)]
pub enum GeoKeeperError {
    Config(String),
    DatabaseOpen(String),
    DatabaseClose(String),
    Http(String),
    Archive(String),
    FileOperation(String),
    Timestamp(String),
    Validation(String),
}

impl GeoKeeperError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            GeoKeeperError::Config(_) => "E001",
            GeoKeeperError::DatabaseOpen(_) => "E002",
            GeoKeeperError::DatabaseClose(_) => "E003",
            GeoKeeperError::Http(_) => "E004",
            GeoKeeperError::Archive(_) => "E005",
            GeoKeeperError::FileOperation(_) => "E006",
            GeoKeeperError::Timestamp(_) => "E007",
            GeoKeeperError::Validation(_) => "E008",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            GeoKeeperError::Config(_) => "Configuration Error",
            GeoKeeperError::DatabaseOpen(_) => "Database Open Error",
            GeoKeeperError::DatabaseClose(_) => "Database Close Error",
            GeoKeeperError::Http(_) => "HTTP Error",
            GeoKeeperError::Archive(_) => "Archive Error",
            GeoKeeperError::FileOperation(_) => "File Operation Error",
            GeoKeeperError::Timestamp(_) => "Timestamp Error",
            GeoKeeperError::Validation(_) => "Validation Error",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            GeoKeeperError::Config(msg) => msg,
            GeoKeeperError::DatabaseOpen(msg) => msg,
            GeoKeeperError::DatabaseClose(msg) => msg,
            GeoKeeperError::Http(msg) => msg,
            GeoKeeperError::Archive(msg) => msg,
            GeoKeeperError::FileOperation(msg) => msg,
            GeoKeeperError::Timestamp(msg) => msg,
            GeoKeeperError::Validation(msg) => msg,
        }
    }

    /// Transient failures are retried on the next timer tick without any state change.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GeoKeeperError::Http(_) | GeoKeeperError::FileOperation(_) | GeoKeeperError::DatabaseOpen(_)
        )
    }

    /// 格式化为彩色输出（用于 Server 模式启动失败）
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
}

impl fmt::Display for GeoKeeperError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for GeoKeeperError {}

// 便捷的构造函数
impl GeoKeeperError {
    pub fn config<T: Into<String>>(msg: T) -> Self {
        GeoKeeperError::Config(msg.into())
    }

    pub fn database_open<T: Into<String>>(msg: T) -> Self {
        GeoKeeperError::DatabaseOpen(msg.into())
    }

    pub fn database_close<T: Into<String>>(msg: T) -> Self {
        GeoKeeperError::DatabaseClose(msg.into())
    }

    pub fn http<T: Into<String>>(msg: T) -> Self {
        GeoKeeperError::Http(msg.into())
    }

    pub fn archive<T: Into<String>>(msg: T) -> Self {
        GeoKeeperError::Archive(msg.into())
    }

    pub fn file_operation<T: Into<String>>(msg: T) -> Self {
        GeoKeeperError::FileOperation(msg.into())
    }

    pub fn timestamp<T: Into<String>>(msg: T) -> Self {
        GeoKeeperError::Timestamp(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        GeoKeeperError::Validation(msg.into())
    }
}

// 为常见的错误类型实现 From trait
impl From<std::io::Error> for GeoKeeperError {
    fn from(err: std::io::Error) -> Self {
        GeoKeeperError::FileOperation(err.to_string())
    }
}

impl From<ureq::Error> for GeoKeeperError {
    fn from(err: ureq::Error) -> Self {
        GeoKeeperError::Http(err.to_string())
    }
}

impl From<maxminddb::MaxMindDbError> for GeoKeeperError {
    fn from(err: maxminddb::MaxMindDbError) -> Self {
        GeoKeeperError::DatabaseOpen(err.to_string())
    }
}

impl From<config::ConfigError> for GeoKeeperError {
    fn from(err: config::ConfigError) -> Self {
        GeoKeeperError::Config(err.to_string())
    }
}

impl From<chrono::ParseError> for GeoKeeperError {
    fn from(err: chrono::ParseError) -> Self {
        GeoKeeperError::Timestamp(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GeoKeeperError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_uses_simple_format() {
        let err = GeoKeeperError::archive("no .mmdb entry found in archive");
        assert_eq!(
            err.to_string(),
            "Archive Error: no .mmdb entry found in archive"
        );
        assert_eq!(err.code(), "E005");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: GeoKeeperError = io_err.into();
        assert!(matches!(err, GeoKeeperError::FileOperation(_)));
        assert!(err.is_transient());
        assert!(err.message().contains("missing"));
    }

    #[test]
    fn test_data_errors_are_not_transient() {
        assert!(!GeoKeeperError::archive("bad gzip").is_transient());
        assert!(!GeoKeeperError::timestamp("bad header").is_transient());
        assert!(GeoKeeperError::http("timeout").is_transient());
    }
}
