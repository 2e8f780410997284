use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config directory not found")]
    ConfigDirNotFound,

    #[error(
        "config file not found. Looked in:\n\
        - the REKA_CONFIG_PATH environment variable\n\
        - current directory: reka.kdl, .reka.kdl\n\
        - ~/.config/reka/reka.kdl\n\
        Pass --config to point at a file directly"
    )]
    ConfigFileNotFound,

    #[error("KDL parse error: {0}")]
    KdlParse(#[from] kdl::KdlError),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
