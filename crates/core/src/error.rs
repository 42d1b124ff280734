use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildwatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),
}

impl From<toml::de::Error> for BuildwatchError {
    fn from(e: toml::de::Error) -> Self {
        BuildwatchError::Config(e.to_string())
    }
}
