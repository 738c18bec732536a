use thiserror::Error;

#[derive(Error, Debug)]
pub enum IpaError {
    #[error("Pool {0} is already initialised")]
    PoolAlreadyInitialised(String),

    #[error("Pool {0} is not initialised")]
    PoolNotInitialised(String),

    #[error("Pool {pool} is exhausted")]
    PoolExhausted { pool: String },

    #[error("Invalid statistics buffer: {0}")]
    InvalidStatistics(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("IPA used before configure()")]
    NotConfigured,
}

pub type Result<T> = std::result::Result<T, IpaError>;
