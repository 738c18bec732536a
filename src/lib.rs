pub mod ipa;
pub mod logger;
