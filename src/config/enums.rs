//! Closed symbol sets used by the configuration schema.
//!
//! Every enum parses case-insensitively and displays as its lower-case symbol,
//! which is also the form accepted in the environment.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! symbol_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $($variant:ident => $symbol:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Accepted symbols, in declaration order.
            pub const VARIANTS: &'static [&'static str] = &[$($symbol),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $symbol),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($symbol => Ok($name::$variant),)+
                    other => Err(format!(
                        "unknown {} '{}', expected one of: {}",
                        stringify!($name),
                        other,
                        Self::VARIANTS.join(", ")
                    )),
                }
            }
        }
    };
}

symbol_enum! {
    pub enum LogLevel {
        Debug => "debug",
        Info => "info",
        Warning => "warning",
        Error => "error",
        Critical => "critical",
    }
}

symbol_enum! {
    pub enum Environment {
        Development => "development",
        Staging => "staging",
        Production => "production",
        Testing => "testing",
    }
}

symbol_enum! {
    pub enum StorageProvider {
        Minio => "minio",
        S3 => "s3",
        Local => "local",
    }
}

symbol_enum! {
    /// Compute device requested for model inference.
    pub enum DeviceType {
        Auto => "auto",
        Cpu => "cpu",
        Cuda => "cuda",
        Mps => "mps",
    }
}

symbol_enum! {
    pub enum ModelSize {
        Small => "small",
        Medium => "medium",
        Large => "large",
    }
}

impl LogLevel {
    /// `log` has no level above error, so critical collapses into it.
    pub fn as_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warning => log::LevelFilter::Warn,
            LogLevel::Error | LogLevel::Critical => log::LevelFilter::Error,
        }
    }
}

impl DeviceType {
    /// Devices whose availability has to be checked against the CUDA runtime.
    pub fn wants_accelerator(&self) -> bool {
        matches!(self, DeviceType::Auto | DeviceType::Cuda)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("PRODUCTION".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!(" S3 ".parse::<StorageProvider>().unwrap(), StorageProvider::S3);
        assert_eq!("Cuda".parse::<DeviceType>().unwrap(), DeviceType::Cuda);
    }

    #[test]
    fn test_parse_unknown_symbol_lists_choices() {
        let err = "gpu".parse::<DeviceType>().unwrap_err();
        assert!(err.contains("'gpu'"));
        assert!(err.contains("auto, cpu, cuda, mps"));
    }

    #[test]
    fn test_display_round_trips_symbol() {
        for symbol in ModelSize::VARIANTS {
            let size: ModelSize = symbol.parse().unwrap();
            assert_eq!(size.to_string(), *symbol);
        }
    }

    #[test]
    fn test_log_level_filter() {
        assert_eq!(LogLevel::Warning.as_level_filter(), log::LevelFilter::Warn);
        assert_eq!(LogLevel::Critical.as_level_filter(), log::LevelFilter::Error);
    }

    #[test]
    fn test_wants_accelerator() {
        assert!(DeviceType::Auto.wants_accelerator());
        assert!(DeviceType::Cuda.wants_accelerator());
        assert!(!DeviceType::Cpu.wants_accelerator());
        assert!(!DeviceType::Mps.wants_accelerator());
    }
}
