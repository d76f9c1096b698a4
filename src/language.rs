use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Source language of the repository being built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
pub enum Language {
    #[default]
    #[value(name = "C", alias = "c")]
    #[serde(rename = "C", alias = "c")]
    C,
    #[value(name = "CXX", alias = "cxx")]
    #[serde(rename = "CXX", alias = "cxx")]
    Cxx,
}

impl Language {
    /// Environment variable CMake reads the compiler from.
    pub fn compiler_env_var(self) -> &'static str {
        match self {
            Self::C => "CC",
            Self::Cxx => "CXX",
        }
    }

    /// Name CMake uses for the language in `enable_language` and `LINKER_LANGUAGE`.
    pub fn cmake_name(self) -> &'static str {
        match self {
            Self::C => "C",
            Self::Cxx => "CXX",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cmake_name())
    }
}
