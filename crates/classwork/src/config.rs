//! # Configuration
//!
//! Encoding defaults are managed by [`confique`], which handles layered
//! loading from environment variables, a TOML file and compiled defaults.
//!
//! ## Resolution Order
//!
//! 1. **Environment variables**: `CLASSWORK_INDENT`, `CLASSWORK_SORT_KEYS`,
//!    `CLASSWORK_INCLUDE_DEFAULTS`, `CLASSWORK_INCLUDE_HIDDEN`.
//! 2. **TOML file**: whatever path the host application passes to [`CodecConfig::load`].
//! 3. **Compiled defaults**: compact output in declaration order, public
//!    instance values only.
//!
//! ## Available Settings
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | `indent` | none | Spaces per pretty-print level; absent means compact |
//! | `sort_keys` | `false` | Emit object keys lexically sorted |
//! | `include_defaults` | `false` | Layer declared defaults into payloads |
//! | `include_hidden` | `false` | Include hidden attributes in payloads |

use std::path::Path;

use confique::Config;
use serde::{Deserialize, Serialize};

use crate::codec::EncodeOptions;
use crate::error::Result;
use crate::record::Record;

/// Encoding configuration, optionally stored in a TOML file.
#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CodecConfig {
    /// Spaces per indentation level. When absent, output is compact.
    #[config(env = "CLASSWORK_INDENT")]
    pub indent: Option<usize>,

    /// Sort object keys instead of keeping declaration order.
    #[config(env = "CLASSWORK_SORT_KEYS", default = false)]
    pub sort_keys: bool,

    /// Layer declared defaults under instance values when encoding.
    #[config(env = "CLASSWORK_INCLUDE_DEFAULTS", default = false)]
    pub include_defaults: bool,

    /// Include hidden attributes when encoding.
    #[config(env = "CLASSWORK_INCLUDE_HIDDEN", default = false)]
    pub include_hidden: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            indent: None,
            sort_keys: false,
            include_defaults: false,
            include_hidden: false,
        }
    }
}

impl CodecConfig {
    /// Load from the environment, then `path` if given, then defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Self::builder().env();
        if let Some(path) = path {
            builder = builder.file(path);
        }
        Ok(builder.load()?)
    }

    pub fn encode_options(&self) -> EncodeOptions {
        EncodeOptions {
            indent: self.indent,
            sort_keys: self.sort_keys,
        }
    }
}

impl Record {
    /// Encode using every setting in `config`.
    pub fn to_json_with(&self, config: &CodecConfig) -> Result<String> {
        self.to_json_str(
            config.include_defaults,
            config.include_hidden,
            &config.encode_options(),
        )
    }
}
