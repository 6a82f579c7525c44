// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Stand-alone Mirage service.
//!
//! Configuration comes from `MIRAGE_CONFIG_PATH` (a JSON, TOML or YAML file)
//! or `MIRAGE_CONFIG_STRING` (an inline JSON document).  With neither set,
//! `config.json` in the working directory is used.  `MIRAGE_*` variables
//! override individual keys, e.g. `MIRAGE_PORT=9000`.

use std::env;
use std::error::Error;

use mirage::config::{CONFIG_PATH_ENV, CONFIG_STRING_ENV};
use mirage::{Mirage, error_fmt, info_fmt};

const DEFAULT_CONFIG_PATH: &str = "config.json";

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let mut loader = Mirage::loader().with_env_vars();

    match (non_empty_var(CONFIG_PATH_ENV), non_empty_var(CONFIG_STRING_ENV)) {
        (Some(path), _) => {
            println!("Using configuration from {path}");
            loader = loader.with_config_file(&path);
        }
        (None, Some(content)) => {
            println!("Using configuration from {CONFIG_STRING_ENV}");
            loader = loader.with_config_string(&content);
        }
        (None, None) => {
            println!("No {CONFIG_PATH_ENV} or {CONFIG_STRING_ENV} set, using {DEFAULT_CONFIG_PATH}");
            loader = loader.with_config_file(DEFAULT_CONFIG_PATH);
        }
    }

    let service = match loader.build().await {
        Ok(service) => service,
        Err(e) => {
            eprintln!("Failed to start Mirage: {e}");
            return Err(e.into());
        }
    };

    match service.start().await {
        Ok(()) => {
            info_fmt!("Mirage", "Server stopped gracefully");
            Ok(())
        }
        Err(e) => {
            error_fmt!("Mirage", "Server failed: {}", e);
            Err(e.into())
        }
    }
}
