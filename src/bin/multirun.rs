// Copyright 2019 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use tokio::runtime;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use multirun::config::Options;
use multirun::procs::{interrupted, launcher};
use multirun::sink::Sinks;
use multirun::ErrorKind;

/// Environment variable holding the diagnostics filter
const LOG_ENV: &str = "MULTIRUN_LOG";

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let options = match Options::from_args(std::env::args_os()) {
        Ok(options) => options,
        Err(err) => match err.kind() {
            ErrorKind::Usage(usage) => usage.exit(),
            _ => {
                eprintln!("Error: {}", err);
                std::process::exit(2);
            }
        },
    };

    init_tracing();

    let runtime = runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to initialize Tokio Runtime");

    let result = runtime.block_on(async move {
        // before any child exists, so no signal can slip past the coordinator
        let interrupt = interrupted()?;
        let sinks = Sinks::stdio();
        launcher::run(&options, &sinks, interrupt).await
    });

    // children that outlive their output are left running, as is the runtime
    let code = match result {
        Ok(summary) => {
            debug!("{:?}", summary);
            0
        }
        Err(err) => {
            eprintln!("Error: {}", err);
            1
        }
    };

    std::process::exit(code);
}
