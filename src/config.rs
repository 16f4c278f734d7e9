// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Command line options

use std::ffi::OsString;

use clap::{App, AppSettings, Arg, ArgMatches};

use crate::Error;

pub const COUNT: &str = "count";
pub const NO_COLOR: &str = "no-color";
pub const PREFIX: &str = "prefix";
pub const COMMAND: &str = "command";

pub const DEFAULT_COUNT: i64 = 2;

const EXAMPLES: &str = "EXAMPLES:
    multirun -n 3 ping google.com
    multirun -n 5 --prefix '[Worker {id}]' ./worker.sh";

/// Everything a run needs to know, the same command and arguments are used for every instance
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Options {
    /// Validated to be at least 1 when the run starts
    pub count: i64,
    pub color: bool,
    pub prefix: Option<String>,
    pub command: OsString,
    pub args: Vec<OsString>,
}

impl Options {
    pub fn new<C: Into<OsString>>(count: i64, command: C) -> Self {
        Self {
            count,
            color: true,
            prefix: None,
            command: command.into(),
            args: Vec::new(),
        }
    }

    pub fn app() -> App<'static, 'static> {
        App::new(env!("CARGO_PKG_NAME"))
            .version(env!("CARGO_PKG_VERSION"))
            .author(env!("CARGO_PKG_AUTHORS"))
            .about(env!("CARGO_PKG_DESCRIPTION"))
            .setting(AppSettings::TrailingVarArg)
            .arg(
                Arg::with_name(COUNT)
                    .short("n")
                    .long(COUNT)
                    .value_name("NUMBER")
                    .takes_value(true)
                    .allow_hyphen_values(true)
                    .default_value("2")
                    .validator(|i| {
                        i.parse::<i64>()
                            .map(|_| ())
                            .map_err(|_| String::from("number was expected"))
                    })
                    .help("Number of instances to run"),
            )
            .arg(
                Arg::with_name(NO_COLOR)
                    .long(NO_COLOR)
                    .help("Disable colored output"),
            )
            .arg(
                Arg::with_name(PREFIX)
                    .long(PREFIX)
                    .value_name("FORMAT")
                    .takes_value(true)
                    .help("Custom prefix format (use {id} for instance number)"),
            )
            .arg(
                Arg::with_name(COMMAND)
                    .value_name("COMMAND")
                    .required(true)
                    .multiple(true)
                    .help("The command to run, followed by its arguments"),
            )
            .after_help(EXAMPLES)
    }

    /// Parses the full argument list, including the binary name
    pub fn from_args<I, T>(args: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = Self::app().get_matches_from_safe(args)?;
        Self::from_matches(&matches)
    }

    pub fn from_matches(matches: &ArgMatches<'_>) -> Result<Self, Error> {
        let count = match matches.value_of(COUNT) {
            Some(count) => count
                .parse::<i64>()
                .map_err(|_| Error::from(format!("count is not a number: {}", count)))?,
            None => DEFAULT_COUNT,
        };

        let mut command = matches
            .values_of_os(COMMAND)
            .ok_or_else(|| Error::from("no command specified"))?
            .map(OsString::from);
        let program = command
            .next()
            .ok_or_else(|| Error::from("no command specified"))?;

        Ok(Self {
            count,
            color: !matches.is_present(NO_COLOR),
            prefix: matches
                .value_of(PREFIX)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
            command: program,
            args: command.collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::ErrorKind;

    fn parse(args: &[&str]) -> Result<Options, Error> {
        Options::from_args(std::iter::once("multirun").chain(args.iter().copied()))
    }

    #[test]
    fn test_defaults() {
        let options = parse(&["echo", "hi"]).expect("parse failed");

        let mut expected = Options::new(2, "echo");
        expected.args = vec![OsString::from("hi")];
        assert_eq!(options, expected);
    }

    #[test]
    fn test_all_options() {
        let options = parse(&["-n", "12", "--no-color", "--prefix", "w{id}:", "ping", "host"])
            .expect("parse failed");

        assert_eq!(options.count, 12);
        assert!(!options.color);
        assert_eq!(options.prefix.as_deref(), Some("w{id}:"));
        assert_eq!(options.command, OsString::from("ping"));
        assert_eq!(options.args, vec![OsString::from("host")]);
    }

    #[test]
    fn test_long_count() {
        let options = parse(&["--count", "5", "true"]).expect("parse failed");
        assert_eq!(options.count, 5);
    }

    #[test]
    fn test_command_flags_are_not_ours() {
        let options = parse(&["-n", "3", "ping", "-c", "1", "--no-color"]).expect("parse failed");

        assert!(options.color);
        assert_eq!(
            options.args,
            vec![
                OsString::from("-c"),
                OsString::from("1"),
                OsString::from("--no-color")
            ]
        );
    }

    #[test]
    fn test_non_positive_count_is_parsed() {
        // rejected when the run starts, not here
        assert_eq!(parse(&["-n", "0", "true"]).expect("parse failed").count, 0);
        assert_eq!(parse(&["-n", "-1", "true"]).expect("parse failed").count, -1);
    }

    #[test]
    fn test_usage_errors() {
        let err = parse(&[]).expect_err("command is required");
        assert!(matches!(err.kind(), ErrorKind::Usage(_)));

        let err = parse(&["-n", "many", "true"]).expect_err("count must be a number");
        assert!(matches!(err.kind(), ErrorKind::Usage(_)));
    }

    #[test]
    fn test_empty_prefix_is_default() {
        let options = parse(&["--prefix", "", "true"]).expect("parse failed");
        assert_eq!(options.prefix, None);
    }
}
