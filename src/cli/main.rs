//-
// Copyright (c) 2026, The mailutils-rs authors
//
// This file is part of mailutils-rs.
//
// mailutils-rs is free software: you can redistribute it and/or modify it
// under the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// mailutils-rs is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for
// more details.
//
// You should have received a copy of the GNU General Public License along with
// mailutils-rs. If not, see <http://www.gnu.org/licenses/>.

use std::ffi::OsString;
use std::path::PathBuf;

use log::{debug, LevelFilter};
use structopt::StructOpt;

use mailutils::native;
use mailutils::stream::{STDIN_FD, STDOUT_FD};
use mailutils::support::error::{Error, Result};
use mailutils::support::sysexits::*;
use mailutils::{Config, FallbackMode, FilterStream, Stream, StreamFlags};

const USAGE: &str = "usage: mu-iconv [--config FILE] [--fallback MODE] \
                     <from-code> <to-code>";

/// Convert standard input from one character set to another, writing the
/// result to standard output.
#[derive(StructOpt)]
#[structopt(name = "mu-iconv", max_term_width = 80)]
struct Command {
    /// Read the configuration from this TOML file instead of using the
    /// built-in defaults.
    #[structopt(long, parse(from_os_str))]
    config: Option<PathBuf>,

    /// What to do with input that cannot be converted: `none`, `copy-pass`
    /// or `copy-octal`. Overrides the configuration.
    #[structopt(long)]
    fallback: Option<FallbackMode>,

    /// The character set of standard input.
    from_code: String,

    /// The character set to write to standard output.
    to_code: String,
}

/// What the command line asks for.
enum Invocation {
    Convert(Command),
    /// Print the text on standard output and exit with the status.
    Print(String, Sysexit),
    /// Print the text on standard error and exit with the status.
    Fail(String, Sysexit),
}

fn parse_args<I>(args: I) -> Invocation
where
    I: IntoIterator,
    I::Item: Into<OsString> + Clone,
{
    // Clap exits with status 1 instead of EX_USAGE if we use the more concise
    // API
    match Command::clap().get_matches_from_safe(args) {
        Ok(matches) => Invocation::Convert(Command::from_clap(&matches)),
        Err(
            e @ clap::Error {
                kind: clap::ErrorKind::HelpDisplayed,
                ..
            },
        )
        | Err(
            e @ clap::Error {
                kind: clap::ErrorKind::VersionDisplayed,
                ..
            },
        ) => Invocation::Print(e.message, EX_OK),
        // A wrong argument count is not an error, just a request for the
        // usage line
        Err(clap::Error {
            kind: clap::ErrorKind::MissingRequiredArgument,
            ..
        })
        | Err(clap::Error {
            kind: clap::ErrorKind::UnknownArgument,
            ..
        }) => Invocation::Print(USAGE.to_owned(), EX_OK),
        Err(e) => Invocation::Fail(e.message, EX_USAGE),
    }
}

pub fn main() {
    let cmd = match parse_args(std::env::args_os()) {
        Invocation::Convert(cmd) => cmd,
        Invocation::Print(text, status) => {
            println!("{}", text);
            status.exit()
        },
        Invocation::Fail(text, status) => {
            eprintln!("{}", text);
            status.exit()
        },
    };

    let config = match cmd.config {
        None => Config::default(),
        Some(ref path) if !path.is_file() => {
            eprintln!("Config file '{}' not found", path.display());
            EX_NOINPUT.exit()
        },
        Some(ref path) => match Config::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error in config file '{}': {}", path.display(), e);
                Sysexit::for_error(&e).exit()
            },
        },
    };

    init_log(&config);

    if let Err(e) = run_stdio(&cmd, &config) {
        eprintln!("mu-iconv: {}", e);
        Sysexit::for_error(&e).exit()
    }
}

fn run_stdio(cmd: &Command, config: &Config) -> Result<()> {
    let engine = native::connect(config)?;
    let input = Stream::stdio(&engine, STDIN_FD, StreamFlags::READ)?;
    let mut output = Stream::stdio(&engine, STDOUT_FD, StreamFlags::WRITE)?;
    let fallback = cmd.fallback.unwrap_or(config.iconv.fallback);
    convert(&cmd.from_code, &cmd.to_code, fallback, &input, &mut output)
}

/// Copies everything readable from `input` to `output`, converting it from
/// `from` to `to` on the way.
fn convert(
    from: &str,
    to: &str,
    fallback: FallbackMode,
    input: &Stream,
    output: &mut Stream,
) -> Result<()> {
    let mut filter =
        FilterStream::iconv(input, from, to, fallback, StreamFlags::READ)?;

    let mut total = 0;
    loop {
        let chunk = filter.read()?;
        if chunk.is_empty() {
            break;
        }
        total += chunk.len();
        write_all(output, &chunk)?;
    }
    output.flush()?;

    debug!("Wrote {} bytes of {} converted from {}", total, to, from);
    Ok(())
}

fn write_all(output: &mut Stream, mut data: &[u8]) -> Result<()> {
    while !data.is_empty() {
        let n = output.write(data)?;
        if 0 == n {
            return Err(Error::Io(std::io::ErrorKind::WriteZero.into()));
        }
        data = &data[n..];
    }
    Ok(())
}

fn init_log(config: &Config) {
    if Ok(true) == nix::unistd::isatty(2) {
        // Running interactively; ignore logging configuration and just write
        // to stderr.
        init_simple_log(LevelFilter::Info);
    } else if let Some(ref path) = config.logging.config_file {
        if let Err(e) =
            log4rs::init_file(path, log4rs::file::Deserializers::new())
        {
            eprintln!(
                "Failed to initialise logging from '{}': {}",
                path.display(),
                e
            );
            EX_CONFIG.exit();
        }
    } else {
        init_simple_log(LevelFilter::Warn);
    }
}

fn init_simple_log(level: LevelFilter) {
    use log4rs::append::console::{ConsoleAppender, Target};
    use log4rs::config::{Appender, Config, Root};
    use log4rs::encode::pattern::PatternEncoder;

    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new("{l} [{t}] {m}{n}")))
        .build();
    let config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(Root::builder().appender("stderr").build(level));

    match config {
        Ok(config) => {
            let _ = log4rs::init_config(config);
        }
        Err(e) => eprintln!("Failed to initialise logging: {}", e),
    }
}
