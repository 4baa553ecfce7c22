//! Command-line arguments for the server.
//!
//! Only `-m`, `-p` and `-c` carry meaning. Anything else on the command line
//! is dropped before clap sees it, so unknown flags never stop the server
//! from starting.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::Parser;

/// Flags that consume the following argument as their value.
const VALUE_FLAGS: &[&str] = &["-m", "--model", "-p", "--port", "-c", "--config"];

/// Long flags that may also be written as `--flag=value`.
const INLINE_VALUE_FLAGS: &[&str] = &["--model", "--port", "--config"];

/// Flags clap handles itself.
const STANDALONE_FLAGS: &[&str] = &["-h", "--help", "-V", "--version"];

#[derive(Debug, Clone, Default, PartialEq, Parser)]
#[command(name = "pink-whisper")]
#[command(about = "Transcribe 16kHz PCM sent over TCP with whisper.cpp")]
#[command(version, args_override_self = true)]
#[command(after_help = "Log filtering can be overridden with the PINK_WHISPER_LOG environment variable.")]
pub struct Args {
    /// Path to the Whisper GGML model file
    #[arg(short = 'm', long = "model", value_name = "PATH", allow_hyphen_values = true)]
    pub model: Option<PathBuf>,

    /// Port to listen on (all interfaces)
    #[arg(short = 'p', long = "port", value_name = "PORT", allow_hyphen_values = true)]
    pub port: Option<u16>,

    /// Optional TOML configuration file
    ///
    /// A missing file is ignored. A file that exists but is not valid TOML
    /// stops the server at startup. `-m` and `-p` override values in it.
    #[arg(short = 'c', long = "config", value_name = "PATH", allow_hyphen_values = true)]
    pub config: Option<PathBuf>,
}

impl Args {
    /// Parse arguments, ignoring unrecognized flags. Exits on `--help`,
    /// `--version` or a malformed value for a known flag.
    pub fn parse_lenient<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        Self::try_parse_lenient(args).unwrap_or_else(|e| {
            let _ = e.print();
            std::process::exit(exit_code(&e))
        })
    }

    /// Like [`Args::parse_lenient`] but returns clap's error instead of exiting.
    pub fn try_parse_lenient<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        Self::try_parse_from(retain_known_args(args))
    }
}

/// Process exit status for a parse error: 0 for `--help` and `--version`,
/// 1 for anything that stops the server from starting.
pub fn exit_code(error: &clap::Error) -> i32 {
    if error.use_stderr() { 1 } else { 0 }
}

/// Keep the program name and known flags (with their values), drop the rest.
///
/// A value flag at the end of the line with nothing after it is dropped too.
pub fn retain_known_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut args = args.into_iter().map(Into::into);
    let mut kept: Vec<OsString> = args.next().into_iter().collect();

    while let Some(arg) = args.next() {
        let Some(flag) = arg.to_str() else {
            continue;
        };

        if VALUE_FLAGS.contains(&flag) {
            if let Some(value) = args.next() {
                kept.push(arg);
                kept.push(value);
            }
        } else if STANDALONE_FLAGS.contains(&flag) || is_inline_value(flag) {
            kept.push(arg);
        }
    }

    kept
}

fn is_inline_value(arg: &str) -> bool {
    arg.split_once('=')
        .is_some_and(|(name, _)| INLINE_VALUE_FLAGS.contains(&name))
}

#[cfg(test)]
#[path = "args_test.rs"]
mod tests;
