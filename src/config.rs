use std::{env, fmt, net::IpAddr, path::PathBuf, str::FromStr, time::Duration};

use comms::{CommandMatch, Limits, SnapshotEncoding};
use model::Capability;

use crate::ServerErr;

const DEFAULT_HOST: &str = "127.0.0.1";

/// An inclusive range of TCP ports to scan when binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    pub const DEFAULT_START: u16 = 5482;
    pub const DEFAULT_END: u16 = 5582;

    /// Creates a new `PortRange`.
    ///
    /// # Errors
    /// Returns `ServerErr::Config` if `start` is greater than `end`.
    pub fn new(start: u16, end: u16) -> Result<Self, ServerErr> {
        if start > end {
            return Err(ServerErr::Config(format!(
                "empty port range {start}-{end}"
            )));
        }

        Ok(Self { start, end })
    }

    /// A range of exactly one port. Port `0` lets the OS pick any free port.
    pub fn single(port: u16) -> Self {
        Self {
            start: port,
            end: port,
        }
    }

    pub fn contains(&self, port: u16) -> bool {
        (self.start..=self.end).contains(&port)
    }
}

impl Default for PortRange {
    fn default() -> Self {
        Self {
            start: Self::DEFAULT_START,
            end: Self::DEFAULT_END,
        }
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

impl FromStr for PortRange {
    type Err = ServerErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |port: &str| {
            port.trim()
                .parse::<u16>()
                .map_err(|e| ServerErr::Config(format!("invalid port {port:?}: {e}")))
        };

        match s.split_once('-') {
            Some((start, end)) => Self::new(parse(start)?, parse(end)?),
            None => parse(s).map(Self::single),
        }
    }
}

/// Where the startup snapshot is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotSource {
    Stdin,
    Path(PathBuf),
}

/// Everything the server needs to start, gathered from the command line and
/// the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub ports: PortRange,
    pub snapshot: SnapshotSource,
    /// The capability the operator asked for, `None` accepts any model.
    pub expect: Option<Capability>,
    /// Layout of the snapshots returned by `train`.
    pub encoding: SnapshotEncoding,
    pub command_match: CommandMatch,
    pub limits: Limits,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            ports: PortRange::default(),
            snapshot: SnapshotSource::Stdin,
            expect: None,
            encoding: SnapshotEncoding::Raw,
            command_match: CommandMatch::default(),
            limits: Limits::default(),
        }
    }
}

impl ServerConfig {
    /// Builds the config from the process arguments and the `HOST` variable.
    ///
    /// # Errors
    /// Returns `ServerErr::Config` on any invalid argument or host.
    pub fn from_env() -> Result<Self, ServerErr> {
        let mut config = Self::from_args(env::args().skip(1))?;
        let host = env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        config.host = host
            .parse()
            .map_err(|e| ServerErr::Config(format!("invalid HOST {host:?}: {e}")))?;

        Ok(config)
    }

    /// Parses the command line, without the program name.
    ///
    /// Flags are case insensitive and accept either one or two leading dashes.
    /// The only positional argument is the snapshot path, a lone `-` or no
    /// path at all reads the snapshot from stdin.
    ///
    /// # Errors
    /// Returns `ServerErr::Config` on unknown flags, missing or invalid flag
    /// values, conflicting flags or more than one snapshot path.
    pub fn from_args<I>(args: I) -> Result<Self, ServerErr>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let mut config = Self::default();
        let mut snapshot = None;
        let mut args = args.into_iter().map(Into::into).peekable();

        while let Some(arg) = args.next() {
            let Some(flag) = flag_name(&arg) else {
                if snapshot.replace(arg.clone()).is_some() {
                    return Err(ServerErr::Config(format!(
                        "unexpected argument {arg:?}, only one snapshot path is allowed"
                    )));
                }
                continue;
            };

            match flag.as_str() {
                "classifier" => config.set_expectation(Capability::Probabilistic)?,
                "regressor" => config.set_expectation(Capability::Predictor)?,
                "compress" => {
                    let level = match args.peek().map(|next| next.parse::<u32>()) {
                        Some(Ok(level)) => {
                            args.next();
                            level
                        }
                        _ => SnapshotEncoding::DEFAULT_LEVEL,
                    };

                    if level > SnapshotEncoding::MAX_LEVEL {
                        return Err(ServerErr::Config(format!(
                            "compression level {level} is out of range 0-{}",
                            SnapshotEncoding::MAX_LEVEL
                        )));
                    }

                    config.encoding = SnapshotEncoding::Compressed(level);
                }
                "ports" => config.ports = value_of(&flag, args.next())?.parse()?,
                "exact" => config.command_match = CommandMatch::Exact,
                "timeout" => {
                    let secs: f64 = parse_value(&flag, args.next())?;
                    if !secs.is_finite() || secs <= 0.0 {
                        return Err(ServerErr::Config(format!(
                            "timeout must be a positive number of seconds, got {secs}"
                        )));
                    }
                    config.limits.idle = Some(Duration::from_secs_f64(secs));
                }
                "max-line" => {
                    let max_line: usize = parse_value(&flag, args.next())?;
                    if max_line == 0 {
                        return Err(ServerErr::Config("max-line must be positive".to_string()));
                    }
                    config.limits.max_line = max_line;
                }
                _ => return Err(ServerErr::Config(format!("unknown flag {arg:?}"))),
            }
        }

        config.snapshot = match snapshot.as_deref() {
            None | Some("-") => SnapshotSource::Stdin,
            Some(path) => SnapshotSource::Path(PathBuf::from(path)),
        };

        Ok(config)
    }

    fn set_expectation(&mut self, capability: Capability) -> Result<(), ServerErr> {
        match self.expect.replace(capability) {
            Some(previous) if previous != capability => Err(ServerErr::Config(
                "-classifier and -regressor are mutually exclusive".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Returns the lowercase flag name of `arg` if it's a flag.
fn flag_name(arg: &str) -> Option<String> {
    let name = arg.strip_prefix("--").or_else(|| arg.strip_prefix('-'))?;
    (!name.is_empty()).then(|| name.to_ascii_lowercase())
}

fn value_of(flag: &str, value: Option<String>) -> Result<String, ServerErr> {
    value.ok_or_else(|| ServerErr::Config(format!("missing value for -{flag}")))
}

fn parse_value<T>(flag: &str, value: Option<String>) -> Result<T, ServerErr>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let value = value_of(flag, value)?;
    value
        .parse()
        .map_err(|e| ServerErr::Config(format!("invalid value {value:?} for -{flag}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<ServerConfig, ServerErr> {
        ServerConfig::from_args(args.iter().copied())
    }

    #[test]
    fn defaults_read_stdin_and_scan_the_standard_range() {
        let config = parse(&[]).unwrap();

        assert_eq!(config.snapshot, SnapshotSource::Stdin);
        assert_eq!(config.ports, PortRange::new(5482, 5582).unwrap());
        assert_eq!(config.expect, None);
        assert_eq!(config.encoding, SnapshotEncoding::Raw);
        assert_eq!(config.command_match, CommandMatch::Substring);
        assert_eq!(config.limits, Limits::default());
    }

    #[test]
    fn flags_are_case_insensitive() {
        let config = parse(&["-Classifier", "--EXACT", "model.json"]).unwrap();

        assert_eq!(config.expect, Some(Capability::Probabilistic));
        assert_eq!(config.command_match, CommandMatch::Exact);
        assert_eq!(
            config.snapshot,
            SnapshotSource::Path(PathBuf::from("model.json"))
        );
    }

    #[test]
    fn compress_takes_an_optional_level() {
        let config = parse(&["-compress", "model.json"]).unwrap();
        assert_eq!(config.encoding, SnapshotEncoding::Compressed(5));
        assert_eq!(
            config.snapshot,
            SnapshotSource::Path(PathBuf::from("model.json"))
        );

        let config = parse(&["-compress", "9"]).unwrap();
        assert_eq!(config.encoding, SnapshotEncoding::Compressed(9));
        assert_eq!(config.snapshot, SnapshotSource::Stdin);

        assert!(matches!(
            parse(&["-compress", "10"]),
            Err(ServerErr::Config(_))
        ));
    }

    #[test]
    fn classifier_and_regressor_conflict() {
        assert!(matches!(
            parse(&["-classifier", "-regressor"]),
            Err(ServerErr::Config(_))
        ));
        assert!(parse(&["-regressor", "-regressor"]).is_ok());
    }

    #[test]
    fn port_ranges_parse() {
        assert_eq!(
            "6000-6010".parse::<PortRange>().unwrap(),
            PortRange::new(6000, 6010).unwrap()
        );
        assert_eq!("0".parse::<PortRange>().unwrap(), PortRange::single(0));
        assert!("6010-6000".parse::<PortRange>().is_err());
        assert!("http".parse::<PortRange>().is_err());

        let config = parse(&["-ports", "7000-7001"]).unwrap();
        assert!(config.ports.contains(7001));
        assert!(!config.ports.contains(7002));
    }

    #[test]
    fn limits_are_configurable() {
        let config = parse(&["-timeout", "2.5", "-max-line", "128"]).unwrap();

        assert_eq!(config.limits.idle, Some(Duration::from_millis(2500)));
        assert_eq!(config.limits.max_line, 128);

        assert!(parse(&["-timeout", "0"]).is_err());
        assert!(parse(&["-timeout"]).is_err());
        assert!(parse(&["-max-line", "0"]).is_err());
    }

    #[test]
    fn unknown_flags_and_extra_paths_are_rejected() {
        assert!(matches!(parse(&["-verbose"]), Err(ServerErr::Config(_))));
        assert!(matches!(parse(&["a.json", "b.json"]), Err(ServerErr::Config(_))));
        assert_eq!(parse(&["-"]).unwrap().snapshot, SnapshotSource::Stdin);
    }
}
