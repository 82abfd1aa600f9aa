//! Short-option command line in the `getopt("hev:t:n:c:")` style.
//!
//! Flags may be clustered (`-ev2`), option values may be attached (`-n5`) or
//! separate (`-n 5`). Unknown options, missing values and positional arguments
//! are ignored.

use crate::config::Config;

pub const USAGE: &str = "testServer [OPTIONS]
-h:      show help
-n N:    number of opcua items for ManyObjects (1000)
-t N:    Update time (2000ms)
-v N:    verbosity, >1 enables address space debug tracing
-e:      create testServer.db file for ManyObjects
-c FILE: YAML configuration file
Test variables:
  NewObject.MyStringVar
  NewObject.MyVariable
  NewObject.MyProperty
  NewObject.MyArrayVar
  NewObject.MyBool
  ManyObjects.var1 ... ManyObjects.varN
";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliArgs {
    pub help: bool,
    pub export: bool,
    pub object_count: Option<usize>,
    pub tick_interval_ms: Option<u64>,
    pub verbosity: u32,
    pub config_path: Option<String>,
}

impl CliArgs {
    /// Overlay the command line on a loaded configuration.
    pub fn apply(&self, cfg: &mut Config) {
        if let Some(n) = self.object_count {
            cfg.simulation.object_count = n;
        }
        if let Some(ms) = self.tick_interval_ms {
            cfg.simulation.tick_interval_ms = ms;
        }
        if self.export {
            cfg.export.enabled = true;
        }
    }

    pub fn log_filter(&self) -> &'static str {
        if self.verbosity > 1 {
            "debug"
        } else {
            "info"
        }
    }
}

pub fn parse_args<I>(args: I) -> CliArgs
where
    I: IntoIterator<Item = String>,
{
    let mut out = CliArgs::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        if arg == "--" {
            break;
        }
        let Some(cluster) = arg.strip_prefix('-') else { continue };
        if cluster.is_empty() || cluster.starts_with('-') {
            continue;
        }

        for (pos, opt) in cluster.char_indices() {
            match opt {
                'h' => out.help = true,
                'e' => out.export = true,
                'n' | 't' | 'v' | 'c' => {
                    let attached = &cluster[pos + opt.len_utf8()..];
                    let value = if attached.is_empty() { args.next() } else { Some(attached.to_string()) };
                    if let Some(value) = value {
                        match opt {
                            'n' => out.object_count = Some(atoi(&value).max(0) as usize),
                            't' => out.tick_interval_ms = Some(atoi(&value).max(0) as u64),
                            'v' => out.verbosity = atoi(&value).max(0) as u32,
                            _ => out.config_path = Some(value),
                        }
                    }
                    break;
                }
                _ => {}
            }
        }
    }
    out
}

/// Leading-integer parse: optional sign, then digits; anything else reads as 0.
fn atoi(s: &str) -> i64 {
    let s = s.trim_start();
    let (sign, digits) = match s.as_bytes().first() {
        Some(b'-') => (-1, &s[1..]),
        Some(b'+') => (1, &s[1..]),
        _ => (1, s),
    };
    let end = digits.find(|c: char| !c.is_ascii_digit()).unwrap_or(digits.len());
    digits[..end].parse::<i64>().map(|v| sign * v).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        parse_args(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn defaults_when_empty() {
        let args = parse(&[]);
        assert_eq!(args, CliArgs::default());
        let mut cfg = Config::default();
        args.apply(&mut cfg);
        assert_eq!(cfg.simulation.object_count, 1000);
        assert_eq!(cfg.simulation.tick_interval_ms, 2000);
        assert!(!cfg.export.enabled);
    }

    #[test]
    fn separate_and_attached_values() {
        let args = parse(&["-n", "5", "-t250", "-v", "2", "-e"]);
        assert_eq!(args.object_count, Some(5));
        assert_eq!(args.tick_interval_ms, Some(250));
        assert_eq!(args.verbosity, 2);
        assert!(args.export);
        assert_eq!(args.log_filter(), "debug");
    }

    #[test]
    fn clustered_flags() {
        let args = parse(&["-ehn", "3"]);
        assert!(args.export && args.help);
        assert_eq!(args.object_count, Some(3));
    }

    #[test]
    fn unknown_options_are_ignored() {
        let args = parse(&["-x", "--long", "positional", "-n", "7", "-q"]);
        assert_eq!(args.object_count, Some(7));
        assert!(!args.help);
    }

    #[test]
    fn numbers_parse_like_atoi() {
        assert_eq!(parse(&["-n", "12abc"]).object_count, Some(12));
        assert_eq!(parse(&["-n", "abc"]).object_count, Some(0));
        assert_eq!(parse(&["-t", "-5"]).tick_interval_ms, Some(0));
        assert_eq!(parse(&["-v"]).verbosity, 0);
    }

    #[test]
    fn cli_overrides_config() {
        let mut cfg = Config::default();
        cfg.simulation.object_count = 10;
        parse(&["-n", "0", "-c", "x.yaml"]).apply(&mut cfg);
        assert_eq!(cfg.simulation.object_count, 0);
        assert_eq!(parse(&["-cfile.yaml"]).config_path.as_deref(), Some("file.yaml"));
    }
}
