//! Command-line argument parsing for closedgate

use chrono::{DateTime, Utc};

/// Parse command line arguments
#[derive(Debug, Default, PartialEq)]
pub struct Args {
    pub once: bool,
    pub validate: bool,
    pub help: bool,
    /// Evaluate at this instant instead of now (RFC 3339)
    pub at: Option<DateTime<Utc>>,
    /// Route to produce a navigation decision for
    pub path: Option<String>,
    /// Problems found while parsing, reported by the caller
    pub errors: Vec<String>,
}

pub fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    parse_args_from(&args)
}

/// Parse an argument vector whose first element is the program name
pub fn parse_args_from(args: &[String]) -> Args {
    let mut result = Args::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--once" => result.once = true,
            "--validate" => result.validate = true,
            "--help" | "-h" => result.help = true,
            "--at" => {
                if i + 1 < args.len() {
                    i += 1;
                    match DateTime::parse_from_rfc3339(&args[i]) {
                        Ok(at) => {
                            result.at = Some(at.with_timezone(&Utc));
                            result.once = true; // A fixed instant implies a single evaluation
                        }
                        Err(e) => result
                            .errors
                            .push(format!("--at '{}' is not an RFC 3339 timestamp: {}", args[i], e)),
                    }
                } else {
                    result.errors.push("--at requires a timestamp".to_string());
                }
            }
            "--path" => {
                if i + 1 < args.len() {
                    i += 1;
                    result.path = Some(args[i].clone());
                } else {
                    result.errors.push("--path requires a route".to_string());
                }
            }
            other => result.errors.push(format!("unknown option '{}'", other)),
        }
        i += 1;
    }

    result
}

pub fn print_help() {
    println!("closedgate - closed-hours gate\n");
    println!("USAGE:");
    println!("    closedgate [OPTIONS]\n");
    println!("OPTIONS:");
    println!("    --once              Evaluate the gate once, print the result and exit");
    println!("    --at TIMESTAMP      Evaluate at an RFC 3339 instant (implies --once)");
    println!("    --path ROUTE        Also print the navigation decision for ROUTE");
    println!("    --validate          Validate configuration and exit");
    println!("    --help, -h          Show this help message\n");
    println!("ENVIRONMENT:");
    println!("    CLOSED_START_HOUR, CLOSED_END_HOUR, CLOSED_TIME_ZONE, ZONE_AWARE_GATE,");
    println!("    OPEN_ROUTE, CLOSED_ROUTE, GATED_ROUTES, TICK_INTERVAL_MS, STATUS_PORT");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("closedgate")
            .chain(list.iter().copied())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_parse_args_default() {
        let result = parse_args_from(&args(&[]));
        assert_eq!(result, Args::default());
    }

    #[test]
    fn test_parse_args_flags() {
        let result = parse_args_from(&args(&["--once", "--validate"]));
        assert!(result.once);
        assert!(result.validate);
        assert!(!result.help);

        assert!(parse_args_from(&args(&["-h"])).help);
        assert!(parse_args_from(&args(&["--help"])).help);
    }

    #[test]
    fn test_parse_args_at_implies_once() {
        let result = parse_args_from(&args(&["--at", "2024-01-15T08:59:59-07:00"]));
        assert!(result.once);
        assert_eq!(result.at, Some(Utc.with_ymd_and_hms(2024, 1, 15, 15, 59, 59).unwrap()));
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_parse_args_bad_timestamp() {
        let result = parse_args_from(&args(&["--at", "yesterday"]));
        assert_eq!(result.at, None);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("yesterday"));
    }

    #[test]
    fn test_parse_args_path() {
        let result = parse_args_from(&args(&["--once", "--path", "/lab"]));
        assert_eq!(result.path, Some("/lab".to_string()));
    }

    #[test]
    fn test_parse_args_missing_values() {
        assert_eq!(parse_args_from(&args(&["--path"])).errors.len(), 1);
        assert_eq!(parse_args_from(&args(&["--at"])).errors.len(), 1);
    }

    #[test]
    fn test_parse_args_unknown_option() {
        let result = parse_args_from(&args(&["--loud"]));
        assert!(result.errors[0].contains("--loud"));
    }
}
