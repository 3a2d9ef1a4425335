use clap::{Arg, ArgMatches, Command};
use tracing::debug;

use jamon::{load, resolve, Document, Section};

fn cli() -> Command {
    let file = Arg::new("file")
        .help("Path to config file")
        .required(true)
        .index(1);

    Command::new("jamon-cli")
        .about("Inspect INI-like config files with ${name} substitution")
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .env("JAMON_LOG_LEVEL")
                .help("DEBUG, INFO, WARN or ERROR")
                .default_value("WARN")
                .global(true),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("dump")
                .about("Print the resolved document")
                .arg(file.clone()),
        )
        .subcommand(
            Command::new("get")
                .about("Print a single value")
                .arg(file.clone())
                .arg(Arg::new("key").required(true).index(2))
                .arg(
                    Arg::new("section")
                        .long("section")
                        .short('s')
                        .help("Section to read from (root-level keys when omitted)"),
                ),
        )
        .subcommand(
            Command::new("sections")
                .about("List section names")
                .arg(file.clone()),
        )
        .subcommand(
            Command::new("refs")
                .about("List references left unexpanded in final values")
                .arg(file),
        )
}

fn parse_level(level: &str) -> tracing::Level {
    match level.to_uppercase().as_str() {
        "DEBUG" => tracing::Level::DEBUG,
        "INFO" => tracing::Level::INFO,
        "WARN" => tracing::Level::WARN,
        "ERROR" => tracing::Level::ERROR,
        _ => tracing::Level::WARN,
    }
}

fn init_logging(level: &str) {
    tracing_subscriber::fmt()
        .with_max_level(parse_level(level))
        .with_writer(std::io::stderr)
        .init();
}

fn open(matches: &ArgMatches) -> Document {
    // `file` is a required positional on every subcommand
    let path = matches.get_one::<String>("file").unwrap();
    match load(path) {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    }
}

fn leftover_refs<'a>(scope: &'a str, section: &'a Section) -> impl Iterator<Item = String> + 'a {
    section.iter().flat_map(move |(key, value)| {
        resolve::tokens(value).map(move |name| format!("{}.{}: {}", scope, key, name))
    })
}

/// Looks `key` up in `section`, or among the root-level keys when no section
/// is given.
fn get_value<'a>(doc: &'a Document, section: Option<&str>, key: &str) -> Option<&'a str> {
    match section {
        Some(name) => {
            if !doc.has_section(name) {
                debug!(section = %name, "section not present");
            }
            doc.section(name).lookup(key)
        }
        None => doc.root().lookup(key),
    }
}

fn main() {
    let matches = cli().get_matches();
    let level = matches
        .get_one::<String>("log-level")
        .map(String::as_str)
        .unwrap_or("WARN");
    init_logging(level);

    match matches.subcommand() {
        Some(("dump", sub)) => {
            print!("{}", open(sub));
        }
        Some(("get", sub)) => {
            let doc = open(sub);
            let key = sub.get_one::<String>("key").unwrap();
            let section = sub.get_one::<String>("section").map(String::as_str);
            match get_value(&doc, section, key) {
                Some(value) => println!("{}", value),
                None => {
                    eprintln!("ERROR key not found");
                    std::process::exit(1);
                }
            }
        }
        Some(("sections", sub)) => {
            for name in open(sub).section_names() {
                println!("{}", name);
            }
        }
        Some(("refs", sub)) => {
            let doc = open(sub);
            let lines = leftover_refs("", doc.root())
                .chain(doc.sections().flat_map(|(name, section)| leftover_refs(name, section)));
            for line in lines {
                println!("{}", line);
            }
        }
        _ => unreachable!("subcommand_required"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        ENV_LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    struct EnvGuard {
        key: &'static str,
        old: Option<std::ffi::OsString>,
    }

    impl EnvGuard {
        fn set(key: &'static str, val: &str) -> Self {
            let old = std::env::var_os(key);
            std::env::set_var(key, val);
            Self { key, old }
        }

        fn remove(key: &'static str) -> Self {
            let old = std::env::var_os(key);
            std::env::remove_var(key);
            Self { key, old }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match self.old.take() {
                Some(v) => std::env::set_var(self.key, v),
                None => std::env::remove_var(self.key),
            }
        }
    }

    fn sample() -> Document {
        Document::parse("a=1\nb=${zz}\n[s]\nc=${a}${q}\n")
    }

    #[test]
    fn command_definition_is_valid() {
        cli().debug_assert();
    }

    #[test]
    fn every_subcommand_parses() {
        let _lock = env_lock();
        for name in ["dump", "sections", "refs"] {
            let matches = cli().try_get_matches_from(["jamon-cli", name, "app.conf"]).unwrap();
            let (sub_name, sub) = matches.subcommand().unwrap();
            assert_eq!(sub_name, name);
            assert_eq!(sub.get_one::<String>("file").unwrap(), "app.conf");
        }

        let matches = cli()
            .try_get_matches_from(["jamon-cli", "get", "app.conf", "port", "-s", "smtp"])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        assert_eq!(sub.get_one::<String>("key").unwrap(), "port");
        assert_eq!(sub.get_one::<String>("section").unwrap(), "smtp");
    }

    #[test]
    fn invalid_invocations_are_rejected() {
        let _lock = env_lock();
        assert!(cli().try_get_matches_from(["jamon-cli"]).is_err());
        assert!(cli().try_get_matches_from(["jamon-cli", "dump"]).is_err());
        assert!(cli().try_get_matches_from(["jamon-cli", "get", "app.conf"]).is_err());
        assert!(cli().try_get_matches_from(["jamon-cli", "nope", "app.conf"]).is_err());
    }

    #[test]
    fn log_level_defaults_to_warn() {
        let _lock = env_lock();
        let _g = EnvGuard::remove("JAMON_LOG_LEVEL");
        let matches = cli().try_get_matches_from(["jamon-cli", "dump", "x"]).unwrap();
        assert_eq!(matches.get_one::<String>("log-level").unwrap(), "WARN");
    }

    #[test]
    fn log_level_from_env_and_flag() {
        let _lock = env_lock();
        let _g = EnvGuard::set("JAMON_LOG_LEVEL", "debug");
        let matches = cli().try_get_matches_from(["jamon-cli", "dump", "x"]).unwrap();
        assert_eq!(matches.get_one::<String>("log-level").unwrap(), "debug");

        let matches = cli()
            .try_get_matches_from(["jamon-cli", "dump", "x", "--log-level", "ERROR"])
            .unwrap();
        assert_eq!(matches.get_one::<String>("log-level").unwrap(), "ERROR");
    }

    #[test]
    fn level_names() {
        assert_eq!(parse_level("debug"), tracing::Level::DEBUG);
        assert_eq!(parse_level("Info"), tracing::Level::INFO);
        assert_eq!(parse_level("WARN"), tracing::Level::WARN);
        assert_eq!(parse_level("error"), tracing::Level::ERROR);
        assert_eq!(parse_level("verbose"), tracing::Level::WARN);
    }

    #[test]
    fn refs_use_empty_scope_for_root() {
        let doc = sample();
        let root: Vec<String> = leftover_refs("", doc.root()).collect();
        assert_eq!(root, vec![".b: zz".to_string()]);

        let named: Vec<String> = leftover_refs("s", doc.section("s")).collect();
        assert_eq!(named, vec!["s.c: q".to_string()]);
    }

    #[test]
    fn get_reads_root_or_named_section() {
        let doc = sample();
        assert_eq!(get_value(&doc, None, "a"), Some("1"));
        assert_eq!(get_value(&doc, Some("s"), "c"), Some("1${q}"));
        assert_eq!(get_value(&doc, None, "nope"), None);
        assert_eq!(get_value(&doc, Some("s"), "a"), None);
        assert_eq!(get_value(&doc, Some("missing"), "a"), None);
    }
}
