use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use flowparam_engine::{
    ConfigBinder, ParamValue, SubmissionConfig, Topology, job_config_path, parse_manifest_file, parse_submission_file,
};
use serde_json::json;
use tracing::{Level, debug};

fn main() -> Result<()> {
    init_tracing();
    let matches = build_cli().get_matches();

    match matches.subcommand() {
        Some(("params", sub)) => list_parameters(sub),
        Some(("check", sub)) => check_submission(sub),
        Some(("payload", sub)) => print_payload(sub),
        Some((other, _)) => anyhow::bail!("unknown command: {other}"),
        None => anyhow::bail!("a command is required; see --help"),
    }
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_cli() -> Command {
    let manifest = Arg::new("manifest")
        .long("manifest")
        .short('m')
        .required(true)
        .action(ArgAction::Set)
        .value_parser(clap::value_parser!(PathBuf))
        .help("Path to the parameter manifest (YAML or JSON)");

    let submission_args = [
        manifest.clone(),
        Arg::new("config")
            .long("config")
            .short('c')
            .action(ArgAction::Set)
            .value_parser(clap::value_parser!(PathBuf))
            .help("Job configuration file; defaults to $FLOWPARAM_JOB_CONFIG"),
        Arg::new("param")
            .long("param")
            .short('P')
            .action(ArgAction::Append)
            .value_name("NAME=VALUE")
            .help("Override a submission parameter; may be repeated"),
        Arg::new("job-name").long("job-name").action(ArgAction::Set).help("Job name for the submission"),
        Arg::new("strict")
            .long("strict")
            .action(ArgAction::SetTrue)
            .help("Reject overrides for undeclared parameters"),
    ];

    Command::new("flowparam")
        .about("Inspect and validate submission parameters")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(Command::new("params").about("List declared submission parameters").arg(manifest))
        .subcommand(
            Command::new("check")
                .about("Validate a submission and print the resolved bindings")
                .args(submission_args.clone()),
        )
        .subcommand(
            Command::new("payload")
                .about("Print the startup payload each worker would receive")
                .args(submission_args),
        )
}

fn load_topology(matches: &ArgMatches) -> Result<Topology> {
    let manifest_path = matches.get_one::<PathBuf>("manifest").context("--manifest is required")?;
    let manifest = parse_manifest_file(manifest_path)?;
    let topology = Topology::from_manifest(&manifest)
        .with_context(|| format!("Invalid parameter declarations in {}", manifest_path.display()))?;
    let strict = matches.try_get_one::<bool>("strict").ok().flatten().copied().unwrap_or(false);
    Ok(topology.with_binder(ConfigBinder::new().strict(strict)))
}

fn load_submission(matches: &ArgMatches) -> Result<SubmissionConfig> {
    let mut config = match job_config_path(matches.get_one::<PathBuf>("config").cloned()) {
        Some(path) => {
            debug!(path = %path.display(), "loading job configuration");
            parse_submission_file(&path)?
        }
        None => SubmissionConfig::new(),
    };

    if let Some(job_name) = matches.get_one::<String>("job-name") {
        config.job_name = Some(job_name.clone());
    }

    for raw in matches.get_many::<String>("param").into_iter().flatten() {
        let (name, value) = parse_override(raw)?;
        config.set_parameter(name, value);
    }
    Ok(config)
}

/// Splits `name=value`; the value stays a string and is coerced at bind time.
fn parse_override(raw: &str) -> Result<(String, ParamValue)> {
    let (name, value) = raw
        .split_once('=')
        .with_context(|| format!("invalid parameter override '{raw}', expected NAME=VALUE"))?;
    let name = name.trim();
    anyhow::ensure!(!name.is_empty(), "invalid parameter override '{raw}', name is empty");
    Ok((name.to_string(), ParamValue::from(value)))
}

fn list_parameters(matches: &ArgMatches) -> Result<()> {
    let topology = load_topology(matches)?;
    let parameters: Vec<_> = topology
        .parameters()
        .specs()
        .map(|spec| {
            json!({
                "name": spec.name,
                "type": spec.param_type,
                "default": spec.default,
                "required": spec.is_required(),
                "description": spec.description,
            })
        })
        .collect();
    let out = json!({ "topology": topology.name(), "parameters": parameters });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn check_submission(matches: &ArgMatches) -> Result<()> {
    let topology = load_topology(matches)?;
    let config = load_submission(matches)?;
    let bindings = topology.preflight(&config).context("submission would be rejected")?;
    println!("{}", serde_json::to_string_pretty(&bindings)?);
    Ok(())
}

fn print_payload(matches: &ArgMatches) -> Result<()> {
    let topology = load_topology(matches)?;
    let config = load_submission(matches)?;
    let submission = topology.submit(&config).context("submission would be rejected")?;
    println!("{}", submission.startup_payload().encode()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        build_cli().debug_assert();
    }

    #[test]
    fn overrides_split_on_first_equals() {
        assert_eq!(parse_override("addin=a=b").unwrap(), ("addin".to_string(), ParamValue::from("a=b")));
        assert_eq!(parse_override(" w1 =3").unwrap(), ("w1".to_string(), ParamValue::from("3")));
        assert!(parse_override("w1").is_err());
        assert!(parse_override("=3").is_err());
    }

    #[test]
    fn repeated_param_flags_are_collected() {
        let matches = build_cli()
            .try_get_matches_from(["flowparam", "check", "-m", "params.yaml", "-P", "w1=3", "--param", "pTrue=true", "--strict"])
            .expect("parse");
        let (_, sub) = matches.subcommand().expect("subcommand");

        let config = load_submission(sub).expect("submission");
        assert_eq!(config.submission_parameters["w1"], ParamValue::from("3"));
        assert_eq!(config.submission_parameters["pTrue"], ParamValue::from("true"));
        assert!(sub.get_flag("strict"));
    }
}
