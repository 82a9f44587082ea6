//! `rigforge` command line

use anyhow::Result;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use rigforge_catalog::standard_catalog;
use rigforge_cli::{commands, config, logging, CliConfig, Overrides};
use std::path::PathBuf;

fn cli() -> Command {
    Command::new("rigforge")
        .version(rigforge_catalog::VERSION)
        .about("Staged, component-driven rig generation")
        .arg_required_else_help(true)
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Write logs as JSON lines"),
        )
        .subcommand(
            Command::new("generate")
                .about("Generate a rig from an input hierarchy (YAML or JSON)")
                .arg(
                    Arg::new("input")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Input hierarchy file"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("TOML config file"),
                )
                .arg(
                    Arg::new("strict")
                        .long("strict")
                        .action(ArgAction::SetTrue)
                        .help("Abort on unknown component types"),
                )
                .arg(
                    Arg::new("silent-unregistered")
                        .long("silent-unregistered")
                        .action(ArgAction::SetTrue)
                        .help("Do not warn about units created without registration"),
                )
                .arg(
                    Arg::new("root")
                        .long("root")
                        .help("Root unit for auto-parenting (empty to disable)"),
                )
                .arg(
                    Arg::new("script")
                        .long("script")
                        .value_parser(value_parser!(PathBuf))
                        .help("Write the generated script to this file"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output the report as JSON"),
                ),
        )
        .subcommand(Command::new("types").about("List component types, aliases and plugins"))
        .subcommand(Command::new("stages").about("List stages and their structural modes"))
}

fn run_generate(args: &ArgMatches, log_json: bool) -> Result<bool> {
    let file_config = match args.get_one::<PathBuf>("config") {
        Some(path) => CliConfig::load(path)?,
        None => CliConfig::default(),
    };
    logging::init(file_config.log_filter(), log_json || file_config.logging.json);

    let overrides = Overrides {
        strict: args.get_flag("strict"),
        silent_unregistered: args.get_flag("silent-unregistered"),
        root_unit: args.get_one::<String>("root").cloned(),
    };
    let Some(input_path) = args.get_one::<PathBuf>("input") else {
        anyhow::bail!("missing input file");
    };
    let input = config::load_input(input_path)?;

    let outcome = commands::generate(&input, file_config.generator_config(&overrides))?;
    if let Some(path) = args.get_one::<PathBuf>("script") {
        std::fs::write(path, &outcome.script)?;
    }
    println!("{}", outcome.render(args.get_flag("json"))?);
    Ok(outcome.succeeded())
}

fn main() {
    let matches = cli().get_matches();
    let log_json = matches.get_flag("log-json");

    let result = match matches.subcommand() {
        Some(("generate", args)) => run_generate(args, log_json),
        Some(("types", _)) => {
            logging::init(config::DEFAULT_LOG_FILTER, log_json);
            standard_catalog().map_err(anyhow::Error::from).map(|catalog| {
                print!("{}", commands::list_types(&catalog));
                true
            })
        }
        Some(("stages", _)) => {
            print!("{}", commands::list_stages());
            Ok(true)
        }
        _ => Ok(true),
    };

    match result {
        Ok(ok) => std::process::exit(if ok { 0 } else { 1 }),
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(1);
        }
    }
}
