pub mod actions;
pub mod config;

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};

pub fn build_command() -> Command {
    Command::new("neptun")
        .about("Poll and control Neptun Smart leak-control modules over Modbus TCP")
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("Device configuration file (.toml or .json)")
                .value_name("FILE")
                .conflicts_with("host"),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .short('H')
                .help("Address of a single module to poll")
                .value_name("HOST")
                .required_unless_present("config"),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .short('p')
                .help("Modbus TCP port of the module")
                .value_name("PORT")
                .value_parser(value_parser!(u16))
                .default_value("503"),
        )
        .arg(
            Arg::new("name")
                .long("name")
                .short('n')
                .help("Display name of the module [default: neptun]")
                .value_name("NAME"),
        )
        .arg(
            Arg::new("interval")
                .long("interval")
                .short('i')
                .help("Poll interval in milliseconds (overrides the configuration)")
                .value_name("MS")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("once")
                .long("once")
                .help("Refresh once, print the state and exit")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .short('j')
                .help("Print snapshots as JSON")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("open-valve")
                .long("open-valve")
                .help("Open the valve of zone 1 or 2 before polling")
                .value_name("ZONE")
                .value_parser(value_parser!(u8).range(1..=2))
                .conflicts_with("close-valve"),
        )
        .arg(
            Arg::new("close-valve")
                .long("close-valve")
                .help("Close the valve of zone 1 or 2 before polling")
                .value_name("ZONE")
                .value_parser(value_parser!(u8).range(1..=2)),
        )
}

/// Parse command line arguments and return ArgMatches.
pub fn parse_args() -> ArgMatches {
    build_command().get_matches()
}
