pub mod bypass;
pub mod duo;
pub mod logging;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ColorChoice, Command,
};

pub const CMD_SERVER: &str = "server";
pub const CMD_CHECK: &str = "check";

fn server() -> Command {
    let command = Command::new(CMD_SERVER)
        .about("Serve the second factor API")
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("DUOGATE_PORT")
                .value_parser(clap::value_parser!(u16)),
        );

    let command = duo::with_args(command);
    bypass::with_args(command)
}

fn check() -> Command {
    let command = Command::new(CMD_CHECK)
        .about("Print the bypass decision for a login")
        .arg(
            Arg::new("user")
                .short('u')
                .long("user")
                .help("User id")
                .required(true),
        )
        .arg(
            Arg::new("backend")
                .short('b')
                .long("backend")
                .help("User backend class name, LDAP for directory accounts")
                .required(true),
        )
        .arg(
            Arg::new("source-ip")
                .short('s')
                .long("source-ip")
                .help("Address the login comes from")
                .required(true),
        );

    bypass::with_args(command)
}

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("duogate")
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(server())
        .subcommand(check());

    logging::with_args(command)
}
