use clap::{
    Arg, ArgAction, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

/// Pure clap command definitions with zero business logic
#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new(env!("CARGO_PKG_NAME"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("host")
                .default_value("localhost")
                .env("MONGOTLS_HOST")
                .help("MongoDB server host name or IP address")
                .long("host")
                .short('H')
                .value_name("HOST"),
        )
        .arg(
            Arg::new("port")
                .default_value("27017")
                .env("MONGOTLS_PORT")
                .help("MongoDB server port")
                .long("port")
                .short('p')
                .value_parser(clap::value_parser!(u16).range(1..)),
        )
        .arg(
            Arg::new("cert-dir")
                .env("MONGOTLS_CERT_DIR")
                .help("Directory holding the certificate files (default: executable directory)")
                .long("cert-dir")
                .short('c')
                .value_name("PATH")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("ca-file")
                .default_value("rootCA.pem")
                .env("MONGOTLS_CA_FILE")
                .help("CA certificate file name, relative to --cert-dir")
                .long("ca-file")
                .value_name("FILE"),
        )
        .arg(
            Arg::new("cert-file")
                .default_value("mongodb.pem")
                .env("MONGOTLS_CERT_FILE")
                .help("Client certificate and private key file name, relative to --cert-dir")
                .long("cert-file")
                .long_help(
                    "Client certificate and private key file name, relative to --cert-dir.\n\
                    The file holds the PEM certificate chain followed by the PKCS#8, \
                    PKCS#1 or SEC1 private key, as mongod's tlsCertificateKeyFile does."
                )
                .value_name("FILE"),
        )
        .arg(
            Arg::new("no-wait")
                .action(ArgAction::SetTrue)
                .env("MONGOTLS_NO_WAIT")
                .help("Exit without waiting for enter after the connection attempts")
                .long("no-wait"),
        )
        .arg(
            Arg::new("verbose")
                .action(ArgAction::Count)
                .help("Increase log verbosity (-v debug, -vv trace), RUST_LOG takes precedence")
                .long("verbose")
                .short('v'),
        )
}
