use crate::{
    certs::{CA_FILE_NAME, CLIENT_CERT_FILE_NAME, CertificatePaths, executable_dir},
    cli::actions::Action,
    client::{DEFAULT_HOST, DEFAULT_PORT, ServerAddress},
};
use anyhow::Result;
use clap::ArgMatches;
use std::path::PathBuf;

/// Convert `ArgMatches` into typed Action enum with validation
///
/// # Errors
///
/// Returns an error if no certificate directory is given and the executable
/// directory cannot be determined
pub fn dispatch(matches: &ArgMatches) -> Result<Action> {
    let host = matches
        .get_one::<String>("host")
        .map_or(DEFAULT_HOST, String::as_str);
    let port = matches
        .get_one::<u16>("port")
        .copied()
        .unwrap_or(DEFAULT_PORT);

    // Certificates live next to the executable unless told otherwise
    let cert_dir = match matches.get_one::<PathBuf>("cert-dir") {
        Some(dir) => dir.clone(),
        None => executable_dir()?,
    };
    let ca_file = matches
        .get_one::<String>("ca-file")
        .map_or(CA_FILE_NAME, String::as_str);
    let cert_file = matches
        .get_one::<String>("cert-file")
        .map_or(CLIENT_CERT_FILE_NAME, String::as_str);

    Ok(Action::Run {
        address: ServerAddress::new(host, port),
        certs: CertificatePaths::resolve(&cert_dir, ca_file, cert_file),
        wait: !matches.get_flag("no-wait"),
    })
}
