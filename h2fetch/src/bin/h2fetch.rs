//! Fetch one resource over HTTP/2: headers to stderr, body to stdout.

use std::io;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::Context;
use clap::App;
use clap::Arg;
use clap::ArgMatches;

use h2fetch::cli;
use h2fetch::ClientConf;
use h2fetch::IgnoreSigpipe;

fn seconds(matches: &ArgMatches, name: &str) -> anyhow::Result<Option<Duration>> {
    match matches.value_of(name) {
        Some(value) => {
            let secs: u64 = value
                .parse()
                .with_context(|| format!("invalid --{} value: {}", name, value))?;
            Ok(Some(Duration::from_secs(secs)))
        }
        None => Ok(None),
    }
}

fn conf_from_args(matches: &ArgMatches) -> anyhow::Result<ClientConf> {
    let mut conf = ClientConf::new();
    conf.connect_timeout = seconds(matches, "connect-timeout")?;
    conf.idle_timeout = seconds(matches, "idle-timeout")?;
    if let Some(files) = matches.values_of("cacert") {
        conf.root_certificates = files.map(PathBuf::from).collect();
    }
    Ok(conf)
}

fn main() {
    env_logger::init();

    let matches = App::new("h2fetch")
        .about("Fetch one resource over HTTP/2")
        .arg(Arg::with_name("URI").index(1).help("https:// or http:// URI"))
        .arg(
            Arg::with_name("connect-timeout")
                .long("connect-timeout")
                .takes_value(true)
                .value_name("SECS")
                .help("Give up connecting after this many seconds"),
        )
        .arg(
            Arg::with_name("idle-timeout")
                .long("idle-timeout")
                .takes_value(true)
                .value_name("SECS")
                .help("Drop the connection after this many seconds without I/O"),
        )
        .arg(
            Arg::with_name("cacert")
                .long("cacert")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1)
                .value_name("FILE")
                .help("PEM file with additional trusted certificates"),
        )
        .get_matches();

    let conf = match conf_from_args(&matches) {
        Ok(conf) => conf,
        Err(e) => {
            eprintln!("{:#}", e);
            process::exit(1);
        }
    };

    let code = {
        let _sigpipe = IgnoreSigpipe::new();
        let body = io::BufWriter::new(io::stdout());
        cli::fetch(matches.value_of("URI"), &conf, io::stderr(), body)
    };
    process::exit(code);
}
