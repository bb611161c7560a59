use crate::CLAP_STYLING;
use clap::{arg, command};
use url::Url;
use vulnerax_core::export::ExportFormat;

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("vulnerax")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("vulnerax")
        .about("Maps the attack surface of a web application: pages, forms and script API calls")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress banner and non-essential output")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(-v --"verbose" "Enable debug logging (RUST_LOG takes precedence)")
                .required(false)
                .global(true),
        )
        .subcommand_required(false)
        .subcommand(
            command!("scan")
                .about(
                    "Crawl a host or collection of hosts and report every endpoint, form field \
                and inline-script API call found.",
                )
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(false)
                        .help("The root URL to scan")
                        .value_parser(clap::value_parser!(Url))
                        .conflicts_with("hosts-file"),
                )
                .arg(
                    arg!(-H --"hosts-file" <PATH>)
                        .required(false)
                        .help("Path to a newline-delimited file of root URLs to scan")
                        .value_parser(clap::value_parser!(std::path::PathBuf))
                        .conflicts_with("url"),
                )
                .arg(
                    arg!(-c --"config" <PATH>)
                        .required(false)
                        .help("JSON file of scan options (camelCase keys); flags override it")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(-t --"threads" <NUM_WORKERS>)
                        .required(false)
                        .help("Number of concurrent fetch workers [default: 10]")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"max-pages" <NUM>)
                        .required(false)
                        .help("Stop after visiting this many pages [default: 200]")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"max-depth" <NUM>)
                        .required(false)
                        .help("Maximum link distance from the root [default: 5]")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Per-request timeout [default: 10]")
                        .value_parser(clap::value_parser!(f64)),
                )
                .arg(
                    arg!(--"max-duration" <SECONDS>)
                        .required(false)
                        .help("Wall-clock budget per target; partial results are kept")
                        .value_parser(clap::value_parser!(f64)),
                )
                .arg(
                    arg!(-A --"user-agent" <AGENT>)
                        .required(false)
                        .help("User-Agent header sent with every request"),
                )
                .arg(
                    arg!(--"allow-cross-origin")
                        .required(false)
                        .help("Follow links to other origins (default: stay on the root origin)")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save the report to a file (default: display to screen)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: json, flat, urls, text, markdown, csv")
                        .value_parser(ExportFormat::NAMES.to_vec()),
                )
                .arg(
                    arg!(--"output-dir" <DIR>)
                        .required(false)
                        .help(
                            "Write endpoints.json, detailed_endpoints.json and \
                        formatted_endpoints.json into DIR",
                        )
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                ),
        )
}
