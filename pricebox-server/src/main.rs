//! Entry point for the `pricebox` binary.
#![forbid(unsafe_code)]

use env_logger::Env;

#[expect(
    clippy::print_stderr,
    reason = "report fatal errors before exiting"
)]
fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    if let Err(err) = pricebox_server::run() {
        eprintln!("pricebox: {err}");
        std::process::exit(1);
    }
}
