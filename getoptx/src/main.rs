use std::ffi::OsString;

use getoptx::app;
use getoptx::host::ShellHost;
use getoptx::logging;

fn main() {
    let logger = logging::init_from_env();

    let args: Vec<OsString> = std::env::args_os().skip(1).collect();
    let mut host = ShellHost::new();
    let status = app::run(&mut host, &args);

    drop(logger);
    std::process::exit(status.code());
}
