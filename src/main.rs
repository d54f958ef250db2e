//! `mission_dispatch <organization.json>`: run an organization and read
//! console commands from stdin until `stop`.

use std::io::{self, BufRead, Write};

use anyhow::Context;
use tracing::error;

use mission_dispatch::builders::build_organization;
use mission_dispatch::config::{DispatchConfig, OrganizationConfig};
use mission_dispatch::core::AppResult;
use mission_dispatch::runtime::{Command, Console};
use mission_dispatch::util::init_tracing;

fn main() -> AppResult<()> {
    init_tracing();

    let path = std::env::args()
        .nth(1)
        .context("usage: mission_dispatch <organization.json>")?;
    let raw = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
    let mut cfg = OrganizationConfig::from_json_str(&raw).map_err(anyhow::Error::msg)?;

    let env = DispatchConfig::from_env().map_err(anyhow::Error::msg)?;
    if std::env::var_os("DISPATCH_TIME_UNIT_MS").is_some() {
        cfg.runtime.time_unit_ms = env.time_unit_ms;
    }
    if std::env::var_os("DISPATCH_SHUTDOWN_GRACE_MS").is_some() {
        cfg.runtime.shutdown_grace_ms = env.shutdown_grace_ms;
    }

    let grace = cfg.runtime.shutdown_grace();
    let org = build_organization(&cfg, None)?;
    org.chief.start()?;
    let console = Console::new(org, grace);

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        writeln!(stdout, "Waiting for command...")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            line = "stop".into();
        }
        let stopping = line.trim().parse::<Command>().is_ok_and(|c| c.is_stop());
        if stopping {
            writeln!(stdout, "Please wait while the system is terminating...")?;
        }
        match console.execute_line(&line) {
            Ok(reply) => write!(stdout, "{reply}")?,
            Err(e) => {
                error!(error = %e, "command failed");
                writeln!(stdout, "{e}")?;
            }
        }
        if stopping {
            break;
        }
    }
    Ok(())
}
