use chrono::{Local, SecondsFormat};
use tracing_subscriber::{
    filter::Targets,
    fmt::{self, format::Writer, time::FormatTime},
    prelude::*,
};

use crate::config::Log;

/// Installs the global subscriber: local timestamps, colour when `log.style`
/// allows it, and per-target levels parsed from `log.level`.
pub fn init(log: &Log) -> Result<(), String> {
    let is_color = log.style.is_color();
    if !is_color {
        yansi::disable();
    }
    let filter: Targets = log
        .level
        .parse()
        .map_err(|err| format!("log level \"{}\" did not parse successfully: {err}", log.level))?;
    let format = fmt::layer().with_timer(LocalTime).with_ansi(is_color);

    tracing_subscriber::registry()
        .with(format)
        .with(filter)
        .try_init()
        .map_err(|err| format!("failed to install log subscriber: {err}"))
}

struct LocalTime;

impl FormatTime for LocalTime {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = Local::now().to_rfc3339_opts(SecondsFormat::Millis, false);
        write!(w, "{now}")
    }
}
