//! Tracing initialization: console sink (pretty or JSON lines on stderr)
//! plus an optional rotating file sink.

use std::path::Path;

use tracing_appender::rolling;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::cli::FILE_GUARD;

pub fn init_tracing(json: bool, level: &str, file: Option<&str>, rotation: Option<&str>) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    if json {
        layers.push(fmt::layer().json().with_writer(std::io::stderr).boxed());
    } else {
        layers.push(fmt::layer().with_writer(std::io::stderr).boxed());
    }

    if let Some(path) = file {
        let path = Path::new(path);
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
        let name = path.file_name();
        if let (Some(dir), Some(name)) = (dir.or(Some(Path::new("."))), name) {
            let appender = match rotation {
                Some("daily") => rolling::daily(dir, name),
                Some("hourly") => rolling::hourly(dir, name),
                _ => rolling::never(dir, name),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            // Keep the guard alive for the process lifetime so buffered
            // lines are flushed on exit.
            let _ = FILE_GUARD.set(guard);
            layers.push(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer)
                    .boxed(),
            );
        } else {
            eprintln!("warning: invalid log file path {path:?}; file sink disabled");
        }
    }

    tracing_subscriber::registry().with(layers).with(filter).init();
}
