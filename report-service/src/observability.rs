use tracing_subscriber::{filter::Directive, EnvFilter};

/// The library and each binary target log at `info` unless `RUST_LOG` says otherwise.
const DEFAULT_DIRECTIVES: [&str; 3] = [
    "report_service=info",
    "consumption_report=info",
    "export_readings=info",
];

/// Logs go to stderr so the CLIs can print reports on stdout.
pub fn init_tracing() {
    let mut filter = EnvFilter::from_default_env();
    for raw in DEFAULT_DIRECTIVES {
        match raw.parse::<Directive>() {
            Ok(directive) => filter = filter.add_directive(directive),
            Err(e) => eprintln!("invalid default tracing directive '{raw}': {e}"),
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_directives_cover_every_binary_target() {
        for raw in DEFAULT_DIRECTIVES {
            assert!(raw.parse::<Directive>().is_ok(), "{raw}");
        }
        for bin in ["consumption_report", "export_readings"] {
            assert!(
                DEFAULT_DIRECTIVES.iter().any(|d| d.starts_with(&format!("{bin}="))),
                "no default directive for {bin}"
            );
        }
    }
}
