use tracing_subscriber::EnvFilter;

/// Environment variable holding the plugin's log filter, e.g. `UDO_LOG=debug`.
pub const LOG_ENV: &str = "UDO_LOG";

/// Installs a stderr subscriber when `UDO_LOG` is set.
///
/// Does nothing if the variable is unset or a global subscriber already
/// exists, so a host that configures `tracing` itself keeps its own.
pub fn init_from_env() {
    let Ok(filter) = EnvFilter::try_from_env(LOG_ENV) else {
        return;
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
