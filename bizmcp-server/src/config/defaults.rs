//! Default configuration values
//!
//! These are embedded in the binary and used when no config file exists.

/// Default configuration as TOML, printed by `bizmcp-server --print-config`
pub const DEFAULT_CONFIG_TOML: &str = r##"
# bizmcp server configuration

[server]
listen_addr = "0.0.0.0:3000"
max_body_bytes = 1048576
shutdown_grace_secs = 5

[downstream]
base_url = "http://localhost:8000"
timeout_secs = 30

[sessions]
history_capacity = 100
require_initialize = true

[logging]
# stderr | file | both
output = "stderr"
filter = "info"
"##;
