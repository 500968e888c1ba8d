pub fn generate_starter_config() -> String {
    r#"# =============================================================================
# JFORWARD CONFIGURATION
# =============================================================================
# jforward reads the systemd journal, stores compressed batches in work_dir
# and uploads them to an HTTP log receiver. Every setting below is optional.
#
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ~/.config/jforward/config.yml
#   3. /etc/jforward/config.yml
#
# Values may reference environment variables with the $env{...} syntax.

# Holds the journal cursor and batches waiting for delivery
work_dir: ~/.local/jforward

# =============================================================================
# SOURCE
# =============================================================================

source:
  program: journalctl
  # Only forward records matching this pattern (passed as journalctl --grep)
  # grep: 'sshd|sudo'

# =============================================================================
# HARVEST
# =============================================================================

harvest:
  # How often the journal is read
  interval: 5s
  # Uncompressed bytes per batch file (900 KiB)
  batch_size: 921600
  # zstd level, 1-22
  compression_level: 3

# =============================================================================
# DELIVERY
# =============================================================================

delivery:
  # Receiver URL. When unset, a collector and HTTP source named after this
  # host are looked up or created through the management API, using the
  # SUMO_ACCESSID and SUMO_ACCESSKEY environment variables.
  # url: https://collectors.de.sumologic.com/receiver/v1/http/<token>
  # Source category sent with every batch
  # category: prod/web
  interval: 2s
  timeout: 30s

# =============================================================================
# PROVISIONING
# =============================================================================

provision:
  api_url: https://api.de.sumologic.com/api/v1
  timeout: 10s

# =============================================================================
# SHUTDOWN
# =============================================================================

shutdown:
  # Longest wait for running cycles after Ctrl+C
  drain_timeout: 30s
"#
    .to_string()
}
