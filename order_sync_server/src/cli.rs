use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 19] = [
        "RUST_LOG",
        "OSYNC_HOST",
        "OSYNC_PORT",
        "OSYNC_DATABASE_URL",
        "OSYNC_GATEWAY_URL",
        "OSYNC_GATEWAY_API_VERSION",
        "OSYNC_GATEWAY_LOCATION_ID",
        "OSYNC_WEBHOOK_NOTIFICATION_URL",
        "OSYNC_WEBHOOK_HMAC_HEADER",
        "OSYNC_WEBHOOK_HMAC_CHECKS",
        "OSYNC_INBOUND_SYNC",
        "OSYNC_OVERSELL_PROTECTION",
        "OSYNC_MAX_WEBHOOK_RETRIES",
        "OSYNC_HOLD_BACKOFF_SECS",
        "OSYNC_RETRY_BACKOFF_SECS",
        "OSYNC_PUSH_VERIFICATION_DELAY_SECS",
        "OSYNC_REFUND_VERIFICATION_DELAY_SECS",
        "OSYNC_ORDER_CACHE_TTL_SECS",
        "OSYNC_CUSTOMER_CACHE_TTL_SECS",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<40} {val:<15}");
    })
}
