#[cfg(feature = "ssr")]
use anniversary_draw::{clear_sessions, config::AppConfig, establish_connection, ensure_schema};

#[cfg(feature = "ssr")]
fn main() {
    let config = AppConfig::from_env().expect("Invalid configuration");
    let mut conn = establish_connection(&config.database_url).expect("Failed to connect");
    ensure_schema(&mut conn).expect("Failed to create the database schema");
    let removed = clear_sessions(&mut conn).expect("Failed to clear game sessions");
    println!("Removed {removed} game session(s) and their players.");
}

#[cfg(not(feature = "ssr"))]
fn main() {
    println!("This binary requires the 'ssr' feature to be enabled.");
}
