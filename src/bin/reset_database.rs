#[cfg(feature = "ssr")]
use anniversary_draw::{config::AppConfig, establish_connection, ensure_schema, reset_database};

#[cfg(feature = "ssr")]
fn main() {
    let config = AppConfig::from_env().expect("Invalid configuration");
    let mut conn = establish_connection(&config.database_url).expect("Failed to connect");
    ensure_schema(&mut conn).expect("Failed to create the database schema");
    reset_database(&mut conn).expect("Failed to reset database");
    println!("Database has been reset. Scores are back to zero.");
}

#[cfg(not(feature = "ssr"))]
fn main() {
    println!("This binary requires the 'ssr' feature to be enabled.");
}
