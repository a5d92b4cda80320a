//! Prints the argon2 hash of a password, for seeding a user row by hand.
//! Usage: hashpass <password>

use mtg_stats::auth::password::hash_password;

fn main() {
    let Some(password) = std::env::args().nth(1).filter(|p| !p.is_empty()) else {
        eprintln!("Usage: hashpass <password>");
        std::process::exit(1);
    };

    match hash_password(&password) {
        Ok(hash) => println!("{}", hash),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
