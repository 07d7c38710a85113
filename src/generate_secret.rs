// generate_secret.rs
// Utility to generate a signing secret for bearer tokens

use rand::rngs::OsRng;
use rand::RngCore;

fn main() {
    println!("Generating new JWT signing secret...\n");

    let mut bytes = [0u8; 64];
    OsRng.fill_bytes(&mut bytes);
    let secret = hex::encode(bytes);

    println!("Add this to your .env file:");
    println!("─────────────────────────────────────────────────");
    println!("JWT_SECRET={}", secret);
    println!("─────────────────────────────────────────────────");
    println!("\nIMPORTANT:");
    println!("  • Keep this secret out of version control");
    println!("  • Changing it invalidates every issued token");
}
