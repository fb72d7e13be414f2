//! Generates a `password_hash` value for a `[tenants.<name>]` entry.

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use tenant_proxy::tenant::{hash_password_with, HashScheme};

const DEFAULT_ARGON2_MEMORY_KIB: u32 = 19 * 1024;
const DEFAULT_ARGON2_ITERATIONS: u32 = 2;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Algorithm {
    Argon2,
    Bcrypt,
}

#[derive(Parser, Debug)]
#[command(name = "hash-password", version, about = "Hash a tenant password for the proxy config")]
struct Args {
    /// Password to hash
    #[arg(short, long)]
    password: String,

    /// Hash algorithm
    #[arg(short, long, value_enum, default_value_t = Algorithm::Argon2)]
    algorithm: Algorithm,

    /// Work factor: bcrypt cost, or Argon2 iterations
    #[arg(short, long)]
    cost: Option<u32>,

    /// Argon2 memory in KiB
    #[arg(long, default_value_t = DEFAULT_ARGON2_MEMORY_KIB)]
    memory_kib: u32,
}

fn scheme(args: &Args) -> HashScheme {
    match args.algorithm {
        Algorithm::Argon2 => HashScheme::Argon2 {
            m_cost: args.memory_kib,
            t_cost: args.cost.unwrap_or(DEFAULT_ARGON2_ITERATIONS),
        },
        Algorithm::Bcrypt => HashScheme::Bcrypt {
            cost: args.cost.unwrap_or(bcrypt::DEFAULT_COST),
        },
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    if args.password.is_empty() {
        bail!("Password cannot be empty");
    }

    let hash = hash_password_with(&args.password, scheme(&args))
        .context("Failed to hash password")?;

    println!("Password hash:");
    println!("{}", hash);
    Ok(())
}
