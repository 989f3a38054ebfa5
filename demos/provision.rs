use anyhow::{Context, bail};
use rosnet::credential::{DeviceCredential, Protocol};
use rosnet::legacy::LegacyMonitor;
use rosnet::pppoe::{NewSecret, PppoeClient};
use rosnet::session::{ConnectionSecurityOptions, RouterConnector};
use std::env;

fn print_usage() {
    eprintln!(
        "Usage: cargo run --example provision -- <host> <user> <password> <action> [args...] [--ssh]\n\
         actions:\n\
         \x20 test\n\
         \x20 create <name> <password> <profile>\n\
         \x20 isolate <name> [isolir-profile]\n\
         \x20 activate <name> <profile>\n\
         \x20 delete <name>\n\
         \x20 stats <name>\n\
         \x20 pools"
    );
}

fn arg<'a>(args: &'a [String], idx: usize, what: &str) -> anyhow::Result<&'a str> {
    args.get(idx)
        .map(String::as_str)
        .with_context(|| format!("missing {what}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args: Vec<String> = env::args().skip(1).collect();
    let use_ssh = args.iter().any(|a| a == "--ssh");
    args.retain(|a| a != "--ssh");
    if args.len() < 4 {
        print_usage();
        bail!("not enough arguments");
    }

    let mut router = DeviceCredential::new(&args[0], &args[1], &args[2]);
    if use_ssh {
        router = router.with_protocol(Protocol::Ssh);
    }
    let security = ConnectionSecurityOptions::default();
    let client = PppoeClient::new(RouterConnector::with_security(security.clone()));
    let rest = &args[4..];

    match args[3].as_str() {
        "test" => {
            let identity = client.test_connection(&router).await?;
            println!("{}", serde_json::to_string_pretty(&identity)?);
        }
        "create" => {
            let secret = client
                .create_user(
                    &router,
                    &NewSecret {
                        name: arg(rest, 0, "name")?.to_string(),
                        password: arg(rest, 1, "password")?.to_string(),
                        profile: arg(rest, 2, "profile")?.to_string(),
                        ..Default::default()
                    },
                )
                .await?;
            println!("{}", serde_json::to_string_pretty(&secret)?);
        }
        "isolate" => {
            let name = arg(rest, 0, "name")?;
            let profile = rest.get(1).map_or("isolir", String::as_str);
            let secret = client.move_to_profile(&router, name, profile).await?;
            let kicked = client.disconnect_user(&router, name).await?;
            println!("{} -> {} (disconnected={kicked})", secret.name, secret.profile);
        }
        "activate" => {
            let secret = client
                .move_to_profile(&router, arg(rest, 0, "name")?, arg(rest, 1, "profile")?)
                .await?;
            println!("{} -> {}", secret.name, secret.profile);
        }
        "delete" => {
            let name = arg(rest, 0, "name")?;
            client.delete_user(&router, name).await?;
            println!("deleted {name}");
        }
        "stats" => match client.get_active_stats(&router, arg(rest, 0, "name")?).await? {
            Some(stats) => println!("{}", serde_json::to_string_pretty(&stats)?),
            None => println!("offline"),
        },
        "pools" => {
            let pools = LegacyMonitor::new(security).list_pools(&router).await?;
            for pool in pools {
                println!("{} {}", pool.name, pool.ranges.join(","));
            }
        }
        other => {
            print_usage();
            bail!("unknown action: {other}");
        }
    }
    Ok(())
}
