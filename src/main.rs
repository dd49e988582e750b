use std::io::Result;

// `bastion host` (default) runs the authority; `bastion join [url]` runs an observer.
#[tokio::main]
async fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        None | Some("host") => bastion::run_with_config().await,
        Some("join") => bastion::run_observer_with_config(args.next()).await,
        Some(other) => {
            eprintln!("unknown role `{other}`; usage: bastion [host | join [url]]");
            std::process::exit(2);
        }
    }
}
