#[tokio::main]
async fn main() {
    if let Err(e) = lettera_lib::run().await {
        tracing::error!("{e}");
        eprintln!("lettera: {e}");
        std::process::exit(1);
    }
}
