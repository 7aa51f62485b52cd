#[tokio::main]
async fn main() {
    if let Err(e) = docextract_lib::run().await {
        eprintln!("docextract: {e}");
        std::process::exit(1);
    }
}
