#[tokio::main]
async fn main() {
    if let Err(e) = trannergy_bridge::app().await {
        log::error!("{:#}", e);
        std::process::exit(255);
    }
}
