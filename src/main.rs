#[tokio::main]
async fn main() -> anyhow::Result<()> {
    drainify_lib::run().await
}
