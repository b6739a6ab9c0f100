fn main() -> anyhow::Result<()> {
    sentiment_demo_lib::run()
}
